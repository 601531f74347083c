use colored::*;

pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn analyze(output: &str) -> Option<String> {
        // 1. Interpreter headers missing (most common first-build failure)
        if output.contains("Python.h") && output.contains("No such file or directory") {
            return Some(format!(
                "The {} headers were not found.\nInstall the interpreter development package (e.g. {}) or set {} in nativize.toml.",
                "Python.h".bold().yellow(),
                "python3-dev".bold().green(),
                "[toolchain] include_dirs".bold().yellow()
            ));
        }

        // 2. Missing Header (Compiler Error)
        if output.contains("fatal error: ") && output.contains("No such file or directory") {
            return Some(format!(
                "It looks like a {} error.\nYou might be missing an include path.\nCheck {} or {} in nativize.toml.",
                "Missing Header".bold().red(),
                "include_dirs".bold().yellow(),
                "flags".bold().yellow()
            ));
        }

        // 3. Unresolved symbols (Linker Error)
        if output.contains("undefined reference to") || output.contains("Undefined symbols") {
            return Some(format!(
                "It looks like a {} error.\nA library may be missing from {} in nativize.toml.",
                "Linker".bold().red(),
                "ldflags".bold().yellow()
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_header_error() {
        let err = "mod.c:4:10: fatal error: Python.h: No such file or directory";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("python3-dev"));
    }

    #[test]
    fn test_include_error() {
        let err = "fatal error: foo.h: No such file or directory";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("Missing Header"));
    }

    #[test]
    fn test_linker_error() {
        let err = "mod.o: undefined reference to `sqrt'";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("Linker"));
        assert!(msg.contains("ldflags"));
    }

    #[test]
    fn test_unknown_output() {
        assert!(FeedbackAnalyzer::analyze("warning: unused variable").is_none());
    }
}
