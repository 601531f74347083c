use criterion::{Criterion, criterion_group, criterion_main};
use nativize::config::{self, CompileTimeEnv, Directives};
use nativize::discovery;
use nativize::package::PackageResolver;
use std::hint::black_box;
use std::path::Path;

const MOCK_PROJECT: &str = r#"
[translator]
program = "cython"
extensions = ["py", "pyx"]

[toolchain]
compiler = "clang"
flags = ["-O2"]

[directives]
boundscheck = false
language_level = 3
"#;

/// Three-level package tree with a handful of modules per level.
fn create_tree(root: &Path) {
    let mut dir = root.join("pkg");
    for level in 0..3 {
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("__init__.py"), "").unwrap();
        for i in 0..8 {
            std::fs::write(dir.join(format!("mod{level}_{i}.pyx")), "").unwrap();
            std::fs::write(dir.join(format!("data{level}_{i}.txt")), "").unwrap();
        }
        dir = dir.join(format!("sub{level}"));
    }
}

fn bench_expand(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().unwrap();
    create_tree(temp_dir.path());
    let root = temp_dir.path().display().to_string();

    c.bench_function("expand_recursive_brace", |b| {
        let pattern = format!("{root}/**/*.{{py,pyx}}");
        b.iter(|| discovery::expand(black_box(&pattern)).unwrap())
    });

    c.bench_function("expand_single_level", |b| {
        let pattern = format!("{root}/pkg/mod0_?.pyx");
        b.iter(|| discovery::expand(black_box(&pattern)).unwrap())
    });
}

fn bench_package_resolution(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().unwrap();
    create_tree(temp_dir.path());
    let resolver = PackageResolver::new(&["__init__.py".to_string()]);
    let deep = temp_dir.path().join("pkg/sub0/sub1/mod2_3.pyx");

    c.bench_function("find_package_base", |b| {
        b.iter(|| resolver.find_package_base(black_box(&deep)))
    });

    c.bench_function("build_base_dir", |b| {
        b.iter(|| resolver.build_base_dir(black_box(&deep)))
    });
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("merge_directives", |b| {
        b.iter(|| {
            config::merge_directives(
                black_box(&Directives::new()),
                black_box("boundscheck=False,wraparound=False,cdivision=True,profile=0"),
            )
        })
    });

    c.bench_function("merge_compile_time_env", |b| {
        b.iter(|| {
            config::merge_compile_time_env(
                black_box(&CompileTimeEnv::new()),
                black_box("DEBUG=1,RATIO=0.5,NAME=fast"),
            )
        })
    });
}

fn bench_project_parse(c: &mut Criterion) {
    c.bench_function("parse_nativize_toml", |b| {
        b.iter(|| {
            let _: config::ProjectConfig = toml::from_str(black_box(MOCK_PROJECT)).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_expand,
    bench_package_resolution,
    bench_merge,
    bench_project_parse
);
criterion_main!(benches);
