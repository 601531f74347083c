mod dispatch;
mod feedback;
mod pool;
mod runner;

pub use dispatch::{BuildDispatcher, PoolFactory};
pub use feedback::FeedbackAnalyzer;
pub use pool::{JobFailure, ParallelPool, SequentialPool, WorkerPool};
pub use runner::{BuildJob, NativeBuildRunner};
