//! Executors that run deferred work off the render thread

use std::thread;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs deferred computations.
///
/// Configuring an executor makes deferred values render concurrently; without
/// one they are resolved inline on the render thread. A job hands its output
/// on through a latch rather than waiting for earlier jobs. A text lambda
/// renders its body inline before calling the lambda, so no job ever waits on
/// another and a single worker is enough.
pub trait Executor: Send + Sync {
    /// Schedule `job` to run.
    fn execute(&self, job: Job);
}

impl Executor for rayon::ThreadPool {
    fn execute(&self, job: Job) {
        self.spawn(job);
    }
}

/// Spawns a dedicated thread per job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        thread::spawn(job);
    }
}

/// Build a rayon pool with `threads` workers, named for diagnostics.
pub fn thread_pool(threads: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("stache-render-{}", i))
        .build()
}
