use log::debug;
use rayon::ThreadPool;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("Thread error: {0}")]
    ThreadError(String),
}

/// Builds a rayon pool; `threads == 0` lets rayon pick one thread per core.
pub fn build_pool(threads: usize) -> Result<ThreadPool, ParallelError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ParallelError::ThreadError(format!("Failed to build thread pool: {}", e)))
}

/// Runs `op` inside a dedicated pool of `threads` threads.
pub fn with_thread_pool<T, F>(threads: usize, op: F) -> Result<T, ParallelError>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    let pool = build_pool(threads)?;
    debug!("Using {} threads.", pool.current_num_threads());
    Ok(pool.install(op))
}
