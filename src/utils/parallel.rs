//! Parallel processing utilities

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Map an `n_jobs` value: non-positive means every available core
    pub fn from_n_jobs(n_jobs: i64) -> Self {
        if n_jobs > 0 {
            Self::new().with_threads(n_jobs as usize)
        } else {
            Self::new()
        }
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }

    /// Run `op` inside a dedicated pool so nested rayon work honours the thread count
    pub fn install<R, F>(&self, op: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .build()?;
        Ok(pool.install(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_install_uses_requested_threads() {
        let config = ParallelConfig::new().with_threads(2);
        let threads = config.install(rayon::current_num_threads).unwrap();
        assert_eq!(threads, 2);

        let sum: i32 = config.install(|| (0..100).into_par_iter().sum()).unwrap();
        assert_eq!(sum, 4950);
    }

    #[test]
    fn test_from_n_jobs() {
        assert_eq!(ParallelConfig::from_n_jobs(3).n_threads, Some(3));
        assert_eq!(ParallelConfig::from_n_jobs(-1).n_threads, None);
        assert_eq!(ParallelConfig::from_n_jobs(0).n_threads, None);
    }
}
