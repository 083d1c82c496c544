//! The execution context bulk operations schedule their work on.

use std::sync::Arc;

use rayon::prelude::*;

/// A handle to the compute resources available to the bulk operations.
///
/// With a thread pool attached, the table appender dispatches one task per
/// column; without one, everything runs inline on the calling thread. The
/// work for a single column is always sequential.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl ExecutionContext {
    /// A context running all work on the calling thread.
    pub fn inline() -> Self {
        Self::default()
    }

    pub fn with_pool(pool: Arc<rayon::ThreadPool>) -> Self {
        Self { pool: Some(pool) }
    }

    /// Runs `task` for every index in `0..count`, concurrently when a pool
    /// is attached, and returns the results in index order.
    pub(crate) fn run<T, F>(&self, count: usize, task: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| (0..count).into_par_iter().map(&task).collect()),
            None => (0..count).map(task).collect(),
        }
    }

    /// Runs a single task inside the pool, if any.
    pub(crate) fn install<T, F>(&self, task: F) -> T
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(task),
            None => task(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_context_preserves_order() {
        let context = ExecutionContext::inline();
        assert_eq!(context.run(4, |index| index * 2), vec![0, 2, 4, 6]);
    }

    #[test]
    fn pooled_context_preserves_order() {
        let pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(4)
                .build()
                .unwrap(),
        );
        let context = ExecutionContext::with_pool(pool);
        assert_eq!(
            context.run(100, |index| index + 1),
            (1..=100).collect::<Vec<_>>()
        );
        assert_eq!(context.install(|| 7), 7);
    }
}
