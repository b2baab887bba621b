const DEFAULT_ASYNC_THREADS: usize = 4;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Number of worker threads running asynchronous confirm and cancel phases.
    pub async_threads: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            async_threads: DEFAULT_ASYNC_THREADS,
        }
    }
}
