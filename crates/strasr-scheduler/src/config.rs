#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_batch_size: usize,
    pub max_wait_ms: u64,
    pub pool_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_batch_size: 50, max_wait_ms: 10, pool_size: 1 }
    }
}
