use std::fmt;

#[derive(Debug, Clone)]
pub enum SchedulerError {
    /// The inference worker panicked while running a batch. The batch is
    /// failed outright, not retried: retrying would run the stream's next
    /// chunk out of order relative to whatever partially applied before the
    /// panic, violating the per-stream temporal ordering invariant.
    InferenceFailure(String),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::InferenceFailure(message) => {
                write!(f, "inference batch failed: {message}")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}
