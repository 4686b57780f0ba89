use std::fmt;
use strasr_scheduler::SchedulerError;
use strasr_wire::WireError;

use crate::config::ConfigError;

/// Errors that end a single connection's handler task.
#[derive(Debug)]
pub enum HandlerError {
    RateMismatch(String),
    MalformedFrame(String),
    Inference(SchedulerError),
    Wire(WireError),
    QueueOverflow { cap: usize, got: usize },
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::RateMismatch(msg) => write!(f, "rate mismatch: {msg}"),
            HandlerError::MalformedFrame(msg) => write!(f, "malformed frame: {msg}"),
            HandlerError::Inference(err) => write!(f, "{err}"),
            HandlerError::Wire(err) => write!(f, "{err}"),
            HandlerError::QueueOverflow { cap, got } => {
                write!(f, "pending-frame queue overflow: {got} buffered frames exceeds cap of {cap}")
            }
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<WireError> for HandlerError {
    fn from(err: WireError) -> Self {
        HandlerError::Wire(err)
    }
}

impl From<SchedulerError> for HandlerError {
    fn from(err: SchedulerError) -> Self {
        HandlerError::Inference(err)
    }
}

/// Errors that abort server boot.
#[derive(Debug)]
pub enum ServerError {
    Config(ConfigError),
    Bind(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(err) => write!(f, "configuration error: {err}"),
            ServerError::Bind(err) => write!(f, "failed to bind listener: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::Config(err)
    }
}
