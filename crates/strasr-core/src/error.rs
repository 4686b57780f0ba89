use std::fmt;

#[derive(Debug, PartialEq)]
pub enum StreamError {
    /// `accept_waveform` was called with a sample rate other than 16 kHz.
    RateMismatch { expected: u32, got: u32 },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::RateMismatch { expected, got } => {
                write!(f, "expected {expected} Hz audio, got {got} Hz")
            }
        }
    }
}

impl std::error::Error for StreamError {}
