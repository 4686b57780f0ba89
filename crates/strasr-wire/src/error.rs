use std::fmt;

/// Errors raised while decoding a `Codec` value from a byte buffer.
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    UnexpectedEof,
    InvalidUtf8,
    InvalidBool(u8),
    InvalidTag(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEof => write!(f, "unexpected end of buffer"),
            DecodeError::InvalidUtf8 => write!(f, "invalid UTF-8 in string"),
            DecodeError::InvalidBool(v) => write!(f, "invalid bool value: {v}"),
            DecodeError::InvalidTag(v) => write!(f, "invalid frame tag: {v}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors raised while reading or writing a framed message on the wire.
#[derive(Debug)]
pub enum WireError {
    Io(std::io::Error),
    Decode(DecodeError),
    /// The frame's length prefix exceeded the configured `max_message_size`.
    MessageTooLarge(u32),
    /// EOF was hit while reading a length prefix or a payload.
    ConnectionClosed,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Io(err) => write!(f, "io error: {err}"),
            WireError::Decode(err) => write!(f, "decode error: {err}"),
            WireError::MessageTooLarge(len) => write!(f, "message too large: {len} bytes"),
            WireError::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<std::io::Error> for WireError {
    fn from(err: std::io::Error) -> Self {
        WireError::Io(err)
    }
}

impl From<DecodeError> for WireError {
    fn from(err: DecodeError) -> Self {
        WireError::Decode(err)
    }
}
