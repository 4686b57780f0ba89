pub mod codec;
pub mod error;
pub mod frame;
pub mod framing;

pub use codec::Codec;
pub use error::{DecodeError, WireError};
pub use frame::{ClientFrame, ServerFrame};
