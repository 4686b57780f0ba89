//! The streaming decode engine: per-connection stream state and the three
//! transducer decoding algorithms, built against the opaque model traits in
//! `strasr_model`. Carries no networking or scheduling code of its own;
//! `strasr-scheduler` drives `StreamState`/`Decoder` with batches of real
//! connections.

pub mod decoder;
pub mod error;
pub mod stream;

pub use decoder::{Decoder, DecoderState, StreamDecodeTarget};
pub use error::StreamError;
pub use stream::{StreamState, LOG_EPS};
