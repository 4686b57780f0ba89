use crate::codec::Codec;
use crate::error::DecodeError;

/// A message sent from the client to the server.
///
/// A typed, tagged frame rather than a byte-sniffed sentinel: a literal
/// `b"Done"` marker would be indistinguishable from a 4-sample f32 PCM
/// payload that happens to equal those bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// Contiguous little-endian float32 PCM samples at 16 kHz.
    Audio(Vec<f32>),
    /// End-of-utterance marker.
    Done,
}

const CLIENT_TAG_AUDIO: u8 = 0;
const CLIENT_TAG_DONE: u8 = 1;

impl Codec for ClientFrame {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            ClientFrame::Audio(samples) => {
                CLIENT_TAG_AUDIO.encode(buf);
                samples.encode(buf);
            }
            ClientFrame::Done => {
                CLIENT_TAG_DONE.encode(buf);
            }
        }
    }

    fn decode(buf: &[u8], pos: &mut usize) -> Result<Self, DecodeError> {
        match u8::decode(buf, pos)? {
            CLIENT_TAG_AUDIO => Ok(ClientFrame::Audio(Vec::<f32>::decode(buf, pos)?)),
            CLIENT_TAG_DONE => Ok(ClientFrame::Done),
            tag => Err(DecodeError::InvalidTag(tag)),
        }
    }
}

/// A message sent from the server back to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// The current transcript (partial or final). May be empty.
    Transcript(String),
    /// Terminates the connection's result stream.
    Done,
    /// A human-readable error (`RateMismatch`, `MalformedFrame`, ...) sent
    /// just before the connection is closed.
    Error(String),
}

const SERVER_TAG_TRANSCRIPT: u8 = 0;
const SERVER_TAG_DONE: u8 = 1;
const SERVER_TAG_ERROR: u8 = 2;

impl Codec for ServerFrame {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            ServerFrame::Transcript(text) => {
                SERVER_TAG_TRANSCRIPT.encode(buf);
                text.encode(buf);
            }
            ServerFrame::Done => {
                SERVER_TAG_DONE.encode(buf);
            }
            ServerFrame::Error(message) => {
                SERVER_TAG_ERROR.encode(buf);
                message.encode(buf);
            }
        }
    }

    fn decode(buf: &[u8], pos: &mut usize) -> Result<Self, DecodeError> {
        match u8::decode(buf, pos)? {
            SERVER_TAG_TRANSCRIPT => Ok(ServerFrame::Transcript(String::decode(buf, pos)?)),
            SERVER_TAG_DONE => Ok(ServerFrame::Done),
            SERVER_TAG_ERROR => Ok(ServerFrame::Error(String::decode(buf, pos)?)),
            tag => Err(DecodeError::InvalidTag(tag)),
        }
    }
}
