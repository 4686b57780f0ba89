use crate::decoder::{DecoderState, StreamDecodeTarget};
use crate::error::StreamError;
use std::collections::VecDeque;
use strasr_model::{FeatureExtractor, FeatureFrame, Tokenizer};

const REQUIRED_SAMPLE_RATE: u32 = 16_000;

/// `log(1e-10)`, the fixed log-eps value padded frames are filled with.
pub const LOG_EPS: f32 = -23.025_850_9;

/// Per-connection streaming state: rolling feature queue, encoder hidden
/// state, and decoder hypothesis state, carried forward chunk by chunk.
///
/// `S` is the model's opaque per-stream encoder state type (see
/// `strasr_model::EncoderModel::State`). Decoder hypothesis state is the
/// crate's own `DecoderState`, not generic: the decoding algorithm is a
/// server-wide choice, not a per-stream one, so `StreamState` only needs to
/// carry the state, never its shape.
///
/// Mutated only by its owning `ConnectionHandler` (`accept_waveform`,
/// `current_text`) and by the scheduler's inference worker while the stream
/// sits in the queue (`take_chunk`, `advance`, and whatever the decoder
/// writes into `decoder_state`/`hyp_tokens`), never both at once, per the
/// scheduler's ownership-handoff contract.
pub struct StreamState<S> {
    feature_extractor: Box<dyn FeatureExtractor>,
    features: VecDeque<FeatureFrame>,
    pub encoder_state: S,
    pub decoder_state: DecoderState,
    pub hyp_tokens: Vec<i64>,
    finished: bool,
    /// True while this stream sits in the scheduler queue awaiting or
    /// undergoing inference; guards against double-enqueue. Owned by the
    /// `ConnectionHandler`/scheduler handoff, never read by the decoder.
    pub pending: bool,
    chunk_length: usize,
    segment_length: usize,
    feature_dim: usize,
}

impl<S> StreamState<S> {
    pub fn new(
        feature_extractor: Box<dyn FeatureExtractor>,
        encoder_initial_state: S,
        decoder_initial_state: DecoderState,
        chunk_length: usize,
        segment_length: usize,
    ) -> Self {
        let feature_dim = feature_extractor.feature_dim();
        Self {
            feature_extractor,
            features: VecDeque::new(),
            encoder_state: encoder_initial_state,
            decoder_state: decoder_initial_state,
            hyp_tokens: Vec::new(),
            finished: false,
            pending: false,
            chunk_length,
            segment_length,
            feature_dim,
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn chunk_length(&self) -> usize {
        self.chunk_length
    }

    /// Appends PCM to the stream and extends `features` with whatever whole
    /// frames the feature extractor now has available.
    ///
    /// Fails with `RateMismatch` if `rate != 16000`. If the stream is
    /// already `finished`, samples are discarded silently. The
    /// `ConnectionHandler` is expected not to call this after
    /// `input_finished`, but a defensive no-op keeps the invariant "no new
    /// samples after finished" regardless of caller discipline.
    pub fn accept_waveform(&mut self, rate: u32, pcm: &[f32]) -> Result<(), StreamError> {
        if rate != REQUIRED_SAMPLE_RATE {
            return Err(StreamError::RateMismatch {
                expected: REQUIRED_SAMPLE_RATE,
                got: rate,
            });
        }

        if self.finished {
            return Ok(());
        }

        self.feature_extractor.accept_pcm(pcm);
        self.features.extend(self.feature_extractor.pop_frames());
        Ok(())
    }

    /// Marks the stream finished. Idempotent.
    pub fn input_finished(&mut self) {
        self.finished = true;
    }

    /// Appends `n` frames of `LOG_EPS` padding. Only legal once `finished`
    /// and while `0 < features.len() < chunk_length`. The caller (the
    /// `ConnectionHandler`'s `Flushing` state) is responsible for calling
    /// this at most once, to round the final partial chunk up to exactly
    /// `chunk_length`.
    pub fn add_tail_padding(&mut self, n: usize) {
        debug_assert!(self.finished);
        debug_assert!(!self.features.is_empty() && self.features.len() < self.chunk_length);
        for _ in 0..n {
            self.features.push_back(vec![LOG_EPS; self.feature_dim]);
        }
    }

    /// Detokenizes `hyp_tokens`. Pure read, no mutation.
    pub fn current_text(&self, tokenizer: &dyn Tokenizer) -> String {
        tokenizer.decode(&self.hyp_tokens)
    }

    /// A view over the first `chunk_length` frames, for the inference
    /// worker to feed the encoder. Does not drop anything; pair with
    /// `advance` after the encoder call returns.
    pub fn take_chunk(&self) -> Vec<FeatureFrame> {
        self.features.iter().take(self.chunk_length).cloned().collect()
    }

    /// Drops the first `segment_length` frames from the head of `features`,
    /// the portion the encoder has now advanced past. Called by the
    /// inference worker after a successful `process` call.
    pub fn advance(&mut self) {
        let drop_count = self.segment_length.min(self.features.len());
        self.features.drain(..drop_count);
    }

    /// Borrows the decoder-facing half of this stream's state, for handing
    /// to `Decoder::process` without exposing the encoder-state field `S`.
    pub fn decode_target(&mut self) -> StreamDecodeTarget<'_> {
        StreamDecodeTarget {
            state: &mut self.decoder_state,
            hyp_tokens: &mut self.hyp_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::GreedyState;
    use strasr_model::fakes::FakeFeatureExtractor;

    fn new_stream() -> StreamState<Vec<f32>> {
        StreamState::new(
            Box::new(FakeFeatureExtractor::new()),
            vec![0.0; 4],
            DecoderState::Greedy(GreedyState::new(0, 2, vec![0.0; 4])),
            9,
            4,
        )
    }

    #[test]
    fn rejects_non_16khz_rate() {
        let mut stream = new_stream();
        let err = stream.accept_waveform(8_000, &[0.0; 160]).unwrap_err();
        assert_eq!(err, StreamError::RateMismatch { expected: 16_000, got: 8_000 });
    }

    #[test]
    fn accumulates_whole_frames_only() {
        let mut stream = new_stream();
        stream.accept_waveform(16_000, &vec![1.0; 160]).unwrap();
        assert_eq!(stream.feature_count(), 1);
        stream.accept_waveform(16_000, &vec![1.0; 50]).unwrap();
        assert_eq!(stream.feature_count(), 1, "partial hop shouldn't yield a frame yet");
    }

    #[test]
    fn discards_samples_after_finished() {
        let mut stream = new_stream();
        stream.input_finished();
        stream.accept_waveform(16_000, &vec![1.0; 160]).unwrap();
        assert_eq!(stream.feature_count(), 0);
    }

    #[test]
    fn input_finished_is_idempotent() {
        let mut stream = new_stream();
        stream.input_finished();
        stream.input_finished();
        assert!(stream.finished());
    }

    #[test]
    fn advance_drops_exactly_segment_length() {
        let mut stream = new_stream();
        stream.accept_waveform(16_000, &vec![1.0; 160 * 9]).unwrap();
        assert_eq!(stream.feature_count(), 9);
        stream.advance();
        assert_eq!(stream.feature_count(), 5);
    }

    #[test]
    fn tail_padding_rounds_up_to_chunk_length() {
        let mut stream = new_stream();
        stream.accept_waveform(16_000, &vec![1.0; 160 * 3]).unwrap();
        stream.input_finished();
        let n = stream.chunk_length() - stream.feature_count();
        stream.add_tail_padding(n);
        assert_eq!(stream.feature_count(), stream.chunk_length());
    }
}
