//! The opaque neural-model and tokenizer/feature-extractor collaborators
//! that the streaming decode engine (`strasr-core`, `strasr-scheduler`)
//! is built against. This crate defines only contracts, carrying no
//! model-loading, tensor-runtime, or tokenizer-vocabulary
//! code of its own. A real deployment plugs in an adapter over whatever
//! neural-inference runtime it uses; `fakes` (behind `test-util`) plugs in
//! a deterministic stand-in for this workspace's own tests.

#[cfg(feature = "test-util")]
pub mod fakes;

/// One feature frame (log-mel or equivalent), `feature_dim` floats wide.
pub type FeatureFrame = Vec<f32>;

/// The streaming, stateful transducer encoder.
///
/// Hidden state is generic and opaque to every caller except the adapter
/// that implements this trait: `StreamState` only ever stores a `State`
/// value produced by `initial_state` or returned from `forward`, and the
/// scheduler only ever stacks/unstacks it through `stack_states`/
/// `unstack_states`; nobody else inspects its shape.
pub trait EncoderModel: Send + Sync {
    type State: Clone + Send + 'static;
    type StackedState: Send + 'static;

    /// Frames advanced per encoder step (the non-overlapping portion).
    fn segment_length(&self) -> usize;
    /// Look-ahead frames borrowed from the next segment.
    fn right_context_length(&self) -> usize;
    fn feature_dim(&self) -> usize;
    fn hidden_dim(&self) -> usize;

    /// `chunk_length = segment_length + right_context_length + 3`, the `+3`
    /// compensating for the model's internal two-stage 1/2-subsampling
    /// `((n-1)//2 - 1)//2`.
    fn chunk_length(&self) -> usize {
        self.segment_length() + self.right_context_length() + 3
    }

    fn initial_state(&self) -> Self::State;

    /// Batch `B` streams' encoder states into one value the forward pass
    /// consumes at once.
    fn stack_states(&self, states: Vec<Self::State>) -> Self::StackedState;
    /// The inverse of `stack_states`, applied to the encoder's updated
    /// state batch after `forward` returns.
    fn unstack_states(&self, stacked: Self::StackedState) -> Vec<Self::State>;

    /// `chunks[i]` is stream `i`'s `[chunk_length][feature_dim]` window.
    /// Returns, per stream, `[segment_length][hidden_dim]` encoder output,
    /// plus the updated stacked state.
    fn forward(
        &self,
        chunks: &[Vec<FeatureFrame>],
        stacked_state: Self::StackedState,
    ) -> (Vec<Vec<Vec<f32>>>, Self::StackedState);
}

/// The transducer's predictor ("decoder") network: maps the last
/// `context_size` emitted non-blank tokens to a hidden vector. Pure and
/// deterministic, so callers are free to cache it by context.
pub trait PredictorModel: Send + Sync {
    fn context_size(&self) -> usize;
    fn hidden_dim(&self) -> usize;
    fn blank_id(&self) -> i64;

    /// `context.len()` is always exactly `context_size()`.
    fn forward(&self, context: &[i64]) -> Vec<f32>;
}

/// Combines one encoder frame and one predictor output into vocabulary
/// logits.
pub trait JoinerModel: Send + Sync {
    fn vocab_size(&self) -> usize;
    fn forward(&self, encoder_frame: &[f32], predictor_out: &[f32]) -> Vec<f32>;
}

/// Subword detokenizer. `decode` never fails: unknown IDs are dropped.
pub trait Tokenizer: Send + Sync {
    fn decode(&self, ids: &[i64]) -> String;
}

/// Turns accepted PCM into feature frames. Implementations buffer any
/// partial window internally; `pop_frames` drains whatever whole frames
/// have become available since the last call.
pub trait FeatureExtractor: Send {
    fn feature_dim(&self) -> usize;
    fn accept_pcm(&mut self, samples: &[f32]);
    fn pop_frames(&mut self) -> Vec<FeatureFrame>;
}
