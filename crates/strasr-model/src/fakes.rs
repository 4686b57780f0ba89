//! Deterministic stand-ins for the opaque model/tokenizer/feature-extractor
//! collaborators, gated behind `feature = "test-util"` (mirroring `tokio`'s
//! own `test-util` convention) so the workspace's integration tests can
//! drive the full pipeline without a real neural model.

use crate::{EncoderModel, FeatureExtractor, JoinerModel, PredictorModel, Tokenizer};

pub const FEATURE_DIM: usize = 4;
pub const HIDDEN_DIM: usize = 4;
pub const SEGMENT_LENGTH: usize = 4;
pub const RIGHT_CONTEXT_LENGTH: usize = 2;
pub const CONTEXT_SIZE: usize = 2;
pub const VOCAB_SIZE: usize = 8;
pub const BLANK_ID: i64 = 0;
pub const HOP_SAMPLES: usize = 160;

/// Groups raw PCM into frames by averaging fixed-size hops, then repeats
/// that scalar across `FEATURE_DIM`. Not a real acoustic feature, just
/// enough structure for the encoder fake to react to actual audio content.
#[derive(Default)]
pub struct FakeFeatureExtractor {
    tail: Vec<f32>,
}

impl FakeFeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureExtractor for FakeFeatureExtractor {
    fn feature_dim(&self) -> usize {
        FEATURE_DIM
    }

    fn accept_pcm(&mut self, samples: &[f32]) {
        self.tail.extend_from_slice(samples);
    }

    fn pop_frames(&mut self) -> Vec<Vec<f32>> {
        let mut frames = Vec::new();
        while self.tail.len() >= HOP_SAMPLES {
            let hop: Vec<f32> = self.tail.drain(..HOP_SAMPLES).collect();
            let mean = hop.iter().sum::<f32>() / HOP_SAMPLES as f32;
            frames.push(vec![mean; FEATURE_DIM]);
        }
        frames
    }
}

/// A toy linear recurrence standing in for the Zipformer/Emformer encoder:
/// `state' = 0.5*state + last_segment_frame`, `out[j] = 0.5*state + chunk[j]`.
pub struct FakeEncoderModel;

impl EncoderModel for FakeEncoderModel {
    type State = Vec<f32>;
    type StackedState = Vec<Vec<f32>>;

    fn segment_length(&self) -> usize {
        SEGMENT_LENGTH
    }

    fn right_context_length(&self) -> usize {
        RIGHT_CONTEXT_LENGTH
    }

    fn feature_dim(&self) -> usize {
        FEATURE_DIM
    }

    fn hidden_dim(&self) -> usize {
        HIDDEN_DIM
    }

    fn initial_state(&self) -> Self::State {
        vec![0.0; HIDDEN_DIM]
    }

    fn stack_states(&self, states: Vec<Self::State>) -> Self::StackedState {
        states
    }

    fn unstack_states(&self, stacked: Self::StackedState) -> Vec<Self::State> {
        stacked
    }

    fn forward(
        &self,
        chunks: &[Vec<Vec<f32>>],
        stacked_state: Self::StackedState,
    ) -> (Vec<Vec<Vec<f32>>>, Self::StackedState) {
        let mut out_batch = Vec::with_capacity(chunks.len());
        let mut new_states = Vec::with_capacity(chunks.len());

        for (chunk, state) in chunks.iter().zip(stacked_state.into_iter()) {
            let mut running = state;
            let mut out_frames = Vec::with_capacity(SEGMENT_LENGTH);
            for frame in chunk.iter().take(SEGMENT_LENGTH) {
                let out: Vec<f32> = (0..HIDDEN_DIM)
                    .map(|h| 0.5 * running[h] + frame[h % frame.len().max(1)])
                    .collect();
                running = out.clone();
                out_frames.push(out);
            }
            new_states.push(running);
            out_batch.push(out_frames);
        }

        (out_batch, new_states)
    }
}

/// `forward` sums the context IDs into every lane of the hidden vector.
pub struct FakePredictorModel;

impl PredictorModel for FakePredictorModel {
    fn context_size(&self) -> usize {
        CONTEXT_SIZE
    }

    fn hidden_dim(&self) -> usize {
        HIDDEN_DIM
    }

    fn blank_id(&self) -> i64 {
        BLANK_ID
    }

    fn forward(&self, context: &[i64]) -> Vec<f32> {
        let sum: f32 = context.iter().map(|&id| id as f32).sum();
        vec![sum; HIDDEN_DIM]
    }
}

/// `logits[v] = sum(encoder_frame) + sum(predictor_out) - v`, biasing
/// larger encoder/predictor activity towards higher non-blank token IDs
/// while keeping blank (`v == 0`) competitive when both are near zero.
pub struct FakeJoinerModel;

impl JoinerModel for FakeJoinerModel {
    fn vocab_size(&self) -> usize {
        VOCAB_SIZE
    }

    fn forward(&self, encoder_frame: &[f32], predictor_out: &[f32]) -> Vec<f32> {
        let energy: f32 = encoder_frame.iter().sum::<f32>() + predictor_out.iter().sum::<f32>();
        (0..VOCAB_SIZE)
            .map(|v| if v == 0 { 0.0 } else { energy - v as f32 * 0.1 })
            .collect()
    }
}

/// Maps token ID `i` to the subword piece `"▁w{i}"`, matching SentencePiece's
/// `▁`-for-space convention (`tokens_to_text` replaces it with a literal
/// space and trims the leading one).
pub struct FakeTokenizer;

impl Tokenizer for FakeTokenizer {
    fn decode(&self, ids: &[i64]) -> String {
        ids.iter()
            .map(|&id| format!("▁w{id}").replace('▁', " "))
            .collect::<String>()
            .trim_start()
            .to_string()
    }
}
