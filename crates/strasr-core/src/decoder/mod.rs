//! Greedy search, modified beam search, and fast beam search, behind one
//! dispatching `Decoder<P, J>`. Each algorithm owns its own hypothesis-state
//! shape
//! (`DecoderState`'s variants); `StreamState` only ever stores the enum,
//! never reaches into a variant directly.

mod fast_beam;
mod greedy;
mod modified_beam;

pub use fast_beam::{FastBeamPath, FastBeamState};
pub use greedy::GreedyState;
pub use modified_beam::{BeamHypothesis, ModifiedBeamState};

use strasr_model::{JoinerModel, PredictorModel};

pub enum DecoderState {
    Greedy(GreedyState),
    ModifiedBeam(ModifiedBeamState),
    FastBeam(FastBeamState),
}

/// Borrows exactly what a decoding pass needs out of a `StreamState`
/// (`decoder_state` and the accumulated `hyp_tokens`) without requiring
/// this crate's decoder logic to know `StreamState`'s encoder-state type
/// parameter.
pub struct StreamDecodeTarget<'a> {
    pub state: &'a mut DecoderState,
    pub hyp_tokens: &'a mut Vec<i64>,
}

/// The decoding algorithm plus its tunables, parameterized over the
/// predictor/joiner model types in use. One `Decoder` is shared read-only
/// across every stream on the server; per-stream mutable state lives in
/// `DecoderState`.
pub enum Decoder<P, J> {
    Greedy {
        predictor: P,
        joiner: J,
    },
    ModifiedBeam {
        predictor: P,
        joiner: J,
        beam_size: usize,
    },
    FastBeam {
        predictor: P,
        joiner: J,
        beam: f32,
        max_states: usize,
        max_contexts: usize,
    },
}

impl<P, J> Decoder<P, J>
where
    P: PredictorModel,
    J: JoinerModel,
{
    pub fn blank_id(&self) -> i64 {
        self.predictor().blank_id()
    }

    pub fn context_size(&self) -> usize {
        self.predictor().context_size()
    }

    fn predictor(&self) -> &P {
        match self {
            Decoder::Greedy { predictor, .. } => predictor,
            Decoder::ModifiedBeam { predictor, .. } => predictor,
            Decoder::FastBeam { predictor, .. } => predictor,
        }
    }

    /// Builds the initial per-stream decoder state for this algorithm.
    pub fn init_state(&self) -> DecoderState {
        let blank_id = self.blank_id();
        let context_size = self.context_size();
        match self {
            Decoder::Greedy { predictor, .. } => {
                let initial_context = vec![blank_id; context_size];
                let initial_predictor_out = predictor.forward(&initial_context);
                DecoderState::Greedy(GreedyState::new(blank_id, context_size, initial_predictor_out))
            }
            Decoder::ModifiedBeam { .. } => {
                DecoderState::ModifiedBeam(ModifiedBeamState::new(blank_id, context_size))
            }
            Decoder::FastBeam { .. } => {
                DecoderState::FastBeam(FastBeamState::new(blank_id, context_size))
            }
        }
    }

    /// Runs one chunk's worth of encoder output (`[segment_length][hidden_dim]`)
    /// through the algorithm this `Decoder` was built with, updating
    /// `target`'s state and hypothesis tokens in place.
    ///
    /// Panics if `target.state`'s variant doesn't match `self`'s. Callers
    /// always build `target.state` via `self.init_state()`, so the two stay
    /// in lockstep for the lifetime of a stream.
    pub fn process(&self, target: StreamDecodeTarget<'_>, encoder_frames: &[Vec<f32>]) {
        let blank_id = self.blank_id();
        let context_size = self.context_size();
        match (self, target.state) {
            (Decoder::Greedy { predictor, joiner }, DecoderState::Greedy(state)) => {
                greedy::process(predictor, joiner, state, target.hyp_tokens, encoder_frames, blank_id);
            }
            (Decoder::ModifiedBeam { predictor, joiner, beam_size }, DecoderState::ModifiedBeam(state)) => {
                modified_beam::process(
                    predictor,
                    joiner,
                    state,
                    target.hyp_tokens,
                    encoder_frames,
                    *beam_size,
                    blank_id,
                    context_size,
                );
            }
            (
                Decoder::FastBeam { predictor, joiner, beam, max_states, max_contexts },
                DecoderState::FastBeam(state),
            ) => {
                fast_beam::process(
                    predictor,
                    joiner,
                    state,
                    target.hyp_tokens,
                    encoder_frames,
                    *beam,
                    *max_states,
                    *max_contexts,
                    blank_id,
                );
            }
            _ => unreachable!("DecoderState variant must match the Decoder it was initialized from"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strasr_model::fakes::{FakeJoinerModel, FakePredictorModel};

    fn greedy_decoder() -> Decoder<FakePredictorModel, FakeJoinerModel> {
        Decoder::Greedy { predictor: FakePredictorModel, joiner: FakeJoinerModel }
    }

    #[test]
    fn init_state_matches_variant() {
        let decoder = greedy_decoder();
        assert!(matches!(decoder.init_state(), DecoderState::Greedy(_)));
    }

    #[test]
    fn process_routes_to_matching_algorithm() {
        let decoder = greedy_decoder();
        let mut state = decoder.init_state();
        let mut hyp_tokens = Vec::new();
        let target = StreamDecodeTarget { state: &mut state, hyp_tokens: &mut hyp_tokens };
        decoder.process(target, &[vec![9.0; 4]; 3]);
        assert!(!hyp_tokens.is_empty());
    }
}
