/// Per-stream state for greedy search: the rolling predictor context (the
/// last `context_size` emitted token IDs, blank-seeded) plus the predictor
/// output computed from it. The predictor output is cached and only
/// recomputed when a non-blank token changes the context, since the
/// predictor is pure in its context argument.
pub struct GreedyState {
    context: Vec<i64>,
    cached_predictor_out: Vec<f32>,
}

impl GreedyState {
    pub fn new(blank_id: i64, context_size: usize, initial_predictor_out: Vec<f32>) -> Self {
        Self {
            context: vec![blank_id; context_size],
            cached_predictor_out: initial_predictor_out,
        }
    }
}

/// One joiner call per encoder frame; on a non-blank argmax, advances the
/// context by one token (dropping the oldest) and recomputes the cached
/// predictor output.
pub fn process<P, J>(
    predictor: &P,
    joiner: &J,
    state: &mut GreedyState,
    hyp_tokens: &mut Vec<i64>,
    encoder_frames: &[Vec<f32>],
    blank_id: i64,
) where
    P: strasr_model::PredictorModel,
    J: strasr_model::JoinerModel,
{
    for frame in encoder_frames {
        let logits = joiner.forward(frame, &state.cached_predictor_out);
        let token = argmax(&logits);
        if token != blank_id {
            hyp_tokens.push(token);
            let len = state.context.len();
            state.context.rotate_left(1);
            state.context[len - 1] = token;
            state.cached_predictor_out = predictor.forward(&state.context);
        }
    }
}

fn argmax(logits: &[f32]) -> i64 {
    logits
        .iter()
        .enumerate()
        .fold((0usize, f32::MIN), |(best_i, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best_i, best_v)
            }
        })
        .0 as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use strasr_model::fakes::{FakeJoinerModel, FakePredictorModel, BLANK_ID, CONTEXT_SIZE};
    use strasr_model::PredictorModel;

    #[test]
    fn silent_input_never_emits() {
        let predictor = FakePredictorModel;
        let joiner = FakeJoinerModel;
        let initial = predictor.forward(&vec![BLANK_ID; CONTEXT_SIZE]);
        let mut state = GreedyState::new(BLANK_ID, CONTEXT_SIZE, initial);
        let mut hyp_tokens = Vec::new();
        let frames = vec![vec![0.0; 4]; 5];
        process(&predictor, &joiner, &mut state, &mut hyp_tokens, &frames, BLANK_ID);
        assert!(hyp_tokens.is_empty());
    }

    #[test]
    fn loud_input_emits_tokens() {
        let predictor = FakePredictorModel;
        let joiner = FakeJoinerModel;
        let initial = predictor.forward(&vec![BLANK_ID; CONTEXT_SIZE]);
        let mut state = GreedyState::new(BLANK_ID, CONTEXT_SIZE, initial);
        let mut hyp_tokens = Vec::new();
        let frames = vec![vec![10.0; 4]; 5];
        process(&predictor, &joiner, &mut state, &mut hyp_tokens, &frames, BLANK_ID);
        assert!(!hyp_tokens.is_empty());
        assert!(hyp_tokens.iter().all(|&t| t != BLANK_ID));
    }
}
