use std::collections::HashMap;

/// One live path in the pruned search: its emitted tokens, the rolling
/// predictor context those tokens imply, and its accumulated score.
#[derive(Clone, Debug)]
pub struct FastBeamPath {
    pub tokens: Vec<i64>,
    pub context: Vec<i64>,
    pub score: f32,
}

pub struct FastBeamState {
    pub paths: Vec<FastBeamPath>,
}

impl FastBeamState {
    pub fn new(blank_id: i64, context_size: usize) -> Self {
        Self {
            paths: vec![FastBeamPath {
                tokens: Vec::new(),
                context: vec![blank_id; context_size],
                score: 0.0,
            }],
        }
    }
}

/// FSA-style pruned search: expands every path over the vocabulary, merges
/// paths that land on the same predictor context (keeping the higher
/// score), then cuts first to `max_contexts` distinct contexts and finally
/// to whatever sits within `beam` of the best score, capped at
/// `max_states` paths.
pub fn process<P, J>(
    predictor: &P,
    joiner: &J,
    state: &mut FastBeamState,
    hyp_tokens: &mut Vec<i64>,
    encoder_frames: &[Vec<f32>],
    beam: f32,
    max_states: usize,
    max_contexts: usize,
    blank_id: i64,
) where
    P: strasr_model::PredictorModel,
    J: strasr_model::JoinerModel,
{
    for frame in encoder_frames {
        let mut candidates = Vec::new();

        for path in &state.paths {
            let predictor_out = predictor.forward(&path.context);
            let logits = joiner.forward(frame, &predictor_out);
            let log_probs = log_softmax(&logits);

            for (v, &lp) in log_probs.iter().enumerate() {
                let score = path.score + lp;
                let (tokens, context) = if v as i64 == blank_id {
                    (path.tokens.clone(), path.context.clone())
                } else {
                    let mut tokens = path.tokens.clone();
                    tokens.push(v as i64);
                    let mut context = path.context.clone();
                    let len = context.len();
                    context.rotate_left(1);
                    context[len - 1] = v as i64;
                    (tokens, context)
                };
                candidates.push(FastBeamPath { tokens, context, score });
            }
        }

        let mut by_context: HashMap<Vec<i64>, FastBeamPath> = HashMap::new();
        for cand in candidates {
            by_context
                .entry(cand.context.clone())
                .and_modify(|existing| {
                    if cand.score > existing.score {
                        *existing = cand.clone();
                    }
                })
                .or_insert(cand);
        }

        let mut paths: Vec<FastBeamPath> = by_context.into_values().collect();
        paths.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        paths.truncate(max_contexts);

        let best_score = paths.first().map(|p| p.score).unwrap_or(0.0);
        paths.retain(|p| best_score - p.score <= beam);
        paths.truncate(max_states);

        state.paths = paths;
    }

    if let Some(best) = state
        .paths
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap())
    {
        *hyp_tokens = best.tokens.clone();
    }
}

fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::MIN, f32::max);
    let sum: f32 = logits.iter().map(|&v| (v - max).exp()).sum();
    let log_sum = sum.ln();
    logits.iter().map(|&v| v - max - log_sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strasr_model::fakes::{FakeJoinerModel, FakePredictorModel, BLANK_ID, CONTEXT_SIZE};

    #[test]
    fn max_states_bounds_surviving_paths() {
        let predictor = FakePredictorModel;
        let joiner = FakeJoinerModel;
        let mut state = FastBeamState::new(BLANK_ID, CONTEXT_SIZE);
        let mut hyp_tokens = Vec::new();
        let frames = vec![vec![3.0; 4]; 4];
        process(&predictor, &joiner, &mut state, &mut hyp_tokens, &frames, 8.0, 4, 16, BLANK_ID);
        assert!(state.paths.len() <= 4);
    }

    #[test]
    fn tight_beam_keeps_only_best_path() {
        let predictor = FakePredictorModel;
        let joiner = FakeJoinerModel;
        let mut state = FastBeamState::new(BLANK_ID, CONTEXT_SIZE);
        let mut hyp_tokens = Vec::new();
        let frames = vec![vec![3.0; 4]; 2];
        process(&predictor, &joiner, &mut state, &mut hyp_tokens, &frames, 0.0, 64, 64, BLANK_ID);
        assert_eq!(state.paths.len(), 1);
    }
}
