use std::collections::HashMap;

/// One beam hypothesis: the full token sequence so far (including the
/// `context_size` leading blank-seed IDs) and its accumulated log
/// probability.
#[derive(Clone, Debug)]
pub struct BeamHypothesis {
    pub tokens: Vec<i64>,
    pub log_prob: f32,
}

pub struct ModifiedBeamState {
    pub hyps: Vec<BeamHypothesis>,
}

impl ModifiedBeamState {
    pub fn new(blank_id: i64, context_size: usize) -> Self {
        Self {
            hyps: vec![BeamHypothesis {
                tokens: vec![blank_id; context_size],
                log_prob: 0.0,
            }],
        }
    }
}

/// Expands every surviving hypothesis over the full vocabulary each frame,
/// merges hypotheses that land on the same last-`context_size`-token suffix
/// by summing their probability mass (log-sum-exp), then keeps the
/// `beam_size` most likely survivors.
pub fn process<P, J>(
    predictor: &P,
    joiner: &J,
    state: &mut ModifiedBeamState,
    hyp_tokens: &mut Vec<i64>,
    encoder_frames: &[Vec<f32>],
    beam_size: usize,
    blank_id: i64,
    context_size: usize,
) where
    P: strasr_model::PredictorModel,
    J: strasr_model::JoinerModel,
{
    for frame in encoder_frames {
        let mut candidates: Vec<BeamHypothesis> = Vec::new();

        for hyp in &state.hyps {
            let context = &hyp.tokens[hyp.tokens.len() - context_size..];
            let predictor_out = predictor.forward(context);
            let logits = joiner.forward(frame, &predictor_out);
            let log_probs = log_softmax(&logits);

            for (v, &lp) in log_probs.iter().enumerate() {
                let mut tokens = hyp.tokens.clone();
                if v as i64 != blank_id {
                    tokens.push(v as i64);
                }
                candidates.push(BeamHypothesis {
                    tokens,
                    log_prob: hyp.log_prob + lp,
                });
            }
        }

        let mut merged = merge_by_tokens(candidates, context_size);
        merged.sort_by(|a, b| b.log_prob.partial_cmp(&a.log_prob).unwrap());
        merged.truncate(beam_size);
        state.hyps = merged;
    }

    if let Some(best) = state
        .hyps
        .iter()
        .max_by(|a, b| a.log_prob.partial_cmp(&b.log_prob).unwrap())
    {
        *hyp_tokens = best.tokens[context_size..].to_vec();
    }
}

/// Merges candidates that share the same last `context_size` tokens: that
/// suffix is all the predictor ever sees, so two hypotheses differing only
/// in earlier history are indistinguishable going forward and should
/// collapse into one slot instead of each holding a beam position.
fn merge_by_tokens(candidates: Vec<BeamHypothesis>, context_size: usize) -> Vec<BeamHypothesis> {
    let mut by_suffix: HashMap<Vec<i64>, BeamHypothesis> = HashMap::with_capacity(candidates.len());
    for cand in candidates {
        let suffix = cand.tokens[cand.tokens.len() - context_size..].to_vec();
        by_suffix
            .entry(suffix)
            .and_modify(|existing| existing.log_prob = log_sum_exp(existing.log_prob, cand.log_prob))
            .or_insert(cand);
    }
    by_suffix.into_values().collect()
}

fn log_sum_exp(a: f32, b: f32) -> f32 {
    let m = a.max(b);
    if m == f32::NEG_INFINITY {
        return m;
    }
    m + ((a - m).exp() + (b - m).exp()).ln()
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
    fn beam_width_is_respected() {
        let predictor = FakePredictorModel;
        let joiner = FakeJoinerModel;
        let mut state = ModifiedBeamState::new(BLANK_ID, CONTEXT_SIZE);
        let mut hyp_tokens = Vec::new();
        let frames = vec![vec![5.0; 4]; 3];
        process(&predictor, &joiner, &mut state, &mut hyp_tokens, &frames, 4, BLANK_ID, CONTEXT_SIZE);
        assert!(state.hyps.len() <= 4);
    }

    #[test]
    fn merges_hyps_sharing_a_context_suffix_despite_different_history() {
        let a = BeamHypothesis { tokens: vec![1, 2, 5, 3], log_prob: 0.3f32.ln() };
        let b = BeamHypothesis { tokens: vec![2, 5, 3], log_prob: 0.5f32.ln() };
        let merged = merge_by_tokens(vec![a, b], 2);
        assert_eq!(merged.len(), 1, "both hyps share the last 2 tokens [5, 3] and should collapse");
        let want = (0.3f32.ln().exp() + 0.5f32.ln().exp()).ln();
        assert!((merged[0].log_prob - want).abs() < 1e-5);
    }

    #[test]
    fn log_sum_exp_matches_naive() {
        let a = 0.3f32.ln();
        let b = 0.5f32.ln();
        let got = log_sum_exp(a, b);
        let want = (a.exp() + b.exp()).ln();
        assert!((got - want).abs() < 1e-5);
    }
}
