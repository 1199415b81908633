//! Exploration rules that turn an action-value row into an action

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore};

use crate::value::{argmax_over, softmax};
use crate::{DiscreteAction, RLError};

/// Selects an action from the action values of the current state
pub trait ActionSelector {
    /// Pick one of `legal` given the full action-value row
    fn select(
        &self,
        values: &[f64],
        legal: &[DiscreteAction],
        rng: &mut dyn RngCore,
    ) -> crate::Result<DiscreteAction>;
}

fn check_legal(values: &[f64], legal: &[DiscreteAction]) -> crate::Result<()> {
    if legal.is_empty() {
        return Err(RLError::InvalidAction("no legal action to choose from".to_string()));
    }
    if let Some(action) = legal.iter().find(|a| a.0 >= values.len()) {
        return Err(RLError::DimensionMismatch {
            expected: values.len(),
            actual: action.0 + 1,
        });
    }
    Ok(())
}

fn uniform(legal: &[DiscreteAction], rng: &mut dyn RngCore) -> DiscreteAction {
    legal[rng.gen_range(0..legal.len())]
}

/// Greedy with probability `epsilon`, uniform otherwise.
///
/// `epsilon` is the greedy ratio: `0.9` exploits nine times out of ten.
/// A row that is all zeros over the legal actions has nothing to exploit
/// and always yields a uniform choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonGreedy {
    /// Probability of picking the maximal action
    pub epsilon: f64,
}

impl EpsilonGreedy {
    /// Create a new epsilon-greedy rule
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.clamp(0.0, 1.0),
        }
    }
}

impl ActionSelector for EpsilonGreedy {
    #[allow(clippy::float_cmp)]
    fn select(
        &self,
        values: &[f64],
        legal: &[DiscreteAction],
        rng: &mut dyn RngCore,
    ) -> crate::Result<DiscreteAction> {
        check_legal(values, legal)?;

        let untouched = legal.iter().all(|a| values[a.0] == 0.0);
        if rng.gen::<f64>() > self.epsilon || untouched {
            return Ok(uniform(legal, rng));
        }
        argmax_over(values, legal)
            .ok_or_else(|| RLError::Computation("no maximal action".to_string()))
    }
}

/// Softmax sampling with probability `epsilon`, uniform otherwise.
///
/// The exploit branch draws from the categorical distribution given by
/// the normalized exponential of the values, so better actions are
/// favoured in proportion to their relative value instead of always
/// being taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftmaxExploration {
    /// Probability of sampling from the softmax distribution
    pub epsilon: f64,
}

impl SoftmaxExploration {
    /// Create a new softmax exploration rule
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.clamp(0.0, 1.0),
        }
    }
}

impl ActionSelector for SoftmaxExploration {
    fn select(
        &self,
        values: &[f64],
        legal: &[DiscreteAction],
        rng: &mut dyn RngCore,
    ) -> crate::Result<DiscreteAction> {
        check_legal(values, legal)?;

        if rng.gen::<f64>() < self.epsilon {
            let row: Vec<f64> = legal.iter().map(|a| values[a.0]).collect();
            let dist = WeightedIndex::new(softmax(&row))
                .map_err(|e| RLError::Computation(format!("softmax weights: {e}")))?;
            return Ok(legal[dist.sample(rng)]);
        }
        Ok(uniform(legal, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn all(n: usize) -> Vec<DiscreteAction> {
        (0..n).map(DiscreteAction).collect()
    }

    fn frequencies(
        selector: &dyn ActionSelector,
        values: &[f64],
        legal: &[DiscreteAction],
        draws: usize,
    ) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = vec![0usize; values.len()];
        for _ in 0..draws {
            counts[selector.select(values, legal, &mut rng).unwrap().0] += 1;
        }
        counts.into_iter().map(|c| c as f64 / draws as f64).collect()
    }

    #[test]
    fn test_greedy_with_full_epsilon_is_deterministic() {
        let freq = frequencies(&EpsilonGreedy::new(1.0), &[0.1, 0.7, 0.7], &all(3), 1_000);
        assert!((freq[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_greedy_zero_row_falls_back_to_uniform() {
        let freq = frequencies(&EpsilonGreedy::new(1.0), &[0.0, 0.0], &all(2), 20_000);
        assert!((freq[0] - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_greedy_zero_epsilon_is_uniform() {
        let freq = frequencies(&EpsilonGreedy::new(0.0), &[0.0, 9.0, 0.0], &all(3), 30_000);
        for f in freq {
            assert!((f - 1.0 / 3.0).abs() < 0.02);
        }
    }

    #[test]
    fn test_greedy_only_picks_legal() {
        let legal = [DiscreteAction(0), DiscreteAction(2)];
        let freq = frequencies(&EpsilonGreedy::new(0.5), &[0.0, 5.0, 1.0], &legal, 2_000);
        assert!(freq[1].abs() < 1e-12);
    }

    #[test]
    fn test_softmax_full_epsilon_matches_distribution() {
        let values = [0.0, 3.0_f64.ln()];
        let freq = frequencies(&SoftmaxExploration::new(1.0), &values, &all(2), 40_000);
        assert!((freq[0] - 0.25).abs() < 0.015);
        assert!((freq[1] - 0.75).abs() < 0.015);
    }

    #[test]
    fn test_softmax_zero_epsilon_is_uniform() {
        let freq = frequencies(&SoftmaxExploration::new(0.0), &[10.0, 0.0], &all(2), 20_000);
        assert!((freq[0] - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_rejects_empty_and_out_of_range_legal_sets() {
        let mut rng = StdRng::seed_from_u64(0);
        let greedy = EpsilonGreedy::new(0.9);
        assert!(matches!(
            greedy.select(&[1.0], &[], &mut rng),
            Err(RLError::InvalidAction(_))
        ));
        assert!(matches!(
            greedy.select(&[1.0], &[DiscreteAction(3)], &mut rng),
            Err(RLError::DimensionMismatch { expected: 1, actual: 4 })
        ));
    }
}
