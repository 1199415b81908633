//! Action-value functions and reductions over action-value rows

use crate::DiscreteAction;

/// Action value function Q(s, ·)
pub trait ActionValueFunction {
    /// Observation type
    type Observation;

    /// Get Q-values for all actions, indexed by action
    fn action_values(&self, observation: &Self::Observation) -> crate::Result<Vec<f64>>;

    /// Get the best action and its value, first maximal on ties
    fn best_action_value(
        &self,
        observation: &Self::Observation,
    ) -> crate::Result<(DiscreteAction, f64)> {
        let values = self.action_values(observation)?;
        argmax(&values)
            .map(|i| (DiscreteAction(i), values[i]))
            .ok_or_else(|| crate::RLError::Computation("empty action-value row".to_string()))
    }
}

/// Index of the first maximal value
#[must_use]
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some(b) if v <= values[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// First maximal action among `legal`, in the order `legal` lists them
///
/// Entries of `legal` outside `values` are ignored.
#[must_use]
pub fn argmax_over(values: &[f64], legal: &[DiscreteAction]) -> Option<DiscreteAction> {
    let mut best: Option<DiscreteAction> = None;
    for &action in legal {
        let Some(&v) = values.get(action.0) else {
            continue;
        };
        match best {
            Some(b) if v <= values[b.0] => {}
            _ => best = Some(action),
        }
    }
    best
}

/// Largest value among `legal` actions
#[must_use]
pub fn max_over(values: &[f64], legal: &[DiscreteAction]) -> Option<f64> {
    argmax_over(values, legal).map(|a| values[a.0])
}

/// Normalized exponential of a row, shifted by its max for stability
#[must_use]
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}
