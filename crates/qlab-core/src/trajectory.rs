//! Transitions

use serde::{Deserialize, Serialize};

use crate::{DiscreteAction, Reward};

/// Single `(state, action, reward, next_state)` transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<O> {
    /// Current observation
    pub observation: O,
    /// Action taken
    pub action: DiscreteAction,
    /// Reward received
    pub reward: Reward,
    /// Next observation
    pub next_observation: O,
    /// Whether the next observation is terminal
    pub done: bool,
}

impl<O> Transition<O> {
    /// Create a new transition
    pub fn new(
        observation: O,
        action: DiscreteAction,
        reward: impl Into<Reward>,
        next_observation: O,
        done: bool,
    ) -> Self {
        Self {
            observation,
            action,
            reward: reward.into(),
            next_observation,
            done,
        }
    }
}
