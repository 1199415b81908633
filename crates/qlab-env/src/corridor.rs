//! One-dimensional corridor walk
//!
//! The corridor looks like `-----T`: the agent starts in the leftmost
//! cell and the rightmost cell is terminal. Moving right from the cell
//! next to the terminal pays a reward of one, every other move pays
//! nothing. Moving left from the first cell leaves the agent in place.

use serde::{Deserialize, Serialize};
use tracing::trace;

use qlab_core::{
    DiscreteAction, DiscreteObservation, DiscreteObservationSpace, DiscreteSpace, Environment,
    ObservationSpace, RLError, Result, Step,
};

/// Move one cell to the left
pub const LEFT: DiscreteAction = DiscreteAction(0);
/// Move one cell to the right
pub const RIGHT: DiscreteAction = DiscreteAction(1);

/// Corridor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorConfig {
    /// Number of cells, the last one terminal
    pub n_states: usize,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self { n_states: 6 }
    }
}

/// Corridor environment
#[derive(Debug, Clone)]
pub struct CorridorEnv {
    config: CorridorConfig,
    position: usize,
}

impl CorridorEnv {
    /// Create a new corridor
    pub fn new(config: CorridorConfig) -> Result<Self> {
        if config.n_states < 2 {
            return Err(RLError::Config(format!(
                "corridor needs at least 2 cells, got {}",
                config.n_states
            )));
        }
        Ok(Self {
            config,
            position: 0,
        })
    }

    /// Index of the terminal cell
    #[must_use]
    pub fn terminal_state(&self) -> usize {
        self.config.n_states - 1
    }

    /// Current cell
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Next cell and reward for moving from `state`
    pub fn feedback(&self, state: usize, action: DiscreteAction) -> Result<(usize, f64)> {
        match action {
            RIGHT => {
                let reward = if state + 1 == self.terminal_state() { 1.0 } else { 0.0 };
                Ok(((state + 1).min(self.terminal_state()), reward))
            }
            LEFT => Ok((state.saturating_sub(1), 0.0)),
            other => Err(RLError::InvalidAction(format!(
                "corridor action {} out of range",
                other.0
            ))),
        }
    }
}

impl Environment for CorridorEnv {
    type Observation = DiscreteObservation;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        Box::new(DiscreteObservationSpace::new(self.config.n_states))
    }

    fn action_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(2)
    }

    fn reset(&mut self) -> Result<Self::Observation> {
        self.position = 0;
        Ok(DiscreteObservation(self.position))
    }

    fn step(&mut self, action: DiscreteAction) -> Result<Step<Self::Observation>> {
        if self.position == self.terminal_state() {
            return Err(RLError::Environment(
                "corridor episode already finished, call reset".to_string(),
            ));
        }

        let (next, reward) = self.feedback(self.position, action)?;
        trace!(from = self.position, to = next, reward, "corridor step");
        self.position = next;

        Ok(Step::new(
            DiscreteObservation(next),
            reward,
            next == self.terminal_state(),
        ))
    }
}
