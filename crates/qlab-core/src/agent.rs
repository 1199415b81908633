//! Agent traits and types

use serde::{Deserialize, Serialize};

use crate::{DiscreteAction, Observation, Transition};

/// Core agent trait
pub trait Agent {
    /// Observation type
    type Observation: Observation;

    /// Select one of the `legal` actions given an observation
    fn act(
        &mut self,
        observation: &Self::Observation,
        legal: &[DiscreteAction],
    ) -> crate::Result<DiscreteAction>;

    /// Process a transition from the environment
    ///
    /// `next_legal` holds the actions available from the next observation.
    fn observe(
        &mut self,
        transition: Transition<Self::Observation>,
        next_legal: &[DiscreteAction],
    ) -> crate::Result<()>;

    /// Run a learning update if the agent has enough experience
    ///
    /// Agents that learn inside `observe` keep the default.
    fn learn(&mut self) -> crate::Result<Option<f64>> {
        Ok(None)
    }

    /// Called once an episode has ended, including by truncation
    fn end_episode(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// Get agent metrics
    fn metrics(&self) -> AgentMetrics {
        AgentMetrics::default()
    }
}

/// Agent metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Transitions observed
    pub total_steps: usize,
    /// Learning updates performed
    pub total_updates: usize,
    /// Most recent loss value
    pub loss: Option<f64>,
}

/// Trait for agents that learn from stored experience in separate steps
pub trait Learning: Agent {
    /// Whether enough experience is stored for a training step
    fn ready(&self) -> bool;

    /// Train the agent for one step, returning the loss
    fn train_step(&mut self) -> crate::Result<f64>;
}
