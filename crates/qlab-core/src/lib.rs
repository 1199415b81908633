//! Core reinforcement learning traits and types for qlab
//!
//! This crate provides the shared vocabulary of the qlab workspace:
//! environments, spaces, transitions, action-value helpers and the
//! agent traits the training drivers are written against.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod action;
pub mod agent;
pub mod environment;
pub mod error;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod trajectory;
pub mod value;

// Re-export core traits and types
pub use action::{DiscreteAction, DiscreteSpace};
pub use agent::{Agent, AgentMetrics, Learning};
pub use environment::{Environment, Episode, Step, StepInfo, TrackedEnvironment};
pub use error::{RLError, Result};
pub use observation::{
    BoxObservationSpace, DiscreteObservation, DiscreteObservationSpace, Observation,
    ObservationSpace, VectorObservation,
};
pub use policy::{ActionSelector, EpsilonGreedy, SoftmaxExploration};
pub use reward::Reward;
pub use trajectory::Transition;
pub use value::ActionValueFunction;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Agent, DiscreteAction, DiscreteSpace, Environment, Learning, Observation,
        ObservationSpace, RLError, Result, Reward, Step, Transition,
    };
}
