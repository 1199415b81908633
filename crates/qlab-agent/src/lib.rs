//! Tabular and deep Q-learning agents for qlab
//!
//! This crate provides:
//! - a lazily filled Q-table with Q-learning and SARSA updates
//! - a ring-buffer replay memory backed by `ndarray`
//! - a small multilayer perceptron trained with RMSProp
//! - a DQN agent with a hard-synced target network
//! - episode drivers that wire an agent to an environment

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod buffer;
pub mod dqn;
pub mod network;
pub mod tabular;
pub mod trainer;
pub mod utils;

use rand::rngs::StdRng;
use rand::SeedableRng;

// Re-export agents
pub use dqn::{DqnAgent, DqnConfig};
pub use tabular::{QTable, TabularAgent, TabularConfig, UpdateRule};

// Re-export components
pub use buffer::{ReplayBuffer, StoredTransition, TransitionBatch};
pub use network::{Activation, FunctionApproximator, QNetwork, QNetworkConfig, RmsProp};
pub use trainer::{EpisodeStats, Trainer, TrainerConfig, TrainingReport};
pub use utils::RunningReward;

/// Seeded generator when a seed is given, entropy-seeded otherwise
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DqnAgent, DqnConfig, QTable, ReplayBuffer, TabularAgent, TabularConfig, Trainer,
        TrainerConfig,
    };
    pub use qlab_core::prelude::*;
}
