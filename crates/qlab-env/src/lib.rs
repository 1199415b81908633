//! Reinforcement learning environments for qlab
//!
//! This crate provides the environments the qlab drivers train against:
//! - a one-dimensional corridor walk for tabular Q-learning
//! - classic control CartPole for DQN
//! - tic-tac-toe against a scripted opponent

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classic;
pub mod corridor;
pub mod tictactoe;
pub mod wrappers;

use rand::rngs::StdRng;
use rand::SeedableRng;

// Re-export environments
pub use classic::{CartPoleConfig, CartPoleEnv};
pub use corridor::{CorridorConfig, CorridorEnv};
pub use tictactoe::{Board, Opponent, Piece, TicTacToeConfig, TicTacToeEnv};
pub use wrappers::TimeLimit;

// Re-export core types
pub use qlab_core::{
    DiscreteAction, DiscreteSpace, Environment, Episode, Observation, ObservationSpace, Reward,
    Step,
};

/// Seeded generator when a seed is given, entropy-seeded otherwise
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{CartPoleEnv, CorridorEnv, TicTacToeEnv, TimeLimit};
    pub use qlab_core::prelude::*;
}
