//! Shared setup for the qlab demo binaries
//!
//! Every demo reads an optional JSON config from its first positional
//! argument, falls back to defaults, validates and then trains.

#![warn(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use qlab_agent::{
    DqnAgent, DqnConfig, TabularAgent, TabularConfig, Trainer, TrainerConfig, TrainingReport,
};
use qlab_core::{DiscreteObservation, Environment, ObservationSpace, TrackedEnvironment};
use qlab_env::{
    Board, CartPoleConfig, CartPoleEnv, CorridorConfig, CorridorEnv, TicTacToeConfig,
    TicTacToeEnv, TimeLimit,
};

/// Install the global `fmt` subscriber, honoring `RUST_LOG`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Config path given as the first positional argument
#[must_use]
pub fn config_path_from_args() -> Option<PathBuf> {
    std::env::args_os().nth(1).map(PathBuf::from)
}

/// Read a JSON config, or the defaults when no path is given
pub fn load_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Corridor walk with a tabular agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OneDegreeConfig {
    /// Agent hyperparameters
    pub agent: TabularConfig,
    /// Corridor shape
    pub env: CorridorConfig,
    /// Episode count and logging
    pub trainer: TrainerConfig,
    /// Where to write the learned table, if anywhere
    pub save_table: Option<PathBuf>,
}

impl Default for OneDegreeConfig {
    fn default() -> Self {
        Self {
            agent: TabularConfig::default(),
            env: CorridorConfig::default(),
            trainer: TrainerConfig {
                episodes: 13,
                ..TrainerConfig::default()
            },
            save_table: None,
        }
    }
}

impl OneDegreeConfig {
    /// Validate every section
    pub fn validate(&self) -> qlab_core::Result<()> {
        self.agent.validate()?;
        self.trainer.validate()
    }
}

/// Train on the corridor, returning the report and the agent
pub fn run_one_degree(
    config: &OneDegreeConfig,
) -> Result<(TrainingReport, TabularAgent<DiscreteObservation>)> {
    config.validate().context("invalid one_degree config")?;
    let env = CorridorEnv::new(config.env.clone()).context("failed to build corridor")?;
    let mut env = TrackedEnvironment::new(env);
    let mut agent = TabularAgent::new(config.agent.clone(), env.action_space().n)?;
    let mut trainer = Trainer::new(config.trainer.clone())?;
    let report = trainer.run(&mut env, &mut agent)?;

    let mut rows: Vec<_> = agent.table().iter().collect();
    rows.sort_by_key(|(state, _)| state.0);
    for (state, values) in rows {
        info!(state = state.0, left = values[0], right = values[1], "q-table row");
    }
    if let Some(path) = &config.save_table {
        agent
            .table()
            .save_json(path)
            .with_context(|| format!("failed to save q-table to {}", path.display()))?;
        info!(path = %path.display(), "saved q-table");
    }
    Ok((report, agent))
}

/// DQN on CartPole
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleDemoConfig {
    /// Agent hyperparameters
    pub agent: DqnConfig,
    /// Physics and seed
    pub env: CartPoleConfig,
    /// Episode count and logging
    pub trainer: TrainerConfig,
    /// Step limit per episode, unlimited if unset
    pub max_steps: Option<usize>,
}

impl Default for CartPoleDemoConfig {
    fn default() -> Self {
        Self {
            agent: DqnConfig::default(),
            env: CartPoleConfig::default(),
            trainer: TrainerConfig::default(),
            max_steps: None,
        }
    }
}

impl CartPoleDemoConfig {
    /// Validate every section
    pub fn validate(&self) -> qlab_core::Result<()> {
        self.agent.validate()?;
        self.trainer.validate()?;
        if self.max_steps == Some(0) {
            return Err(qlab_core::RLError::Config(
                "max_steps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Train a DQN agent on CartPole
pub fn run_dqn_cartpole(config: &CartPoleDemoConfig) -> Result<(TrainingReport, DqnAgent)> {
    config.validate().context("invalid dqn_cartpole config")?;
    let env = CartPoleEnv::new(config.env.clone());
    let limit = config.max_steps.unwrap_or(usize::MAX);
    let mut env = TrackedEnvironment::new(TimeLimit::new(env, limit));

    let n_features = env.observation_space().flat_dim();
    let n_actions = env.action_space().n;
    let mut agent = DqnAgent::new(config.agent.clone(), n_features, n_actions)
        .context("failed to build dqn agent")?;
    let mut trainer = Trainer::new(config.trainer.clone())?;
    let report = trainer.run(&mut env, &mut agent)?;

    let losses = agent.loss_history();
    if let Some(last) = losses.last() {
        info!(
            learn_steps = agent.learn_steps(),
            last_loss = *last,
            "dqn training summary"
        );
    }
    Ok((report, agent))
}

/// Tabular agent against a scripted tic-tac-toe opponent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TicTacToeDemoConfig {
    /// Agent hyperparameters
    pub agent: TabularConfig,
    /// Rewards and opponent
    pub env: TicTacToeConfig,
    /// Episode count and logging
    pub trainer: TrainerConfig,
    /// Where to write the learned table, if anywhere
    pub save_table: Option<PathBuf>,
}

impl Default for TicTacToeDemoConfig {
    fn default() -> Self {
        Self {
            agent: TabularConfig::default(),
            env: TicTacToeConfig::default(),
            trainer: TrainerConfig {
                episodes: 5000,
                log_every: 500,
                ..TrainerConfig::default()
            },
            save_table: None,
        }
    }
}

impl TicTacToeDemoConfig {
    /// Validate every section
    pub fn validate(&self) -> qlab_core::Result<()> {
        self.agent.validate()?;
        self.trainer.validate()
    }
}

/// Train on tic-tac-toe, returning the report and the agent
pub fn run_tictactoe(config: &TicTacToeDemoConfig) -> Result<(TrainingReport, TabularAgent<Board>)> {
    config.validate().context("invalid tictactoe config")?;
    let mut env = TrackedEnvironment::new(TicTacToeEnv::new(config.env.clone()));
    let mut agent = TabularAgent::new(config.agent.clone(), env.action_space().n)?;
    let mut trainer = Trainer::new(config.trainer.clone())?;
    let report = trainer.run(&mut env, &mut agent)?;

    let wins = report
        .episodes
        .iter()
        .filter(|e| e.total_reward > 0.5)
        .count();
    info!(
        games = report.episodes.len(),
        wins,
        states = agent.table().len(),
        "tictactoe summary"
    );
    if let Some(path) = &config.save_table {
        agent
            .table()
            .save_json(path)
            .with_context(|| format!("failed to save q-table to {}", path.display()))?;
    }
    Ok((report, agent))
}
