//! Episode drivers
//!
//! A [`Trainer`] plays episodes of an environment with an agent: select an
//! action, step, hand the transition to the agent, let it learn, repeat
//! until the episode ends.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use qlab_core::{Agent, Environment, RLError, Result, TrackedEnvironment, Transition};

use crate::utils::RunningReward;

/// Trainer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Episodes to play
    pub episodes: usize,
    /// Log a summary every this many episodes
    pub log_every: usize,
    /// Smoothing of the running reward
    pub running_decay: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            log_every: 1,
            running_decay: 0.99,
        }
    }
}

impl TrainerConfig {
    /// Check the configuration
    pub fn validate(&self) -> Result<()> {
        if self.log_every == 0 {
            return Err(RLError::Config("log_every must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.running_decay) {
            return Err(RLError::Config(format!(
                "running_decay must be in [0, 1], got {}",
                self.running_decay
            )));
        }
        Ok(())
    }
}

/// Summary of one finished episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Zero-based episode number
    pub index: usize,
    /// Steps taken
    pub steps: usize,
    /// Sum of rewards
    pub total_reward: f64,
    /// Whether a time limit ended the episode
    pub truncated: bool,
    /// Learning updates run during the episode
    pub updates: usize,
    /// Mean loss of those updates
    pub mean_loss: Option<f64>,
    /// Running reward after this episode
    pub running_reward: f64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: Option<i64>,
}

/// Every episode of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Episodes in play order
    pub episodes: Vec<EpisodeStats>,
}

impl TrainingReport {
    /// Running reward after the last episode
    #[must_use]
    pub fn running_reward(&self) -> Option<f64> {
        self.episodes.last().map(|e| e.running_reward)
    }

    /// Total environment steps
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.episodes.iter().map(|e| e.steps).sum()
    }

    /// Mean episode reward over the last `n` episodes
    #[must_use]
    pub fn mean_reward(&self, n: usize) -> Option<f64> {
        let tail = &self.episodes[self.episodes.len().saturating_sub(n)..];
        if tail.is_empty() {
            None
        } else {
            Some(tail.iter().map(|e| e.total_reward).sum::<f64>() / tail.len() as f64)
        }
    }
}

/// Plays episodes and keeps the running reward across them
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
    running: RunningReward,
}

impl Trainer {
    /// Create a trainer
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            running: RunningReward::new(config.running_decay),
            config,
        })
    }

    /// Running reward so far
    #[must_use]
    pub fn running_reward(&self) -> Option<f64> {
        self.running.value()
    }

    /// Play the configured number of episodes
    pub fn run<E, A>(
        &mut self,
        env: &mut TrackedEnvironment<E>,
        agent: &mut A,
    ) -> Result<TrainingReport>
    where
        E: Environment,
        A: Agent<Observation = E::Observation>,
    {
        let mut report = TrainingReport::default();
        for _ in 0..self.config.episodes {
            report.episodes.push(self.run_episode(env, agent)?);
        }
        info!(
            episodes = report.episodes.len(),
            steps = report.total_steps(),
            running_reward = report.running_reward(),
            "training finished"
        );
        Ok(report)
    }

    /// Play one episode to its end
    ///
    /// Transitions cut by a time limit are handed over as non-terminal so
    /// agents still bootstrap through them.
    pub fn run_episode<E, A>(
        &mut self,
        env: &mut TrackedEnvironment<E>,
        agent: &mut A,
    ) -> Result<EpisodeStats>
    where
        E: Environment,
        A: Agent<Observation = E::Observation>,
    {
        let mut observation = env.reset()?;
        let mut losses = Vec::new();

        loop {
            let legal = env.legal_actions();
            let action = agent.act(&observation, &legal)?;
            let step = env.step(action)?;
            let next_legal = env.legal_actions();
            let terminal = step.done && !step.truncated;

            agent.observe(
                Transition::new(
                    observation,
                    action,
                    step.reward,
                    step.observation.clone(),
                    terminal,
                ),
                &next_legal,
            )?;
            if let Some(loss) = agent.learn()? {
                losses.push(loss);
            }

            if step.done || step.truncated {
                break;
            }
            observation = step.observation;
        }
        agent.end_episode()?;

        let episode = env
            .episode_info()
            .ok_or_else(|| RLError::Environment("episode was not tracked".to_string()))?;
        let running_reward = self.running.update(episode.total_reward);
        let stats = EpisodeStats {
            index: episode.index,
            steps: episode.steps,
            total_reward: episode.total_reward,
            truncated: episode.truncated,
            updates: losses.len(),
            mean_loss: if losses.is_empty() {
                None
            } else {
                Some(losses.iter().sum::<f64>() / losses.len() as f64)
            },
            running_reward,
            duration_ms: episode
                .end_time
                .map(|end| (end - episode.start_time).num_milliseconds()),
        };

        if stats.index % self.config.log_every == 0 {
            info!(
                episode = stats.index,
                steps = stats.steps,
                reward = stats.total_reward,
                running_reward,
                "episode finished"
            );
        } else {
            debug!(episode = stats.index, steps = stats.steps, "episode finished");
        }
        Ok(stats)
    }
}
