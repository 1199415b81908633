//! Environment traits and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DiscreteAction, DiscreteSpace, Observation, ObservationSpace, Reward};

/// Result of a single environment step
#[derive(Debug, Clone)]
pub struct Step<O> {
    /// Observation from the environment
    pub observation: O,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode is done
    pub done: bool,
    /// Whether the episode was truncated (e.g., time limit)
    pub truncated: bool,
    /// Additional info from the environment
    pub info: StepInfo,
}

impl<O> Step<O> {
    /// Step without extra info
    pub fn new(observation: O, reward: impl Into<Reward>, done: bool) -> Self {
        Self {
            observation,
            reward: reward.into(),
            done,
            truncated: false,
            info: StepInfo::default(),
        }
    }
}

/// Additional information from a step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    /// Custom fields
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StepInfo {
    /// Add a field
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Episode information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Zero-based episode number
    pub index: usize,
    /// Total reward
    pub total_reward: f64,
    /// Number of steps
    pub steps: usize,
    /// Whether episode was truncated
    pub truncated: bool,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: Option<DateTime<Utc>>,
}

impl Episode {
    /// Whether the episode has reached a terminal step
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Core environment trait
///
/// Actions are indices into a discrete action space. Both the reset and
/// the step call may fail, and drivers propagate those failures as-is.
pub trait Environment {
    /// Observation type
    type Observation: Observation + 'static;

    /// Get the observation space
    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>>;

    /// Get the action space
    fn action_space(&self) -> DiscreteSpace;

    /// Actions allowed in the current state
    fn legal_actions(&self) -> Vec<DiscreteAction> {
        self.action_space().actions().collect()
    }

    /// Reset the environment
    fn reset(&mut self) -> crate::Result<Self::Observation>;

    /// Take a step in the environment
    fn step(&mut self, action: DiscreteAction) -> crate::Result<Step<Self::Observation>>;

    /// Close the environment
    fn close(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// Get current episode info
    fn episode_info(&self) -> Option<Episode> {
        None
    }
}

/// Wrapper for environments that tracks episodes
pub struct TrackedEnvironment<E> {
    /// Inner environment
    pub env: E,
    /// Current episode
    pub episode: Option<Episode>,
    /// Number of resets seen
    pub episodes_started: usize,
}

impl<E> TrackedEnvironment<E> {
    /// Create a new tracked environment
    pub fn new(env: E) -> Self {
        Self {
            env,
            episode: None,
            episodes_started: 0,
        }
    }
}

impl<E> Environment for TrackedEnvironment<E>
where
    E: Environment,
{
    type Observation = E::Observation;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        self.env.observation_space()
    }

    fn action_space(&self) -> DiscreteSpace {
        self.env.action_space()
    }

    fn legal_actions(&self) -> Vec<DiscreteAction> {
        self.env.legal_actions()
    }

    fn reset(&mut self) -> crate::Result<Self::Observation> {
        if let Some(ref mut episode) = self.episode {
            if episode.end_time.is_none() {
                episode.end_time = Some(Utc::now());
            }
        }

        self.episode = Some(Episode {
            index: self.episodes_started,
            total_reward: 0.0,
            steps: 0,
            truncated: false,
            start_time: Utc::now(),
            end_time: None,
        });
        self.episodes_started += 1;

        self.env.reset()
    }

    fn step(&mut self, action: DiscreteAction) -> crate::Result<Step<Self::Observation>> {
        let step = self.env.step(action)?;

        if let Some(ref mut episode) = self.episode {
            episode.total_reward += step.reward.0;
            episode.steps += 1;

            if step.done || step.truncated {
                episode.truncated = step.truncated;
                episode.end_time = Some(Utc::now());
                debug!(
                    index = episode.index,
                    steps = episode.steps,
                    reward = episode.total_reward,
                    truncated = episode.truncated,
                    "episode ended"
                );
            }
        }

        Ok(step)
    }

    fn close(&mut self) -> crate::Result<()> {
        self.env.close()
    }

    fn episode_info(&self) -> Option<Episode> {
        self.episode.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiscreteObservation, DiscreteObservationSpace};

    /// Counts to three, paying one per step.
    struct Counter {
        at: usize,
    }

    impl Environment for Counter {
        type Observation = DiscreteObservation;

        fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
            Box::new(DiscreteObservationSpace::new(4))
        }

        fn action_space(&self) -> DiscreteSpace {
            DiscreteSpace::new(1)
        }

        fn reset(&mut self) -> crate::Result<Self::Observation> {
            self.at = 0;
            Ok(DiscreteObservation(0))
        }

        fn step(&mut self, _action: DiscreteAction) -> crate::Result<Step<Self::Observation>> {
            self.at += 1;
            Ok(Step::new(DiscreteObservation(self.at), 1.0, self.at == 3))
        }
    }

    #[test]
    fn test_tracked_environment_counts_episode() {
        let mut env = TrackedEnvironment::new(Counter { at: 0 });
        assert!(env.episode_info().is_none());

        env.reset().unwrap();
        loop {
            if env.step(DiscreteAction(0)).unwrap().done {
                break;
            }
        }

        let episode = env.episode_info().unwrap();
        assert_eq!(episode.index, 0);
        assert_eq!(episode.steps, 3);
        assert!((episode.total_reward - 3.0).abs() < 1e-12);
        assert!(episode.is_finished());

        env.reset().unwrap();
        let episode = env.episode_info().unwrap();
        assert_eq!(episode.index, 1);
        assert_eq!(episode.steps, 0);
        assert!(!episode.is_finished());
    }

    #[test]
    fn test_default_legal_actions_cover_space() {
        let env = Counter { at: 0 };
        assert_eq!(env.legal_actions(), vec![DiscreteAction(0)]);
    }
}
