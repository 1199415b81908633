//! Environment wrappers

use qlab_core::{DiscreteAction, DiscreteSpace, Environment, Episode, ObservationSpace, Step};

/// Time limit wrapper
///
/// Ends the episode as truncated once `max_steps` steps have been taken
/// without the inner environment finishing it.
pub struct TimeLimit<E> {
    /// Inner environment
    pub env: E,
    /// Maximum steps
    pub max_steps: usize,
    /// Current step count
    pub steps: usize,
}

impl<E> TimeLimit<E> {
    /// Create a new time limit wrapper
    pub fn new(env: E, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            steps: 0,
        }
    }
}

impl<E> Environment for TimeLimit<E>
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

    fn reset(&mut self) -> qlab_core::Result<Self::Observation> {
        self.steps = 0;
        self.env.reset()
    }

    fn step(&mut self, action: DiscreteAction) -> qlab_core::Result<Step<Self::Observation>> {
        self.steps += 1;
        let mut step = self.env.step(action)?;

        if self.steps >= self.max_steps && !step.done {
            step.truncated = true;
            step.done = true;
        }

        Ok(step)
    }

    fn close(&mut self) -> qlab_core::Result<()> {
        self.env.close()
    }

    fn episode_info(&self) -> Option<Episode> {
        self.env.episode_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CorridorConfig, CorridorEnv};

    #[test]
    fn test_time_limit_truncates() {
        let env = CorridorEnv::new(CorridorConfig { n_states: 10 }).unwrap();
        let mut env = TimeLimit::new(env, 3);
        env.reset().unwrap();

        assert!(!env.step(DiscreteAction(0)).unwrap().done);
        assert!(!env.step(DiscreteAction(0)).unwrap().done);
        let last = env.step(DiscreteAction(0)).unwrap();
        assert!(last.done && last.truncated);

        env.reset().unwrap();
        assert_eq!(env.steps, 0);
    }

    #[test]
    fn test_natural_end_is_not_truncated() {
        let env = CorridorEnv::new(CorridorConfig { n_states: 2 }).unwrap();
        let mut env = TimeLimit::new(env, 1);
        env.reset().unwrap();
        let step = env.step(DiscreteAction(1)).unwrap();
        assert!(step.done && !step.truncated);
    }
}
