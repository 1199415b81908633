//! Classic control environments

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use qlab_core::{
    BoxObservationSpace, DiscreteAction, DiscreteSpace, Environment, ObservationSpace, RLError,
    Result, Step, VectorObservation,
};

/// CartPole physics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    /// Gravitational acceleration
    pub gravity: f64,
    /// Cart mass
    pub mass_cart: f64,
    /// Pole mass
    pub mass_pole: f64,
    /// Half the pole length
    pub length: f64,
    /// Force applied by either action
    pub force_mag: f64,
    /// Integration time step in seconds
    pub tau: f64,
    /// Cart position beyond which the episode fails
    pub x_threshold: f64,
    /// Pole angle in radians beyond which the episode fails
    pub theta_threshold: f64,
    /// Seed for the initial-state generator
    pub seed: Option<u64>,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            mass_cart: 1.0,
            mass_pole: 0.1,
            length: 0.5,
            force_mag: 10.0,
            tau: 0.02,
            x_threshold: 2.4,
            theta_threshold: 12.0 * 2.0 * std::f64::consts::PI / 360.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CartPoleState {
    x: f64,         // Cart position
    x_dot: f64,     // Cart velocity
    theta: f64,     // Pole angle
    theta_dot: f64, // Pole angular velocity
}

/// CartPole environment
///
/// A pole hinged on a cart moving along a frictionless track. Action 0
/// pushes the cart left, action 1 pushes it right. Every step pays one,
/// the episode ends once the pole falls past the angle threshold or the
/// cart leaves the track. There is no built-in step limit; wrap the
/// environment in [`crate::TimeLimit`] for one.
pub struct CartPoleEnv {
    state: CartPoleState,
    config: CartPoleConfig,
    rng: StdRng,
    done: bool,
}

impl CartPoleEnv {
    /// Create a new CartPole environment
    #[must_use]
    pub fn new(config: CartPoleConfig) -> Self {
        Self {
            state: CartPoleState::default(),
            rng: crate::make_rng(config.seed),
            config,
            done: true,
        }
    }

    fn get_observation(&self) -> VectorObservation {
        VectorObservation::new(vec![
            self.state.x,
            self.state.x_dot,
            self.state.theta,
            self.state.theta_dot,
        ])
    }

    fn is_failed(&self) -> bool {
        self.state.x.abs() > self.config.x_threshold
            || self.state.theta.abs() > self.config.theta_threshold
    }
}

impl Default for CartPoleEnv {
    fn default() -> Self {
        Self::new(CartPoleConfig::default())
    }
}

impl Environment for CartPoleEnv {
    type Observation = VectorObservation;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        let high = vec![
            self.config.x_threshold * 2.0,
            f64::INFINITY,
            self.config.theta_threshold * 2.0,
            f64::INFINITY,
        ];
        let low = high.iter().map(|&x| -x).collect();

        Box::new(BoxObservationSpace {
            low,
            high,
            shape: vec![4],
        })
    }

    fn action_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(2) // 0: push left, 1: push right
    }

    fn reset(&mut self) -> Result<Self::Observation> {
        self.state = CartPoleState {
            x: self.rng.gen_range(-0.05..0.05),
            x_dot: self.rng.gen_range(-0.05..0.05),
            theta: self.rng.gen_range(-0.05..0.05),
            theta_dot: self.rng.gen_range(-0.05..0.05),
        };
        self.done = false;

        Ok(self.get_observation())
    }

    fn step(&mut self, action: DiscreteAction) -> Result<Step<Self::Observation>> {
        if self.done {
            return Err(RLError::Environment(
                "CartPole stepped after episode end, call reset".to_string(),
            ));
        }
        let force = match action.0 {
            0 => -self.config.force_mag,
            1 => self.config.force_mag,
            other => {
                return Err(RLError::InvalidAction(format!(
                    "CartPole action {other} out of range"
                )))
            }
        };

        let cos_theta = self.state.theta.cos();
        let sin_theta = self.state.theta.sin();

        let total_mass = self.config.mass_cart + self.config.mass_pole;
        let pole_mass_length = self.config.mass_pole * self.config.length;

        let temp =
            (force + pole_mass_length * self.state.theta_dot.powi(2) * sin_theta) / total_mass;
        let theta_acc = (self.config.gravity * sin_theta - cos_theta * temp)
            / (self.config.length
                * (4.0 / 3.0 - self.config.mass_pole * cos_theta.powi(2) / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        // Explicit Euler
        let dt = self.config.tau;
        self.state.x += dt * self.state.x_dot;
        self.state.x_dot += dt * x_acc;
        self.state.theta += dt * self.state.theta_dot;
        self.state.theta_dot += dt * theta_acc;

        self.done = self.is_failed();
        if self.done {
            debug!(x = self.state.x, theta = self.state.theta, "pole down");
        }

        Ok(Step::new(self.get_observation(), 1.0, self.done))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use qlab_core::Observation;

    fn seeded() -> CartPoleEnv {
        CartPoleEnv::new(CartPoleConfig {
            seed: Some(1),
            ..CartPoleConfig::default()
        })
    }

    #[test]
    fn test_reset_is_near_upright() {
        let mut env = seeded();
        let obs = env.reset().unwrap();
        assert_eq!(obs.shape(), vec![4]);
        assert!(obs.data.iter().all(|v| v.abs() <= 0.05));
        assert!(env.observation_space().contains(&obs));
    }

    #[test]
    fn test_seed_reproduces_start() {
        let a = seeded().reset().unwrap();
        let b = seeded().reset().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_push_ends_episode() {
        let mut env = seeded();
        env.reset().unwrap();

        let mut steps = 0;
        loop {
            let step = env.step(DiscreteAction(1)).unwrap();
            assert_relative_eq!(step.reward.0, 1.0);
            steps += 1;
            if step.done {
                break;
            }
            assert!(steps < 200, "pole never fell");
        }
        assert!(matches!(env.step(DiscreteAction(0)), Err(RLError::Environment(_))));
    }

    #[test]
    fn test_euler_step_uses_previous_velocities() {
        let mut env = seeded();
        let before = env.reset().unwrap().data;
        let after = env.step(DiscreteAction(1)).unwrap().observation.data;
        let tau = CartPoleConfig::default().tau;

        assert_relative_eq!(after[0], before[0] + tau * before[1], epsilon = 1e-12);
        assert_relative_eq!(after[2], before[2] + tau * before[3], epsilon = 1e-12);
        // Pushing right accelerates the cart right and tips the pole left.
        assert!(after[1] > before[1]);
        assert!(after[3] < before[3]);
    }

    #[test]
    fn test_step_before_reset_is_error() {
        let mut env = seeded();
        assert!(env.step(DiscreteAction(0)).is_err());
    }

    #[test]
    fn test_invalid_action() {
        let mut env = seeded();
        env.reset().unwrap();
        assert!(matches!(env.step(DiscreteAction(2)), Err(RLError::InvalidAction(_))));
    }
}
