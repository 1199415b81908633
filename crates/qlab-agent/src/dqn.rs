//! Deep Q-Network (DQN) agent implementation
//!
//! An online network picks actions and learns from minibatches drawn from a
//! replay memory. Targets come from a second network whose parameters are
//! copied from the online one every `target_update_freq` learning steps.

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use qlab_core::policy::{ActionSelector, SoftmaxExploration};
use qlab_core::{
    ActionValueFunction, Agent, AgentMetrics, DiscreteAction, Learning, Observation, RLError,
    Result, Transition, VectorObservation,
};

use crate::buffer::ReplayBuffer;
use crate::network::{Activation, FunctionApproximator, QNetwork, QNetworkConfig};

/// DQN-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    /// RMSProp learning rate
    pub learning_rate: f32,
    /// Probability of sampling from the softmax of the action values
    pub epsilon: f64,
    /// Discount factor
    pub gamma: f32,
    /// Minibatch size
    pub batch_size: usize,
    /// Replay memory capacity
    pub memory_size: usize,
    /// Hidden layer sizes
    pub hidden_dims: Vec<usize>,
    /// Hidden activation
    pub activation: Activation,
    /// Standard deviation of initial weights
    pub weight_std: f32,
    /// Initial bias
    pub bias_init: f32,
    /// Learning steps between target syncs, `memory_size / 2` if unset
    pub target_update_freq: Option<usize>,
    /// Drop the bootstrap term for terminal next states
    pub mask_terminal_targets: bool,
    /// Seed for initialization, sampling and exploration
    pub seed: Option<u64>,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.2,
            epsilon: 0.9,
            gamma: 0.9,
            batch_size: 50,
            memory_size: 500,
            hidden_dims: vec![10],
            activation: Activation::Relu,
            weight_std: 0.3,
            bias_init: 0.1,
            target_update_freq: None,
            mask_terminal_targets: false,
            seed: None,
        }
    }
}

impl DqnConfig {
    /// Check sizes and rates
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(RLError::Config("batch_size must be positive".to_string()));
        }
        if self.memory_size == 0 {
            return Err(RLError::Config("memory_size must be positive".to_string()));
        }
        if self.target_update_freq == Some(0) {
            return Err(RLError::Config("target_update_freq must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(RLError::Config(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(RLError::Config(format!("gamma must be in [0, 1], got {}", self.gamma)));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RLError::Config(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !(self.weight_std.is_finite() && self.weight_std > 0.0) {
            return Err(RLError::Config(format!(
                "weight_std must be positive and finite, got {}",
                self.weight_std
            )));
        }
        if !self.bias_init.is_finite() {
            return Err(RLError::Config(format!("bias_init must be finite, got {}", self.bias_init)));
        }
        Ok(())
    }

    /// Learning steps between target syncs
    #[must_use]
    pub fn sync_interval(&self) -> usize {
        self.target_update_freq
            .unwrap_or(self.memory_size / 2)
            .max(1)
    }

    /// Network configuration for the given problem size
    #[must_use]
    pub fn network_config(&self, n_features: usize, n_actions: usize) -> QNetworkConfig {
        QNetworkConfig {
            input_dim: n_features,
            hidden_dims: self.hidden_dims.clone(),
            output_dim: n_actions,
            activation: self.activation,
            weight_std: self.weight_std,
            bias_init: self.bias_init,
            learning_rate: self.learning_rate,
        }
    }
}

/// DQN agent with replay memory and a target network
#[derive(Debug)]
pub struct DqnAgent<N = QNetwork> {
    config: DqnConfig,
    online: N,
    target: N,
    memory: ReplayBuffer,
    selector: SoftmaxExploration,
    rng: StdRng,
    learn_steps: usize,
    loss_history: Vec<f32>,
    metrics: AgentMetrics,
}

impl DqnAgent<QNetwork> {
    /// Create an agent with freshly initialized networks
    ///
    /// Online and target networks are initialized independently; they first
    /// agree after the first sync.
    pub fn new(config: DqnConfig, n_features: usize, n_actions: usize) -> Result<Self> {
        config.validate()?;
        let mut rng = crate::make_rng(config.seed);
        let net_config = config.network_config(n_features, n_actions);
        let online = QNetwork::new(net_config.clone(), &mut rng)?;
        let target = QNetwork::new(net_config, &mut rng)?;
        Self::assemble(config, online, target, rng)
    }
}

impl<N: FunctionApproximator> DqnAgent<N> {
    /// Create an agent around existing networks
    pub fn with_networks(config: DqnConfig, online: N, target: N) -> Result<Self> {
        config.validate()?;
        let rng = crate::make_rng(config.seed);
        Self::assemble(config, online, target, rng)
    }

    fn assemble(config: DqnConfig, online: N, target: N, rng: StdRng) -> Result<Self> {
        if online.input_dim() != target.input_dim() {
            return Err(RLError::DimensionMismatch {
                expected: online.input_dim(),
                actual: target.input_dim(),
            });
        }
        if online.output_dim() != target.output_dim() {
            return Err(RLError::DimensionMismatch {
                expected: online.output_dim(),
                actual: target.output_dim(),
            });
        }
        let memory = ReplayBuffer::new(config.memory_size, online.input_dim())?;
        Ok(Self {
            selector: SoftmaxExploration::new(config.epsilon),
            config,
            online,
            target,
            memory,
            rng,
            learn_steps: 0,
            loss_history: Vec::new(),
            metrics: AgentMetrics::default(),
        })
    }

    /// Agent configuration
    #[must_use]
    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    /// Network used for acting and learning
    #[must_use]
    pub fn online(&self) -> &N {
        &self.online
    }

    /// Mutable access to the online network
    pub fn online_mut(&mut self) -> &mut N {
        &mut self.online
    }

    /// Network used for bootstrap targets
    #[must_use]
    pub fn target(&self) -> &N {
        &self.target
    }

    /// Replay memory
    #[must_use]
    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    /// Learning steps performed so far
    #[must_use]
    pub fn learn_steps(&self) -> usize {
        self.learn_steps
    }

    /// Loss of every learning step, oldest first
    #[must_use]
    pub fn loss_history(&self) -> &[f32] {
        &self.loss_history
    }

    /// Online action values for one feature vector
    pub fn q_values(&self, features: &[f64]) -> Result<Vec<f64>> {
        let input = to_row(features)?;
        let output = self.online.predict(input.view())?;
        Ok(output.row(0).iter().map(|&v| f64::from(v)).collect())
    }

    /// Pick an action for one feature vector
    pub fn choose_action(
        &mut self,
        features: &[f64],
        legal: &[DiscreteAction],
    ) -> Result<DiscreteAction> {
        let values = self.q_values(features)?;
        self.selector.select(&values, legal, &mut self.rng)
    }

    /// Append one transition to the replay memory
    pub fn store_transition(
        &mut self,
        state: &[f64],
        action: DiscreteAction,
        reward: f64,
        next_state: &[f64],
        done: bool,
    ) -> Result<()> {
        if action.0 >= self.online.output_dim() {
            return Err(RLError::InvalidAction(format!(
                "action {} outside {} outputs",
                action.0,
                self.online.output_dim()
            )));
        }
        self.memory.store(
            &to_f32(state),
            action,
            reward as f32,
            &to_f32(next_state),
            done,
        )
    }

    /// One minibatch update of the online network
    ///
    /// Each sampled row gets the online prediction as its target except in
    /// the column of the stored action, which is replaced by
    /// `reward + gamma * max_a' Q_target(next_state, a')`.
    pub fn learn_batch(&mut self) -> Result<f32> {
        let batch = self.memory.sample(self.config.batch_size, &mut self.rng)?;
        let predicted = self.online.predict(batch.states.view())?;
        let next_values = self.target.predict(batch.next_states.view())?;
        let max_next = next_values.map_axis(Axis(1), |row| {
            row.iter().copied().fold(f32::NEG_INFINITY, f32::max)
        });

        let mut targets = predicted;
        for (i, &action) in batch.actions.iter().enumerate() {
            let bootstrap = if self.config.mask_terminal_targets && batch.dones[i] > 0.5 {
                0.0
            } else {
                self.config.gamma * max_next[i]
            };
            targets[[i, action]] = batch.rewards[i] + bootstrap;
        }

        let loss = self.online.train_step(batch.states.view(), targets.view())?;
        self.loss_history.push(loss);
        self.learn_steps += 1;
        self.metrics.total_updates = self.learn_steps;
        self.metrics.loss = Some(f64::from(loss));
        debug!(step = self.learn_steps, loss, "dqn learning step");

        if self.learn_steps % self.config.sync_interval() == 0 {
            self.target.sync_from(&self.online)?;
            info!(step = self.learn_steps, "target network synced");
        }
        Ok(loss)
    }

    /// Copy online parameters into the target network now
    pub fn sync_target(&mut self) -> Result<()> {
        self.target.sync_from(&self.online)
    }
}

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

fn to_row(values: &[f64]) -> Result<Array2<f32>> {
    Array2::from_shape_vec((1, values.len()), to_f32(values))
        .map_err(|e| RLError::Computation(e.to_string()))
}

impl<N: FunctionApproximator> Agent for DqnAgent<N> {
    type Observation = VectorObservation;

    fn act(
        &mut self,
        observation: &VectorObservation,
        legal: &[DiscreteAction],
    ) -> Result<DiscreteAction> {
        self.choose_action(&observation.to_vec(), legal)
    }

    fn observe(
        &mut self,
        transition: Transition<VectorObservation>,
        _next_legal: &[DiscreteAction],
    ) -> Result<()> {
        self.metrics.total_steps += 1;
        self.store_transition(
            &transition.observation.data,
            transition.action,
            transition.reward.value(),
            &transition.next_observation.data,
            transition.done,
        )
    }

    fn learn(&mut self) -> Result<Option<f64>> {
        if self.ready() {
            self.train_step().map(Some)
        } else {
            trace!(
                stored = self.memory.len(),
                batch_size = self.config.batch_size,
                "replay memory below batch size, skipping learning"
            );
            Ok(None)
        }
    }

    fn metrics(&self) -> AgentMetrics {
        self.metrics.clone()
    }
}

impl<N: FunctionApproximator> Learning for DqnAgent<N> {
    fn ready(&self) -> bool {
        self.memory.len() >= self.config.batch_size
    }

    fn train_step(&mut self) -> Result<f64> {
        self.learn_batch().map(f64::from)
    }
}

impl<N: FunctionApproximator> ActionValueFunction for DqnAgent<N> {
    type Observation = VectorObservation;

    fn action_values(&self, observation: &VectorObservation) -> Result<Vec<f64>> {
        self.q_values(&observation.data)
    }
}
