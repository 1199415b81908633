//! Tabular action-value learning
//!
//! [`QTable`] maps observed states to one row of action values. Rows are
//! created on first sight, all zeros. [`TabularAgent`] drives a table with
//! epsilon-greedy exploration and either the Q-learning or the SARSA update.

use std::collections::HashMap;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use qlab_core::policy::{ActionSelector, EpsilonGreedy};
use qlab_core::value::max_over;
use qlab_core::{
    ActionValueFunction, Agent, AgentMetrics, DiscreteAction, Observation, RLError, Result,
    Transition,
};

/// Which bootstrap the tabular agent uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// Bootstrap from the best action of the next state
    #[default]
    QLearning,
    /// Bootstrap from the action actually chosen in the next state
    Sarsa,
}

/// Tabular agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularConfig {
    /// Learning rate
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
    /// Greedy ratio of the epsilon-greedy selector
    pub epsilon: f64,
    /// Bootstrap rule
    pub rule: UpdateRule,
    /// Seed for exploration
    pub seed: Option<u64>,
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.9,
            rule: UpdateRule::QLearning,
            seed: None,
        }
    }
}

impl TabularConfig {
    /// Check that every rate lies in its valid range
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(RLError::Config(format!("alpha must be in (0, 1], got {}", self.alpha)));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(RLError::Config(format!("gamma must be in [0, 1], got {}", self.gamma)));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(RLError::Config(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Lazily filled table of action values
#[derive(Debug, Clone)]
pub struct QTable<K> {
    rows: HashMap<K, Vec<f64>>,
    n_actions: usize,
}

#[derive(Serialize, Deserialize)]
struct QTableSnapshot<K> {
    n_actions: usize,
    rows: Vec<(K, Vec<f64>)>,
}

impl<K: Hash + Eq + Clone> QTable<K> {
    /// Create an empty table over `n_actions` actions
    #[must_use]
    pub fn new(n_actions: usize) -> Self {
        Self {
            rows: HashMap::new(),
            n_actions,
        }
    }

    /// Number of actions per row
    #[must_use]
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Number of states with a row
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no state has been seen yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `state` already has a row
    #[must_use]
    pub fn contains(&self, state: &K) -> bool {
        self.rows.contains_key(state)
    }

    /// Row of `state`, if seen
    #[must_use]
    pub fn row(&self, state: &K) -> Option<&[f64]> {
        self.rows.get(state).map(Vec::as_slice)
    }

    /// Row of `state`, zeros if unseen
    #[must_use]
    pub fn values(&self, state: &K) -> Vec<f64> {
        self.rows
            .get(state)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.n_actions])
    }

    /// Mutable row of `state`, inserted as zeros if unseen
    pub fn row_mut(&mut self, state: &K) -> &mut [f64] {
        let n = self.n_actions;
        self.rows
            .entry(state.clone())
            .or_insert_with(|| vec![0.0; n])
    }

    /// Single value, zero if unseen
    pub fn get(&self, state: &K, action: DiscreteAction) -> Result<f64> {
        self.check_action(action)?;
        Ok(self.row(state).map_or(0.0, |row| row[action.0]))
    }

    /// Overwrite a single value
    pub fn set(&mut self, state: &K, action: DiscreteAction, value: f64) -> Result<()> {
        self.check_action(action)?;
        self.row_mut(state)[action.0] = value;
        Ok(())
    }

    /// Move `Q(state, action)` a fraction `alpha` toward `target`
    ///
    /// Returns the updated value.
    pub fn update_toward(
        &mut self,
        state: &K,
        action: DiscreteAction,
        target: f64,
        alpha: f64,
    ) -> Result<f64> {
        self.check_action(action)?;
        let q = &mut self.row_mut(state)[action.0];
        *q += alpha * (target - *q);
        Ok(*q)
    }

    /// One Q-learning update
    ///
    /// The target is `reward` on terminal transitions and
    /// `reward + gamma * max Q(next_state, a')` over `next_legal` otherwise.
    /// The next state gets a row if it had none.
    #[allow(clippy::too_many_arguments)]
    pub fn q_learning_update(
        &mut self,
        state: &K,
        action: DiscreteAction,
        reward: f64,
        next_state: &K,
        next_legal: &[DiscreteAction],
        terminal: bool,
        alpha: f64,
        gamma: f64,
    ) -> Result<f64> {
        let target = if terminal {
            reward
        } else {
            let next = self.row_mut(next_state).to_vec();
            reward + gamma * max_over(&next, next_legal).unwrap_or(0.0)
        };
        self.update_toward(state, action, target, alpha)
    }

    /// One SARSA update bootstrapping from `Q(next_state, next_action)`
    #[allow(clippy::too_many_arguments)]
    pub fn sarsa_update(
        &mut self,
        state: &K,
        action: DiscreteAction,
        reward: f64,
        next_state: &K,
        next_action: DiscreteAction,
        terminal: bool,
        alpha: f64,
        gamma: f64,
    ) -> Result<f64> {
        let target = if terminal {
            reward
        } else {
            reward + gamma * self.get(next_state, next_action)?
        };
        self.update_toward(state, action, target, alpha)
    }

    /// Iterate over all `(state, row)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[f64])> {
        self.rows.iter().map(|(k, v)| (k, v.as_slice()))
    }

    fn check_action(&self, action: DiscreteAction) -> Result<()> {
        if action.0 < self.n_actions {
            Ok(())
        } else {
            Err(RLError::InvalidAction(format!(
                "action {} outside table of {} actions",
                action.0, self.n_actions
            )))
        }
    }
}

impl<K> QTable<K>
where
    K: Hash + Eq + Clone + Serialize + DeserializeOwned,
{
    /// Write the table as JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = QTableSnapshot {
            n_actions: self.n_actions,
            rows: self.rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        debug!(path = %path.as_ref().display(), states = self.rows.len(), "saved q-table");
        Ok(())
    }

    /// Read a table written by [`QTable::save_json`]
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let snapshot: QTableSnapshot<K> = serde_json::from_reader(reader)?;
        let mut rows = HashMap::with_capacity(snapshot.rows.len());
        for (state, row) in snapshot.rows {
            if row.len() != snapshot.n_actions {
                return Err(RLError::DimensionMismatch {
                    expected: snapshot.n_actions,
                    actual: row.len(),
                });
            }
            rows.insert(state, row);
        }
        Ok(Self {
            rows,
            n_actions: snapshot.n_actions,
        })
    }
}

/// Epsilon-greedy agent over a [`QTable`]
#[derive(Debug)]
pub struct TabularAgent<K> {
    table: QTable<K>,
    config: TabularConfig,
    selector: EpsilonGreedy,
    rng: StdRng,
    pending: Option<(Transition<K>, Vec<DiscreteAction>)>,
    metrics: AgentMetrics,
}

impl<K: Hash + Eq + Clone> TabularAgent<K> {
    /// Create an agent with an empty table
    pub fn new(config: TabularConfig, n_actions: usize) -> Result<Self> {
        Self::with_table(config, QTable::new(n_actions))
    }

    /// Create an agent that continues from an existing table
    pub fn with_table(config: TabularConfig, table: QTable<K>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table,
            selector: EpsilonGreedy::new(config.epsilon),
            rng: crate::make_rng(config.seed),
            config,
            pending: None,
            metrics: AgentMetrics::default(),
        })
    }

    /// The learned table
    #[must_use]
    pub fn table(&self) -> &QTable<K> {
        &self.table
    }

    /// Agent configuration
    #[must_use]
    pub fn config(&self) -> &TabularConfig {
        &self.config
    }

    fn record(&mut self, value: f64) {
        self.metrics.total_updates += 1;
        trace!(value, updates = self.metrics.total_updates, "q update");
    }

    /// Finish a deferred SARSA update now that the next action is known
    fn complete_pending(&mut self, next_action: DiscreteAction) -> Result<()> {
        if let Some((t, _)) = self.pending.take() {
            let value = self.table.sarsa_update(
                &t.observation,
                t.action,
                t.reward.value(),
                &t.next_observation,
                next_action,
                false,
                self.config.alpha,
                self.config.gamma,
            )?;
            self.record(value);
        }
        Ok(())
    }
}

impl<K> Agent for TabularAgent<K>
where
    K: Observation + Hash + Eq,
{
    type Observation = K;

    fn act(&mut self, observation: &K, legal: &[DiscreteAction]) -> Result<DiscreteAction> {
        let values = self.table.values(observation);
        let action = self.selector.select(&values, legal, &mut self.rng)?;
        if self.config.rule == UpdateRule::Sarsa {
            self.complete_pending(action)?;
        }
        Ok(action)
    }

    fn observe(&mut self, transition: Transition<K>, next_legal: &[DiscreteAction]) -> Result<()> {
        self.metrics.total_steps += 1;
        match self.config.rule {
            UpdateRule::QLearning => {
                let value = self.table.q_learning_update(
                    &transition.observation,
                    transition.action,
                    transition.reward.value(),
                    &transition.next_observation,
                    next_legal,
                    transition.done,
                    self.config.alpha,
                    self.config.gamma,
                )?;
                self.record(value);
            }
            UpdateRule::Sarsa if transition.done => {
                let value = self.table.update_toward(
                    &transition.observation,
                    transition.action,
                    transition.reward.value(),
                    self.config.alpha,
                )?;
                self.record(value);
            }
            UpdateRule::Sarsa => {
                // Stays open until act() picks the next action.
                self.table.row_mut(&transition.next_observation);
                self.pending = Some((transition, next_legal.to_vec()));
            }
        }
        Ok(())
    }

    /// Episodes cut short leave a SARSA update open; it bootstraps from the
    /// greedy value over the next state's legal actions since no next action
    /// will be taken.
    fn end_episode(&mut self) -> Result<()> {
        if let Some((t, next_legal)) = self.pending.take() {
            let next = self.table.values(&t.next_observation);
            let best = max_over(&next, &next_legal).unwrap_or(0.0);
            let target = t.reward.value() + self.config.gamma * best;
            let value = self
                .table
                .update_toward(&t.observation, t.action, target, self.config.alpha)?;
            self.record(value);
        }
        Ok(())
    }

    fn metrics(&self) -> AgentMetrics {
        self.metrics.clone()
    }
}

impl<K: Hash + Eq + Clone> ActionValueFunction for TabularAgent<K> {
    type Observation = K;

    fn action_values(&self, observation: &K) -> Result<Vec<f64>> {
        Ok(self.table.values(observation))
    }
}
