//! Fixed-capacity experience replay memory
//!
//! Transitions are flattened into rows of one `ndarray` matrix laid out as
//! `[state, action, reward, done, next_state]`. Insertion `k` lands in slot
//! `k % capacity`, overwriting the oldest row once the memory is full.

use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::{Rng, RngCore};
use tracing::trace;

use qlab_core::{DiscreteAction, RLError, Result};

/// Replay memory over fixed-width feature vectors
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    memory: Array2<f32>,
    n_features: usize,
    insertions: usize,
}

/// One transition read back from the memory
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransition {
    /// State features
    pub state: Vec<f32>,
    /// Action taken
    pub action: DiscreteAction,
    /// Reward received
    pub reward: f32,
    /// Whether the next state was terminal
    pub done: bool,
    /// Next state features
    pub next_state: Vec<f32>,
}

/// Batch of sampled transitions, one row per sample
#[derive(Debug, Clone)]
pub struct TransitionBatch {
    /// States, `batch x n_features`
    pub states: Array2<f32>,
    /// Actions taken
    pub actions: Vec<usize>,
    /// Rewards
    pub rewards: Array1<f32>,
    /// 1.0 where the next state was terminal
    pub dones: Array1<f32>,
    /// Next states, `batch x n_features`
    pub next_states: Array2<f32>,
}

impl TransitionBatch {
    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the batch holds no sample
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl ReplayBuffer {
    /// Create an empty memory holding at most `capacity` transitions
    pub fn new(capacity: usize, n_features: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RLError::Config("replay capacity must be positive".to_string()));
        }
        if n_features == 0 {
            return Err(RLError::Config("feature width must be positive".to_string()));
        }
        Ok(Self {
            memory: Array2::zeros((capacity, 2 * n_features + 3)),
            n_features,
            insertions: 0,
        })
    }

    /// Maximum number of transitions held
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.memory.nrows()
    }

    /// Width of a state vector
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of valid transitions, saturating at capacity
    #[must_use]
    pub fn len(&self) -> usize {
        self.insertions.min(self.capacity())
    }

    /// Whether nothing has been stored yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insertions == 0
    }

    /// Total number of `store` calls since creation
    #[must_use]
    pub fn insertions(&self) -> usize {
        self.insertions
    }

    /// Store one transition
    pub fn store(
        &mut self,
        state: &[f32],
        action: DiscreteAction,
        reward: f32,
        next_state: &[f32],
        done: bool,
    ) -> Result<()> {
        for width in [state.len(), next_state.len()] {
            if width != self.n_features {
                return Err(RLError::DimensionMismatch {
                    expected: self.n_features,
                    actual: width,
                });
            }
        }

        let n = self.n_features;
        let slot = self.insertions % self.capacity();
        let mut row = self.memory.row_mut(slot);
        row.slice_mut(s![..n]).assign(&ArrayView1::from(state));
        row[n] = action.0 as f32;
        row[n + 1] = reward;
        row[n + 2] = if done { 1.0 } else { 0.0 };
        row.slice_mut(s![n + 3..]).assign(&ArrayView1::from(next_state));

        self.insertions += 1;
        trace!(slot, insertions = self.insertions, "stored transition");
        Ok(())
    }

    /// Transition in slot `index`, if that slot holds one
    #[must_use]
    pub fn get(&self, index: usize) -> Option<StoredTransition> {
        if index >= self.len() {
            return None;
        }
        let n = self.n_features;
        let row = self.memory.row(index);
        Some(StoredTransition {
            state: row.slice(s![..n]).to_vec(),
            action: DiscreteAction(row[n] as usize),
            reward: row[n + 1],
            done: row[n + 2] > 0.5,
            next_state: row.slice(s![n + 3..]).to_vec(),
        })
    }

    /// Draw `batch_size` transitions uniformly, with replacement
    pub fn sample(&self, batch_size: usize, rng: &mut dyn RngCore) -> Result<TransitionBatch> {
        let available = self.len();
        if available == 0 {
            return Err(RLError::InsufficientSamples {
                requested: batch_size,
                available,
            });
        }

        let indices: Vec<usize> = (0..batch_size).map(|_| rng.gen_range(0..available)).collect();
        let rows = self.memory.select(Axis(0), &indices);
        let n = self.n_features;

        Ok(TransitionBatch {
            states: rows.slice(s![.., ..n]).to_owned(),
            actions: rows.column(n).iter().map(|&a| a as usize).collect(),
            rewards: rows.column(n + 1).to_owned(),
            dones: rows.column(n + 2).to_owned(),
            next_states: rows.slice(s![.., n + 3..]).to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store_indexed(buffer: &mut ReplayBuffer, k: usize) {
        let x = k as f32;
        buffer
            .store(&[x, -x], DiscreteAction(k % 2), x * 0.5, &[x + 1.0, -x - 1.0], k % 3 == 0)
            .unwrap();
    }

    #[test]
    fn test_store_and_read_back() {
        let mut buffer = ReplayBuffer::new(4, 2).unwrap();
        assert!(buffer.is_empty());
        store_indexed(&mut buffer, 3);

        let t = buffer.get(0).unwrap();
        assert_eq!(t.state, vec![3.0, -3.0]);
        assert_eq!(t.action, DiscreteAction(1));
        assert_eq!(t.reward, 1.5);
        assert!(t.done);
        assert_eq!(t.next_state, vec![4.0, -4.0]);
        assert!(buffer.get(1).is_none());
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut buffer = ReplayBuffer::new(3, 2).unwrap();
        for k in 0..5 {
            store_indexed(&mut buffer, k);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.insertions(), 5);
        // Slots 0 and 1 were rewritten by insertions 3 and 4.
        assert_eq!(buffer.get(0).unwrap().state[0], 3.0);
        assert_eq!(buffer.get(1).unwrap().state[0], 4.0);
        assert_eq!(buffer.get(2).unwrap().state[0], 2.0);
    }

    #[test]
    fn test_dimension_check() {
        let mut buffer = ReplayBuffer::new(3, 2).unwrap();
        let err = buffer
            .store(&[1.0], DiscreteAction(0), 0.0, &[1.0, 2.0], false)
            .unwrap_err();
        assert!(matches!(err, RLError::DimensionMismatch { expected: 2, actual: 1 }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sample_empty_fails() {
        let buffer = ReplayBuffer::new(3, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            buffer.sample(2, &mut rng),
            Err(RLError::InsufficientSamples { requested: 2, available: 0 })
        ));
    }

    #[test]
    fn test_sample_only_valid_rows() {
        let mut buffer = ReplayBuffer::new(10, 2).unwrap();
        store_indexed(&mut buffer, 1);
        store_indexed(&mut buffer, 2);
        let mut rng = StdRng::seed_from_u64(42);

        // More samples than rows is fine since sampling is with replacement.
        let batch = buffer.sample(50, &mut rng).unwrap();
        assert_eq!(batch.len(), 50);
        assert_eq!(batch.states.dim(), (50, 2));
        assert_eq!(batch.next_states.dim(), (50, 2));
        for i in 0..batch.len() {
            let x = batch.states[[i, 0]];
            assert!(x == 1.0 || x == 2.0);
            assert_eq!(batch.actions[i], x as usize % 2);
            assert_eq!(batch.rewards[i], x * 0.5);
            assert_eq!(batch.next_states[[i, 0]], x + 1.0);
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(ReplayBuffer::new(0, 2), Err(RLError::Config(_))));
    }

    proptest! {
        #[test]
        fn prop_ring_invariant(capacity in 1usize..20, inserts in 0usize..60) {
            let mut buffer = ReplayBuffer::new(capacity, 2).unwrap();
            for k in 0..inserts {
                store_indexed(&mut buffer, k);
            }
            prop_assert_eq!(buffer.len(), inserts.min(capacity));
            for slot in 0..buffer.len() {
                // The newest insertion that maps to this slot.
                let last = (0..inserts).rev().find(|k| k % capacity == slot).unwrap();
                prop_assert_eq!(buffer.get(slot).unwrap().state[0], last as f32);
            }
        }
    }
}
