//! Discrete actions and action spaces

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Index of an action in a discrete action set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscreteAction(pub usize);

impl DiscreteAction {
    /// Action index
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for DiscreteAction {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Discrete action space `{0, .., n - 1}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteSpace {
    /// Number of discrete actions
    pub n: usize,
}

impl DiscreteSpace {
    /// Create a new discrete action space
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    /// Sample a uniformly random action
    ///
    /// # Panics
    /// Panics if the space is empty.
    pub fn sample(&self, rng: &mut dyn RngCore) -> DiscreteAction {
        DiscreteAction(rng.gen_range(0..self.n))
    }

    /// Check if an action is valid within this space
    #[must_use]
    pub fn contains(&self, action: DiscreteAction) -> bool {
        action.0 < self.n
    }

    /// All actions of the space in index order
    pub fn actions(&self) -> impl Iterator<Item = DiscreteAction> {
        (0..self.n).map(DiscreteAction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_stays_in_space() {
        let space = DiscreteSpace::new(3);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(space.contains(space.sample(&mut rng)));
        }
        assert!(!space.contains(DiscreteAction(3)));
    }

    #[test]
    fn test_actions_in_order() {
        let actions: Vec<_> = DiscreteSpace::new(3).actions().collect();
        assert_eq!(actions, vec![DiscreteAction(0), DiscreteAction(1), DiscreteAction(2)]);
    }
}
