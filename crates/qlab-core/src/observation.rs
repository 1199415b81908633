//! Observation representations and observation spaces

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for observations from an environment
pub trait Observation: Clone + Debug {
    /// Convert observation to a feature vector
    fn to_vec(&self) -> Vec<f64>;

    /// Get the shape of the observation
    fn shape(&self) -> Vec<usize>;
}

/// Trait for defining observation spaces
pub trait ObservationSpace {
    /// The type of observations in this space
    type Observation: Observation;

    /// Check if an observation is valid within this space
    fn contains(&self, obs: &Self::Observation) -> bool;

    /// Get the shape of observations in this space
    fn shape(&self) -> Vec<usize>;

    /// Number of features an observation flattens to
    fn flat_dim(&self) -> usize {
        self.shape().iter().product()
    }
}

/// Vector observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorObservation {
    /// The observation data
    pub data: Vec<f64>,
}

impl VectorObservation {
    /// Wrap a feature vector
    #[must_use]
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }
}

impl Observation for VectorObservation {
    fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.data.len()]
    }
}

/// Observation that is a single state index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscreteObservation(pub usize);

impl Observation for DiscreteObservation {
    fn to_vec(&self) -> Vec<f64> {
        vec![self.0 as f64]
    }

    fn shape(&self) -> Vec<usize> {
        vec![1]
    }
}

/// Space of state indices `{0, .., n - 1}`
#[derive(Debug, Clone, Copy)]
pub struct DiscreteObservationSpace {
    /// Number of states
    pub n: usize,
}

impl DiscreteObservationSpace {
    /// Create a new discrete observation space
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl ObservationSpace for DiscreteObservationSpace {
    type Observation = DiscreteObservation;

    fn contains(&self, obs: &Self::Observation) -> bool {
        obs.0 < self.n
    }

    fn shape(&self) -> Vec<usize> {
        vec![1]
    }
}

/// Box observation space
#[derive(Debug, Clone)]
pub struct BoxObservationSpace {
    /// Lower bounds
    pub low: Vec<f64>,
    /// Upper bounds
    pub high: Vec<f64>,
    /// Shape of observations
    pub shape: Vec<usize>,
}

impl BoxObservationSpace {
    /// Create a new box observation space
    pub fn new(low: Vec<f64>, high: Vec<f64>, shape: Vec<usize>) -> crate::Result<Self> {
        let total_size: usize = shape.iter().product();
        if low.len() != total_size || high.len() != total_size {
            return Err(crate::RLError::DimensionMismatch {
                expected: total_size,
                actual: low.len(),
            });
        }
        Ok(Self { low, high, shape })
    }
}

impl ObservationSpace for BoxObservationSpace {
    type Observation = VectorObservation;

    fn contains(&self, obs: &Self::Observation) -> bool {
        obs.data.len() == self.low.len()
            && obs
                .data
                .iter()
                .zip(&self.low)
                .zip(&self.high)
                .all(|((x, l), h)| x >= l && x <= h)
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_space_rejects_mismatched_bounds() {
        let err = BoxObservationSpace::new(vec![0.0; 3], vec![1.0; 3], vec![4]).unwrap_err();
        assert!(matches!(err, crate::RLError::DimensionMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_box_space_contains() {
        let space = BoxObservationSpace::new(vec![-1.0, -1.0], vec![1.0, 1.0], vec![2]).unwrap();
        assert!(space.contains(&VectorObservation::new(vec![0.5, -0.5])));
        assert!(!space.contains(&VectorObservation::new(vec![1.5, 0.0])));
        assert!(!space.contains(&VectorObservation::new(vec![0.0])));
        assert_eq!(space.flat_dim(), 2);
    }

    #[test]
    fn test_discrete_space() {
        let space = DiscreteObservationSpace::new(6);
        assert!(space.contains(&DiscreteObservation(5)));
        assert!(!space.contains(&DiscreteObservation(6)));
    }
}
