//! Training helpers

/// Exponentially smoothed episode reward
///
/// The first episode seeds the average, later episodes move it by
/// `1 - decay` of the difference.
#[derive(Debug, Clone)]
pub struct RunningReward {
    /// Smoothing factor kept from the previous average
    pub decay: f64,
    value: Option<f64>,
}

impl RunningReward {
    /// Create a new running reward
    #[must_use]
    pub fn new(decay: f64) -> Self {
        Self { decay, value: None }
    }

    /// Fold an episode sum into the average, returning the new value
    pub fn update(&mut self, episode_reward: f64) -> f64 {
        let next = match self.value {
            None => episode_reward,
            Some(v) => v * self.decay + episode_reward * (1.0 - self.decay),
        };
        self.value = Some(next);
        next
    }

    /// Current average, `None` before the first episode
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Default for RunningReward {
    fn default() -> Self {
        Self::new(0.99)
    }
}
