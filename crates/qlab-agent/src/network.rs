//! Multilayer perceptron action-value approximator
//!
//! A plain `ndarray` network: hidden layers with a fixed activation, a
//! linear output layer with one unit per action, mean-squared-error loss
//! and an RMSProp optimizer. Gradients are computed by hand.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use qlab_core::{RLError, Result};

/// Something that maps a batch of states to a batch of action values
pub trait FunctionApproximator {
    /// Width of an input row
    fn input_dim(&self) -> usize;

    /// Number of outputs per row
    fn output_dim(&self) -> usize;

    /// Outputs for each input row
    fn predict(&self, inputs: ArrayView2<'_, f32>) -> Result<Array2<f32>>;

    /// One gradient step toward `targets`, returning the loss before the step
    fn train_step(&mut self, inputs: ArrayView2<'_, f32>, targets: ArrayView2<'_, f32>)
        -> Result<f32>;

    /// All parameters flattened
    fn parameters(&self) -> Vec<f32>;

    /// Overwrite all parameters from a flattened vector
    fn set_parameters(&mut self, params: &[f32]) -> Result<()>;

    /// Copy the parameters of `other` into `self`
    fn sync_from(&mut self, other: &Self) -> Result<()>
    where
        Self: Sized,
    {
        self.set_parameters(&other.parameters())
    }
}

/// Hidden-layer nonlinearity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// `max(0, x)`
    #[default]
    Relu,
    /// Hyperbolic tangent
    Tanh,
}

impl Activation {
    fn apply(self, x: &mut Array2<f32>) {
        match self {
            Self::Relu => x.mapv_inplace(|v| v.max(0.0)),
            Self::Tanh => x.mapv_inplace(f32::tanh),
        }
    }

    /// Derivative expressed through the activated output
    fn derivative(self, activated: &Array2<f32>) -> Array2<f32> {
        match self {
            Self::Relu => activated.mapv(|a| if a > 0.0 { 1.0 } else { 0.0 }),
            Self::Tanh => activated.mapv(|a| 1.0 - a * a),
        }
    }
}

/// Network shape and initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QNetworkConfig {
    /// Input dimension
    pub input_dim: usize,
    /// Hidden layer sizes
    pub hidden_dims: Vec<usize>,
    /// Output dimension (number of actions)
    pub output_dim: usize,
    /// Hidden activation
    pub activation: Activation,
    /// Standard deviation of the initial weights
    pub weight_std: f32,
    /// Initial bias of every unit
    pub bias_init: f32,
    /// RMSProp learning rate
    pub learning_rate: f32,
}

impl Default for QNetworkConfig {
    fn default() -> Self {
        Self {
            input_dim: 4,
            hidden_dims: vec![10],
            output_dim: 2,
            activation: Activation::Relu,
            weight_std: 0.3,
            bias_init: 0.1,
            learning_rate: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
struct Dense {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl Dense {
    fn n_params(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

/// RMSProp with mean-square accumulators starting at one
#[derive(Debug, Clone)]
pub struct RmsProp {
    /// Step size
    pub learning_rate: f32,
    /// Accumulator decay
    pub decay: f32,
    /// Added under the square root
    pub epsilon: f32,
    mean_square: Vec<(Array2<f32>, Array1<f32>)>,
}

impl RmsProp {
    /// Create an optimizer for layers of the given `(rows, cols)` weight shapes
    #[must_use]
    pub fn new(learning_rate: f32, shapes: &[(usize, usize)]) -> Self {
        Self {
            learning_rate,
            decay: 0.9,
            epsilon: 1e-10,
            mean_square: shapes
                .iter()
                .map(|&(rows, cols)| (Array2::ones((rows, cols)), Array1::ones(cols)))
                .collect(),
        }
    }

    fn step(&mut self, layers: &mut [Dense], grads: &[(Array2<f32>, Array1<f32>)]) {
        let (lr, decay, eps) = (self.learning_rate, self.decay, self.epsilon);
        for ((layer, (gw, gb)), (ms_w, ms_b)) in
            layers.iter_mut().zip(grads).zip(self.mean_square.iter_mut())
        {
            ndarray::Zip::from(&mut layer.weights)
                .and(ms_w)
                .and(gw)
                .for_each(|w, ms, &g| {
                    *ms = decay * *ms + (1.0 - decay) * g * g;
                    *w -= lr * g / (*ms + eps).sqrt();
                });
            ndarray::Zip::from(&mut layer.bias)
                .and(ms_b)
                .and(gb)
                .for_each(|b, ms, &g| {
                    *ms = decay * *ms + (1.0 - decay) * g * g;
                    *b -= lr * g / (*ms + eps).sqrt();
                });
        }
    }
}

/// Fully connected action-value network
#[derive(Debug, Clone)]
pub struct QNetwork {
    config: QNetworkConfig,
    layers: Vec<Dense>,
    optimizer: RmsProp,
}

impl QNetwork {
    /// Build a network with normally distributed weights
    pub fn new<R: Rng + ?Sized>(config: QNetworkConfig, rng: &mut R) -> Result<Self> {
        if config.input_dim == 0 || config.output_dim == 0 || config.hidden_dims.contains(&0) {
            return Err(RLError::Config(format!(
                "network dimensions must be positive: {} -> {:?} -> {}",
                config.input_dim, config.hidden_dims, config.output_dim
            )));
        }
        let normal = Normal::new(0.0_f32, config.weight_std)
            .map_err(|e| RLError::Config(format!("invalid weight_std: {e}")))?;

        let mut dims = vec![config.input_dim];
        dims.extend(&config.hidden_dims);
        dims.push(config.output_dim);

        let layers: Vec<Dense> = dims
            .windows(2)
            .map(|w| Dense {
                weights: Array2::from_shape_fn((w[0], w[1]), |_| normal.sample(rng)),
                bias: Array1::from_elem(w[1], config.bias_init),
            })
            .collect();
        let shapes: Vec<(usize, usize)> = dims.windows(2).map(|w| (w[0], w[1])).collect();

        Ok(Self {
            optimizer: RmsProp::new(config.learning_rate, &shapes),
            config,
            layers,
        })
    }

    /// Network configuration
    #[must_use]
    pub fn config(&self) -> &QNetworkConfig {
        &self.config
    }

    /// Total number of parameters
    #[must_use]
    pub fn n_params(&self) -> usize {
        self.layers.iter().map(Dense::n_params).sum()
    }

    fn check_input(&self, inputs: &ArrayView2<'_, f32>) -> Result<()> {
        if inputs.ncols() == self.config.input_dim {
            Ok(())
        } else {
            Err(RLError::DimensionMismatch {
                expected: self.config.input_dim,
                actual: inputs.ncols(),
            })
        }
    }

    /// Activations of every layer, input first and raw output last
    fn forward(&self, inputs: ArrayView2<'_, f32>) -> Vec<Array2<f32>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(inputs.to_owned());
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = activations[i].dot(&layer.weights) + &layer.bias;
            if i < last {
                self.config.activation.apply(&mut z);
            }
            activations.push(z);
        }
        activations
    }
}

impl FunctionApproximator for QNetwork {
    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    fn predict(&self, inputs: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        self.check_input(&inputs)?;
        let mut activations = self.forward(inputs);
        activations
            .pop()
            .ok_or_else(|| RLError::Computation("network has no layers".to_string()))
    }

    fn train_step(
        &mut self,
        inputs: ArrayView2<'_, f32>,
        targets: ArrayView2<'_, f32>,
    ) -> Result<f32> {
        self.check_input(&inputs)?;
        let expected = (inputs.nrows(), self.config.output_dim);
        if targets.dim() != expected {
            return Err(RLError::DimensionMismatch {
                expected: expected.0 * expected.1,
                actual: targets.len(),
            });
        }
        if targets.is_empty() {
            return Err(RLError::InsufficientSamples {
                requested: 1,
                available: 0,
            });
        }

        let activations = self.forward(inputs);
        let output = &activations[activations.len() - 1];
        let diff = output - &targets;
        let n = diff.len() as f32;
        let loss = diff.mapv(|d| d * d).sum() / n;
        if !loss.is_finite() {
            return Err(RLError::Computation(format!("non-finite loss {loss}")));
        }

        // Backpropagate d(loss)/d(output) = 2 * diff / n
        let mut delta = diff * (2.0 / n);
        let mut grads = Vec::with_capacity(self.layers.len());
        for i in (0..self.layers.len()).rev() {
            let gw = activations[i].t().dot(&delta);
            let gb = delta.sum_axis(Axis(0));
            if i > 0 {
                delta = delta.dot(&self.layers[i].weights.t())
                    * self.config.activation.derivative(&activations[i]);
            }
            grads.push((gw, gb));
        }
        grads.reverse();

        self.optimizer.step(&mut self.layers, &grads);
        Ok(loss)
    }

    fn parameters(&self) -> Vec<f32> {
        let mut params = Vec::with_capacity(self.n_params());
        for layer in &self.layers {
            params.extend(layer.weights.iter().copied());
            params.extend(layer.bias.iter().copied());
        }
        params
    }

    fn set_parameters(&mut self, params: &[f32]) -> Result<()> {
        let expected = self.n_params();
        if params.len() != expected {
            return Err(RLError::DimensionMismatch {
                expected,
                actual: params.len(),
            });
        }
        let mut values = params.iter().copied();
        for layer in &mut self.layers {
            for (dst, src) in layer.weights.iter_mut().zip(values.by_ref()) {
                *dst = src;
            }
            for (dst, src) in layer.bias.iter_mut().zip(values.by_ref()) {
                *dst = src;
            }
        }
        Ok(())
    }
}
