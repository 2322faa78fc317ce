//! Normalization layers.
//!
//! # References
//!
//! - Ioffe, S., & Szegedy, C. (2015). Batch normalization: Accelerating
//!   deep network training. ICML.

use std::cell::RefCell;

use super::init::{constant, zeros};
use super::module::Module;
use crate::autograd::Tensor;

/// Batch normalization over the channel dimension of `[N, C, H, W]`
/// feature maps (Ioffe & Szegedy, 2015).
///
/// Training mode normalizes with per-batch statistics computed over
/// `N × H × W` and folds them into the running estimates; evaluation
/// mode normalizes with the running estimates alone. The running
/// statistics accumulate across calls and reset only when the layer is
/// rebuilt.
///
/// The running buffers are per-instance shared mutable state: with the
/// layer in training mode, concurrent forward passes would race on
/// them. The single-threaded step discipline assumed by the training
/// pipeline is what keeps this sound.
///
/// # Shape
///
/// - Input: `(N, C, H, W)` with `C == num_features`
/// - Output: same as input
#[derive(Debug)]
pub struct BatchNorm2d {
    num_features: usize,
    eps: f32,
    momentum: f32,
    /// Learnable scale (gamma)
    weight: Tensor,
    /// Learnable shift (beta)
    bias: Tensor,
    /// Running mean, updated in training mode (not learnable)
    running_mean: RefCell<Vec<f32>>,
    /// Running variance, updated in training mode (not learnable)
    running_var: RefCell<Vec<f32>>,
    /// Training mode
    training: bool,
}

impl BatchNorm2d {
    /// Create a new `BatchNorm2d` layer.
    ///
    /// # Arguments
    ///
    /// * `num_features` - Number of channels
    #[must_use]
    pub fn new(num_features: usize) -> Self {
        Self {
            num_features,
            eps: 1e-5,
            momentum: 0.1,
            weight: constant(&[num_features], 1.0).requires_grad(),
            bias: zeros(&[num_features]).requires_grad(),
            running_mean: RefCell::new(vec![0.0; num_features]),
            running_var: RefCell::new(vec![1.0; num_features]),
            training: true,
        }
    }

    /// Set momentum for the running statistics update.
    #[must_use]
    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    /// Set epsilon for numerical stability.
    #[must_use]
    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Number of channels this layer normalizes.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Snapshot of the running mean (for inspection in tests).
    #[must_use]
    pub fn running_mean(&self) -> Vec<f32> {
        self.running_mean.borrow().clone()
    }

    /// Snapshot of the running variance (for inspection in tests).
    #[must_use]
    pub fn running_var(&self) -> Vec<f32> {
        self.running_var.borrow().clone()
    }
}

impl Module for BatchNorm2d {
    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.ndim(),
            4,
            "BatchNorm2d expects 4D input [N, C, H, W], got {}D",
            input.ndim()
        );

        let shape = input.shape();
        let (batch_size, channels, h, w) = (shape[0], shape[1], shape[2], shape[3]);

        assert_eq!(
            channels, self.num_features,
            "Expected {} channels, got {}",
            self.num_features, channels
        );

        let input_data = input.data();
        let mut output_data = vec![0.0; input_data.len()];
        let spatial = h * w;
        let count = (batch_size * spatial) as f32;

        for c in 0..channels {
            let (mean, var) = if self.training {
                // Batch statistics over N, H, W
                let mut sum = 0.0;
                for n in 0..batch_size {
                    let offset = n * channels * spatial + c * spatial;
                    sum += input_data[offset..offset + spatial].iter().sum::<f32>();
                }
                let mean = sum / count;

                let mut var_sum = 0.0;
                for n in 0..batch_size {
                    let offset = n * channels * spatial + c * spatial;
                    for &val in &input_data[offset..offset + spatial] {
                        var_sum += (val - mean).powi(2);
                    }
                }
                let var = var_sum / count;

                // Fold into the running estimates
                {
                    let mut running_mean = self.running_mean.borrow_mut();
                    let mut running_var = self.running_var.borrow_mut();
                    running_mean[c] = (1.0 - self.momentum) * running_mean[c] + self.momentum * mean;
                    running_var[c] = (1.0 - self.momentum) * running_var[c] + self.momentum * var;
                }

                (mean, var)
            } else {
                (self.running_mean.borrow()[c], self.running_var.borrow()[c])
            };

            let std_inv = 1.0 / (var + self.eps).sqrt();
            let gamma = self.weight.data()[c];
            let beta = self.bias.data()[c];

            for n in 0..batch_size {
                let offset = n * channels * spatial + c * spatial;
                for s in 0..spatial {
                    let idx = offset + s;
                    output_data[idx] = (input_data[idx] - mean) * std_inv * gamma + beta;
                }
            }
        }

        Tensor::new(&output_data, shape)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }

    fn train(&mut self) {
        self.training = true;
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn training(&self) -> bool {
        self.training
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_normalizes_batch() {
        let bn = BatchNorm2d::new(1);
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2]);
        let y = bn.forward(&x);

        // Output should have ~zero mean and ~unit variance
        let mean: f32 = y.data().iter().sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        let var: f32 = y.data().iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_running_stats_accumulate_in_training() {
        let bn = BatchNorm2d::new(1);
        let x = Tensor::new(&[2.0, 2.0, 2.0, 2.0], &[1, 1, 2, 2]);
        let _ = bn.forward(&x);

        // running_mean moved from 0 toward the batch mean of 2
        let rm = bn.running_mean()[0];
        assert!((rm - 0.2).abs() < 1e-6, "running mean was {rm}");
    }

    #[test]
    fn test_eval_uses_running_stats() {
        let mut bn = BatchNorm2d::new(1);
        bn.eval();
        // Fresh layer: running_mean = 0, running_var = 1, so eval mode
        // is (approximately) an identity map.
        let x = Tensor::new(&[1.0, -2.0, 0.5, 3.0], &[1, 1, 2, 2]);
        let y = bn.forward(&x);
        for (a, b) in x.data().iter().zip(y.data()) {
            assert!((a - b).abs() < 1e-4);
        }
        // And running stats must not move in eval mode
        assert_eq!(bn.running_mean()[0], 0.0);
    }

    #[test]
    fn test_per_channel_statistics() {
        let bn = BatchNorm2d::new(2);
        // Channel 0 constant 1, channel 1 constant 5
        let x = Tensor::new(&[1.0, 1.0, 5.0, 5.0], &[1, 2, 1, 2]);
        let _ = bn.forward(&x);
        let rm = bn.running_mean();
        assert!((rm[0] - 0.1).abs() < 1e-6);
        assert!((rm[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "channels")]
    fn test_channel_mismatch_panics() {
        let bn = BatchNorm2d::new(3);
        let x = Tensor::zeros(&[1, 2, 2, 2]);
        let _ = bn.forward(&x);
    }

    #[test]
    fn test_train_eval_toggle() {
        let mut bn = BatchNorm2d::new(1);
        assert!(bn.training());
        bn.eval();
        assert!(!bn.training());
        bn.train();
        assert!(bn.training());
    }
}
