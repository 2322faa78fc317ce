//! Denoising-fidelity losses.
//!
//! [`FidelityLoss`] scores how closely a perturbed signal path tracks
//! the clean one at a single level; [`MultiLevelLoss`] applies it
//! across the whole output triple.

use crate::autograd::{no_grad, Tensor};
use crate::error::{DepurarError, Result};

/// Elementwise power-law distance `|x - y|^n / n` with optional
/// hard-example mining and scale normalization.
///
/// Hard-example mining keeps only the `floor(numel * fraction)`
/// largest-loss elements before averaging, focusing the gradient on the
/// positions hardest to match. Normalization divides the mean loss by
/// `mean(|y|^n)` — computed off the tape — making the loss invariant to
/// the target's magnitude.
#[derive(Debug, Clone, Copy)]
pub struct FidelityLoss {
    n: f32,
    hard_mining: f32,
    norm: bool,
}

impl FidelityLoss {
    /// Create a loss with exponent `n`, no mining, no normalization.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `n` is not positive.
    pub fn new(n: f32) -> Result<Self> {
        Self::with_options(n, 0.0, false)
    }

    /// Create a loss with full control.
    ///
    /// # Arguments
    ///
    /// * `n` - Distance exponent (typically 1 or 2)
    /// * `hard_mining` - Mined fraction in `(0, 1]`; `0.0` disables
    /// * `norm` - Whether to normalize by the target magnitude
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `n <= 0` or `hard_mining` is
    /// outside `[0, 1]`.
    pub fn with_options(n: f32, hard_mining: f32, norm: bool) -> Result<Self> {
        if !n.is_finite() || n <= 0.0 {
            return Err(DepurarError::InvalidHyperparameter {
                param: "n".to_string(),
                value: n.to_string(),
                constraint: "n > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&hard_mining) {
            return Err(DepurarError::InvalidHyperparameter {
                param: "hard_mining".to_string(),
                value: hard_mining.to_string(),
                constraint: "0.0 <= hard_mining <= 1.0".to_string(),
            });
        }

        Ok(Self {
            n,
            hard_mining,
            norm,
        })
    }

    /// Number of elements mining would keep for a tensor of `numel`
    /// elements: `floor(numel * fraction)`.
    #[must_use]
    pub fn mined_count(&self, numel: usize) -> usize {
        (numel as f32 * self.hard_mining) as usize
    }

    /// Compute the scalar loss between a perturbed-path tensor `x` and
    /// a clean-path target `y`.
    ///
    /// # Panics
    ///
    /// Panics when the shapes disagree, or when an active mining
    /// fraction is so small it selects zero elements.
    #[must_use]
    pub fn forward(&self, x: &Tensor, y: &Tensor) -> Tensor {
        assert_eq!(
            x.shape(),
            y.shape(),
            "FidelityLoss shapes must match, got {:?} vs {:?}",
            x.shape(),
            y.shape()
        );

        let elementwise = x.sub(y).abs().pow(self.n).mul_scalar(1.0 / self.n);

        let (loss, norm_target) = if self.hard_mining > 0.0 {
            let numel = elementwise.numel();
            let k = self.mined_count(numel);
            assert!(
                k > 0,
                "hard mining fraction {} selects zero of {} elements",
                self.hard_mining,
                numel
            );

            let flat = elementwise.view(&[numel]);

            // Indices of the k largest per-element losses
            let mut order: Vec<usize> = (0..numel).collect();
            let values = flat.data();
            order.sort_unstable_by(|&a, &b| values[b].total_cmp(&values[a]));
            order.truncate(k);

            let mined = flat.select(&order);

            // The normalization target follows the mined positions
            let picked: Vec<f32> = order.iter().map(|&i| y.data()[i]).collect();
            (mined, Tensor::from_slice(&picked))
        } else {
            (elementwise, y.clone())
        };

        let loss = loss.mean();

        if self.norm {
            let denom = no_grad(|| norm_target.abs().pow(self.n).mean()).item();
            loss.mul_scalar(1.0 / denom)
        } else {
            loss
        }
    }
}

/// Applies a [`FidelityLoss`] across two equal-length sequences of
/// tensors, returning one scalar per level.
///
/// Levels are compared strictly index-wise; the per-level losses are
/// returned unsummed so callers choose how to weight them.
#[derive(Debug, Clone, Copy)]
pub struct MultiLevelLoss {
    loss: FidelityLoss,
}

impl MultiLevelLoss {
    /// Create a multi-level loss.
    ///
    /// # Errors
    ///
    /// Propagates [`FidelityLoss::with_options`] validation.
    pub fn with_options(n: f32, hard_mining: f32, norm: bool) -> Result<Self> {
        Ok(Self {
            loss: FidelityLoss::with_options(n, hard_mining, norm)?,
        })
    }

    /// The per-level loss.
    #[must_use]
    pub fn level_loss(&self) -> &FidelityLoss {
        &self.loss
    }

    /// Compute per-level losses between two output sequences.
    ///
    /// # Panics
    ///
    /// Panics when the sequences have different lengths.
    #[must_use]
    pub fn forward(&self, x: &[Tensor], y: &[Tensor]) -> Vec<Tensor> {
        assert_eq!(
            x.len(),
            y.len(),
            "MultiLevelLoss sequence lengths must match, got {} vs {}",
            x.len(),
            y.len()
        );

        x.iter()
            .zip(y.iter())
            .map(|(xi, yi)| self.loss.forward(xi, yi))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_tensors_zero_loss() {
        let loss = FidelityLoss::new(2.0).expect("valid");
        let x = Tensor::from_slice(&[0.3, -1.2, 4.0]);
        let y = Tensor::from_slice(&[0.3, -1.2, 4.0]);
        assert_eq!(loss.forward(&x, &y).item(), 0.0);
    }

    #[test]
    fn test_l2_value() {
        // |x - y|^2 / 2 averaged: ((1)^2 + (3)^2) / 2 / 2 = 2.5
        let loss = FidelityLoss::new(2.0).expect("valid");
        let x = Tensor::from_slice(&[1.0, 3.0]);
        let y = Tensor::from_slice(&[0.0, 0.0]);
        assert!((loss.forward(&x, &y).item() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_l1_value() {
        // |x - y|^1 / 1 averaged: (2 + 4) / 2 = 3
        let loss = FidelityLoss::new(1.0).expect("valid");
        let x = Tensor::from_slice(&[2.0, -4.0]);
        let y = Tensor::from_slice(&[0.0, 0.0]);
        assert!((loss.forward(&x, &y).item() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_hard_mining_selects_floor_count() {
        let loss = FidelityLoss::with_options(2.0, 0.5, false).expect("valid");
        assert_eq!(loss.mined_count(10), 5);
        assert_eq!(loss.mined_count(5), 2);

        // Monotone in the fraction
        let looser = FidelityLoss::with_options(2.0, 0.8, false).expect("valid");
        assert!(looser.mined_count(10) >= loss.mined_count(10));
    }

    #[test]
    fn test_hard_mining_keeps_largest() {
        // Elements: diffs 0, 10 → mining half keeps only the 10
        let loss = FidelityLoss::with_options(1.0, 0.5, false).expect("valid");
        let x = Tensor::from_slice(&[0.0, 10.0]);
        let y = Tensor::from_slice(&[0.0, 0.0]);
        assert!((loss.forward(&x, &y).item() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_norm_divides_by_target_scale() {
        // mean(|x-y|^2 / 2) = 0.5, mean(|y|^2) = 4 → 0.125
        let loss = FidelityLoss::with_options(2.0, 0.0, true).expect("valid");
        let x = Tensor::from_slice(&[3.0, 1.0]);
        let y = Tensor::from_slice(&[2.0, 2.0]);
        assert!((loss.forward(&x, &y).item() - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        assert!(FidelityLoss::with_options(2.0, 1.5, false).is_err());
        assert!(FidelityLoss::with_options(2.0, -0.1, false).is_err());
    }

    #[test]
    fn test_invalid_exponent_rejected() {
        assert!(FidelityLoss::new(0.0).is_err());
        assert!(FidelityLoss::new(-2.0).is_err());
    }

    #[test]
    #[should_panic(expected = "shapes must match")]
    fn test_shape_mismatch_panics() {
        let loss = FidelityLoss::new(2.0).expect("valid");
        let x = Tensor::from_slice(&[1.0, 2.0]);
        let y = Tensor::from_slice(&[1.0]);
        let _ = loss.forward(&x, &y);
    }

    #[test]
    fn test_loss_is_differentiable() {
        crate::autograd::clear_graph();
        let loss = FidelityLoss::new(2.0).expect("valid");
        let x = Tensor::from_slice(&[2.0, 0.0]).requires_grad();
        let y = Tensor::from_slice(&[0.0, 0.0]);

        loss.forward(&x, &y).backward();

        // d/dx mean(|x|^2 / 2) = x / numel
        let grad = crate::autograd::get_grad(x.id()).expect("gradient for x");
        assert_eq!(grad.data(), &[1.0, 0.0]);
        crate::autograd::clear_graph();
    }

    #[test]
    fn test_multi_level_lengths_and_independence() {
        let agg = MultiLevelLoss::with_options(2.0, 0.0, false).expect("valid");
        let x = vec![
            Tensor::from_slice(&[1.0]),
            Tensor::from_slice(&[0.0]),
            Tensor::from_slice(&[2.0]),
        ];
        let y = vec![
            Tensor::from_slice(&[0.0]),
            Tensor::from_slice(&[0.0]),
            Tensor::from_slice(&[0.0]),
        ];

        let losses = agg.forward(&x, &y);
        assert_eq!(losses.len(), 3);
        // Element i depends only on index i
        assert!((losses[0].item() - 0.5).abs() < 1e-6);
        assert_eq!(losses[1].item(), 0.0);
        assert!((losses[2].item() - 2.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "sequence lengths must match")]
    fn test_multi_level_length_mismatch_panics() {
        let agg = MultiLevelLoss::with_options(2.0, 0.0, false).expect("valid");
        let x = vec![Tensor::from_slice(&[1.0])];
        let y: Vec<Tensor> = Vec::new();
        let _ = agg.forward(&x, &y);
    }
}
