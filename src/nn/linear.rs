//! Fully-connected layer.

use super::init::{kaiming_uniform, zeros};
use super::module::Module;
use crate::autograd::Tensor;

/// Linear transformation: `y = x @ W^T + b`
///
/// The transposed weight is cached at construction so the forward pass
/// pays for one GEMM and no per-call transpose.
///
/// # Shape
///
/// - Input: `(*, in_features)` where `*` is any number of batch dims
/// - Output: `(*, out_features)`
pub struct Linear {
    /// Weight tensor, shape: [`out_features`, `in_features`]
    weight: Tensor,
    /// Cached transpose of the weight, shape: [`in_features`, `out_features`]
    weight_t: Tensor,
    /// Bias tensor, shape: [`out_features`], or None
    bias: Option<Tensor>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Create a new Linear layer with bias.
    #[must_use]
    pub fn new(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        let weight = kaiming_uniform(&[out_features, in_features], in_features, seed)
            .requires_grad();
        // Detached before transposing so the cache stays off the tape.
        let weight_t = weight.detach().transpose();
        let bias = Some(zeros(&[out_features]).requires_grad());

        Self {
            weight,
            weight_t,
            bias,
            in_features,
            out_features,
        }
    }

    /// Number of input features.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Number of output features.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Get reference to the weight tensor.
    #[must_use]
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor) -> Tensor {
        let input_shape = input.shape();
        let ndim = input_shape.len();
        assert!(
            ndim >= 2,
            "Linear expects at least 2D input, got {ndim}D"
        );
        assert_eq!(
            input_shape[ndim - 1],
            self.in_features,
            "Expected {} input features, got {}",
            self.in_features,
            input_shape[ndim - 1]
        );

        // Flatten leading batch dimensions for the GEMM
        let (reshaped, batch_shape) = if ndim > 2 {
            let batch_size: usize = input_shape[..ndim - 1].iter().product();
            let batch_shape: Vec<usize> = input_shape[..ndim - 1].to_vec();
            (input.view(&[batch_size, self.in_features]), Some(batch_shape))
        } else {
            (input.clone(), None)
        };

        let output = reshaped.matmul(&self.weight_t);

        let output = match &self.bias {
            Some(b) => output.broadcast_add(b),
            None => output,
        };

        match batch_shape {
            Some(mut shape) => {
                shape.push(self.out_features);
                output.view(&shape)
            }
            None => output,
        }
    }

    fn parameters(&self) -> Vec<&Tensor> {
        match &self.bias {
            Some(b) => vec![&self.weight, b],
            None => vec![&self.weight],
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        match &mut self.bias {
            Some(b) => vec![&mut self.weight, b],
            None => vec![&mut self.weight],
        }
    }
}

impl std::fmt::Debug for Linear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .field("bias", &self.bias.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_output_shape() {
        let fc = Linear::new(8, 5, Some(11));
        let x = Tensor::zeros(&[3, 8]);
        let y = fc.forward(&x);
        assert_eq!(y.shape(), &[3, 5]);
    }

    #[test]
    fn test_linear_zero_bias_initially() {
        // Fresh bias is zero, so a zero input maps to zero output
        let fc = Linear::new(4, 2, Some(1));
        let x = Tensor::zeros(&[1, 4]);
        let y = fc.forward(&x);
        assert!(y.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_linear_seeded_reproducible() {
        let a = Linear::new(6, 3, Some(21));
        let b = Linear::new(6, 3, Some(21));
        assert_eq!(a.weight().data(), b.weight().data());
    }

    #[test]
    fn test_linear_parameters() {
        let fc = Linear::new(4, 2, Some(1));
        assert_eq!(fc.parameters().len(), 2);
    }

    #[test]
    #[should_panic(expected = "input features")]
    fn test_linear_feature_mismatch_panics() {
        let fc = Linear::new(4, 2, Some(1));
        let x = Tensor::zeros(&[1, 5]);
        let _ = fc.forward(&x);
    }
}
