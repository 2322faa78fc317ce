//! The `Module` trait: common interface for all neural network layers.

use crate::autograd::Tensor;

/// Common interface for neural network layers and containers.
///
/// A module maps an input tensor to an output tensor and exposes its
/// learnable parameters. Stateless modules (activations, pooling) use
/// the parameter defaults; modules with train/eval behavior
/// (batch normalization) override the mode methods.
pub trait Module {
    /// Run a forward pass.
    fn forward(&self, input: &Tensor) -> Tensor;

    /// Learnable parameters of this module (empty by default).
    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    /// Mutable learnable parameters of this module (empty by default).
    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    /// Switch to training mode (no-op by default).
    fn train(&mut self) {}

    /// Switch to evaluation mode (no-op by default).
    fn eval(&mut self) {}

    /// Whether the module is in training mode.
    fn training(&self) -> bool {
        true
    }
}
