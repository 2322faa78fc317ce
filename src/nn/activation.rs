//! Activation function modules.
//!
//! Module wrappers around the tensor activation ops, for use in
//! `Sequential` containers. For functional versions, see
//! [`super::functional`].

use super::module::Module;
use crate::autograd::Tensor;

/// Rectified Linear Unit activation: `ReLU(x) = max(0, x)`
///
/// # Shape
///
/// - Input: `(*)` any shape
/// - Output: `(*)` same shape as input
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl ReLU {
    /// Create a new ReLU activation.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Module for ReLU {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.relu()
    }
}
