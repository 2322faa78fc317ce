//! Reverse-mode automatic differentiation engine.
//!
//! Tape-based, define-by-run: operations are recorded to a thread-local
//! tape during the forward pass and replayed in reverse to accumulate
//! gradients. Multi-use tensors accumulate their gradients.
//!
//! # Example
//!
//! ```ignore
//! use depurar::autograd::{no_grad, Tensor};
//!
//! let x = Tensor::from_slice(&[1.0, 2.0, 3.0]).requires_grad();
//! let y = Tensor::from_slice(&[1.5, 1.5, 1.5]);
//!
//! // |x - y|^2 averaged, recorded to the tape
//! let loss = x.sub(&y).pow(2.0).mean();
//! loss.backward();
//!
//! // Statistics for a normalization term, off the tape
//! let scale = no_grad(|| y.abs().pow(2.0).mean());
//! ```
//!
//! # References
//!
//! - Rumelhart, D. E., et al. (1986). Learning representations by
//!   back-propagating errors. Nature.
//! - Baydin, A. G., et al. (2018). Automatic differentiation in machine
//!   learning: a survey. JMLR.

pub(crate) mod grad_fn;
mod graph;
mod ops;
mod tensor;

pub use grad_fn::GradFn;
pub use graph::ComputationGraph;
pub use tensor::{Tensor, TensorId};

use std::cell::RefCell;

thread_local! {
    /// Global computation graph for the current thread.
    static GRAPH: RefCell<ComputationGraph> = RefCell::new(ComputationGraph::new());

    /// Flag to disable gradient tracking (for inference and detached branches).
    static GRAD_ENABLED: RefCell<bool> = const { RefCell::new(true) };
}

/// Execute a closure without gradient tracking.
///
/// Tensors created inside the closure are plain leaves: nothing is
/// recorded to the tape. Used for inference, for the loss-normalization
/// denominator, and for control branches evaluated in inference mode.
///
/// # Example
///
/// ```ignore
/// use depurar::autograd::{Tensor, no_grad};
///
/// let x = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
/// let y = no_grad(|| x.mul(&x).sum());
/// assert!(y.grad().is_none());
/// ```
pub fn no_grad<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    GRAD_ENABLED.with(|enabled| {
        let prev = *enabled.borrow();
        *enabled.borrow_mut() = false;
        let result = f();
        *enabled.borrow_mut() = prev;
        result
    })
}

/// Check if gradient tracking is currently enabled.
#[must_use]
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|enabled| *enabled.borrow())
}

/// Get a reference to the thread-local computation graph.
pub(crate) fn with_graph<F, R>(f: F) -> R
where
    F: FnOnce(&mut ComputationGraph) -> R,
{
    GRAPH.with(|graph| f(&mut graph.borrow_mut()))
}

/// Clear the computation graph (called after backward).
pub fn clear_graph() {
    GRAPH.with(|graph| graph.borrow_mut().clear());
}

/// Get gradient for a tensor by ID from the graph.
#[must_use]
pub fn get_grad(id: TensorId) -> Option<Tensor> {
    with_graph(|graph| graph.get_grad(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_grad_context() {
        assert!(is_grad_enabled());

        no_grad(|| {
            assert!(!is_grad_enabled());
        });

        assert!(is_grad_enabled());
    }

    #[test]
    fn test_nested_no_grad() {
        no_grad(|| {
            assert!(!is_grad_enabled());
            no_grad(|| {
                assert!(!is_grad_enabled());
            });
            assert!(!is_grad_enabled());
        });

        assert!(is_grad_enabled());
    }

    #[test]
    fn test_no_grad_result_is_leaf() {
        let x = Tensor::from_slice(&[1.0, -2.0]).requires_grad();
        let y = no_grad(|| x.abs().mean());
        assert!(y.is_leaf());
        assert!(!y.requires_grad_enabled());
    }
}
