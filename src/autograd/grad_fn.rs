//! Gradient function trait and implementations.
//!
//! Each differentiable operation implements `GradFn` to define how
//! gradients flow backward through the operation.

use super::tensor::Tensor;

/// Trait for functions that compute gradients during the backward pass.
///
/// Each differentiable operation creates a `GradFn` implementation that
/// captures the context needed for gradient computation.
///
/// # Example Implementation
///
/// For element-wise addition z = x + y:
/// - ∂z/∂x = 1
/// - ∂z/∂y = 1
///
/// So `backward(grad_output)` returns [`grad_output`, `grad_output`].
pub trait GradFn: Send + Sync {
    /// Compute gradients with respect to inputs.
    ///
    /// # Arguments
    ///
    /// * `grad_output` - Gradient flowing back from downstream operations
    ///
    /// # Returns
    ///
    /// Vector of gradients, one for each input tensor, in the input
    /// order used during the forward pass.
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor>;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

/// Reduce a gradient to a target shape when the forward op broadcast.
///
/// Equal shapes pass through; a target that is a trailing suffix of the
/// gradient shape is produced by summing over the leading dimensions.
fn maybe_reduce_grad(grad: &Tensor, target_shape: &[usize]) -> Tensor {
    if grad.shape() == target_shape {
        return grad.clone();
    }

    let target_numel: usize = target_shape.iter().product();
    let grad_numel = grad.numel();
    assert!(
        target_numel > 0 && grad_numel % target_numel == 0,
        "cannot reduce gradient of shape {:?} to {:?}",
        grad.shape(),
        target_shape
    );

    let mut reduced = vec![0.0_f32; target_numel];
    for (i, &g) in grad.data().iter().enumerate() {
        reduced[i % target_numel] += g;
    }
    Tensor::new(&reduced, target_shape)
}

// ============================================================================
// Element-wise Operations
// ============================================================================

/// Gradient function for addition: z = x + y
pub(crate) struct AddBackward {
    pub(crate) x_shape: Vec<usize>,
    pub(crate) y_shape: Vec<usize>,
}

impl GradFn for AddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x+y)/∂x = 1, ∂(x+y)/∂y = 1
        let grad_x = maybe_reduce_grad(grad_output, &self.x_shape);
        let grad_y = maybe_reduce_grad(grad_output, &self.y_shape);
        vec![grad_x, grad_y]
    }

    fn name(&self) -> &'static str {
        "AddBackward"
    }
}

/// Gradient function for subtraction: z = x - y
pub(crate) struct SubBackward {
    pub(crate) x_shape: Vec<usize>,
    pub(crate) y_shape: Vec<usize>,
}

impl GradFn for SubBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x-y)/∂x = 1, ∂(x-y)/∂y = -1
        let grad_x = maybe_reduce_grad(grad_output, &self.x_shape);
        let grad_y_data: Vec<f32> = grad_output.data().iter().map(|&g| -g).collect();
        let grad_y_full = Tensor::new(&grad_y_data, grad_output.shape());
        let grad_y = maybe_reduce_grad(&grad_y_full, &self.y_shape);
        vec![grad_x, grad_y]
    }

    fn name(&self) -> &'static str {
        "SubBackward"
    }
}

/// Gradient function for multiplication: z = x * y
pub(crate) struct MulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x*y)/∂x = y, ∂(x*y)/∂y = x
        let grad_x_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.y.data().iter())
            .map(|(&g, &y)| g * y)
            .collect();
        let grad_y_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data().iter())
            .map(|(&g, &x)| g * x)
            .collect();

        let grad_x = maybe_reduce_grad(
            &Tensor::new(&grad_x_data, grad_output.shape()),
            self.x.shape(),
        );
        let grad_y = maybe_reduce_grad(
            &Tensor::new(&grad_y_data, grad_output.shape()),
            self.y.shape(),
        );
        vec![grad_x, grad_y]
    }

    fn name(&self) -> &'static str {
        "MulBackward"
    }
}

/// Gradient function for division: z = x / y
pub(crate) struct DivBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for DivBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x/y)/∂x = 1/y, ∂(x/y)/∂y = -x/y²
        let grad_x_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.y.data().iter())
            .map(|(&g, &y)| g / y)
            .collect();
        let grad_y_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data().iter())
            .zip(self.y.data().iter())
            .map(|((&g, &x), &y)| -g * x / (y * y))
            .collect();

        let grad_x = maybe_reduce_grad(
            &Tensor::new(&grad_x_data, grad_output.shape()),
            self.x.shape(),
        );
        let grad_y = maybe_reduce_grad(
            &Tensor::new(&grad_y_data, grad_output.shape()),
            self.y.shape(),
        );
        vec![grad_x, grad_y]
    }

    fn name(&self) -> &'static str {
        "DivBackward"
    }
}

/// Gradient function for negation: z = -x
pub(crate) struct NegBackward;

impl GradFn for NegBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(-x)/∂x = -1
        let grad_data: Vec<f32> = grad_output.data().iter().map(|&g| -g).collect();
        vec![Tensor::new(&grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "NegBackward"
    }
}

/// Gradient function for pow: z = x^n
pub(crate) struct PowBackward {
    pub(crate) x: Tensor,
    pub(crate) n: f32,
}

impl GradFn for PowBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x^n)/∂x = n * x^(n-1)
        let grad_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data().iter())
            .map(|(&g, &x)| g * self.n * x.powf(self.n - 1.0))
            .collect();
        vec![Tensor::new(&grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "PowBackward"
    }
}

/// Gradient function for absolute value: z = |x|
///
/// The subgradient at zero is taken as zero.
pub(crate) struct AbsBackward {
    pub(crate) x: Tensor,
}

impl GradFn for AbsBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂|x|/∂x = sign(x)
        let grad_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data().iter())
            .map(|(&g, &x)| {
                if x > 0.0 {
                    g
                } else if x < 0.0 {
                    -g
                } else {
                    0.0
                }
            })
            .collect();
        vec![Tensor::new(&grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "AbsBackward"
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

/// Gradient function for sum: z = sum(x)
pub(crate) struct SumBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂sum(x)/∂x_i = 1 for all i
        let g = grad_output.item();
        let numel: usize = self.input_shape.iter().product();
        vec![Tensor::new(&vec![g; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "SumBackward"
    }
}

/// Gradient function for mean: z = mean(x)
pub(crate) struct MeanBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for MeanBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂mean(x)/∂x_i = 1/n for all i
        let g = grad_output.item();
        let numel: usize = self.input_shape.iter().product();
        let grad_val = g / numel as f32;
        vec![Tensor::new(&vec![grad_val; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "MeanBackward"
    }
}

// ============================================================================
// Activation Functions
// ============================================================================

/// Gradient function for `ReLU`: z = max(0, x)
pub(crate) struct ReluBackward {
    pub(crate) x: Tensor,
}

impl GradFn for ReluBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂relu(x)/∂x = 1 if x > 0, else 0
        let grad_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data().iter())
            .map(|(&g, &x)| if x > 0.0 { g } else { 0.0 })
            .collect();
        vec![Tensor::new(&grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "ReluBackward"
    }
}

// ============================================================================
// Linear Algebra
// ============================================================================

/// Raw 2D matrix product on flat slices, without tape recording.
fn matmul_raw(a: &[f32], m: usize, k: usize, b: &[f32], n: usize) -> Vec<f32> {
    let a_matrix = trueno::Matrix::from_vec(m, k, a.to_vec()).expect("valid matrix dimensions");
    let b_matrix = trueno::Matrix::from_vec(k, n, b.to_vec()).expect("valid matrix dimensions");
    let result = a_matrix.matmul(&b_matrix).expect("matmul should succeed");
    result.as_slice().to_vec()
}

/// Raw 2D transpose on a flat slice, without tape recording.
fn transpose_raw(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0_f32; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = data[i * cols + j];
        }
    }
    out
}

/// Gradient function for matmul: z = x @ y
pub(crate) struct MatmulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MatmulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x@y)/∂x = grad @ y^T, ∂(x@y)/∂y = x^T @ grad
        let (m, k) = (self.x.shape()[0], self.x.shape()[1]);
        let n = self.y.shape()[1];

        let y_t = transpose_raw(self.y.data(), k, n);
        let grad_x = matmul_raw(grad_output.data(), m, n, &y_t, k);

        let x_t = transpose_raw(self.x.data(), m, k);
        let grad_y = matmul_raw(&x_t, k, m, grad_output.data(), n);

        vec![
            Tensor::new(&grad_x, &[m, k]),
            Tensor::new(&grad_y, &[k, n]),
        ]
    }

    fn name(&self) -> &'static str {
        "MatmulBackward"
    }
}

/// Gradient function for 2D transpose: z = x^T
pub(crate) struct TransposeBackward;

impl GradFn for TransposeBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x^T)/∂x: transpose the gradient back
        let (rows, cols) = (grad_output.shape()[0], grad_output.shape()[1]);
        let grad = transpose_raw(grad_output.data(), rows, cols);
        vec![Tensor::new(&grad, &[cols, rows])]
    }

    fn name(&self) -> &'static str {
        "TransposeBackward"
    }
}

/// Gradient function for broadcast_add: z = matrix + row_vector
pub(crate) struct BroadcastAddBackward {
    pub(crate) x_shape: Vec<usize>,
    pub(crate) y_shape: Vec<usize>,
}

impl GradFn for BroadcastAddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂z/∂x = grad; ∂z/∂y = column-wise sum over the broadcast rows
        let grad_x = Tensor::new(grad_output.data(), &self.x_shape);

        let cols = self.y_shape[0];
        let rows = self.x_shape[0];
        let mut grad_y = vec![0.0_f32; cols];
        for r in 0..rows {
            for c in 0..cols {
                grad_y[c] += grad_output.data()[r * cols + c];
            }
        }

        vec![grad_x, Tensor::new(&grad_y, &self.y_shape)]
    }

    fn name(&self) -> &'static str {
        "BroadcastAddBackward"
    }
}

// ============================================================================
// Shape Operations
// ============================================================================

/// Gradient function for view: z = x.view(new_shape)
pub(crate) struct ViewBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for ViewBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // View is data-preserving; reshape the gradient back
        vec![Tensor::new(grad_output.data(), &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "ViewBackward"
    }
}

/// Gradient function for select (gather by flat index): z_i = x[indices[i]]
///
/// Used by hard-example mining: the backward pass scatters each selected
/// position's gradient back to its source, leaving unselected positions
/// at zero.
pub(crate) struct SelectBackward {
    pub(crate) input_shape: Vec<usize>,
    pub(crate) indices: Vec<usize>,
}

impl GradFn for SelectBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let numel: usize = self.input_shape.iter().product();
        let mut grad = vec![0.0_f32; numel];
        for (pos, &idx) in self.indices.iter().enumerate() {
            grad[idx] += grad_output.data()[pos];
        }
        vec![Tensor::new(&grad, &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "SelectBackward"
    }
}
