//! Convolutional and pooling layers.
//!
//! NCHW layout throughout. Convolution uses an im2col + GEMM fast path
//! (trueno SIMD matmul, batch items in parallel via rayon) with a naive
//! loop fallback kept for verification.
//!
//! # References
//!
//! - `LeCun`, Y., et al. (1998). Gradient-based learning applied to
//!   document recognition. Proceedings of the IEEE.

use rayon::prelude::*;

use super::im2col::im2col_2d;
use super::init::{kaiming_uniform, zeros};
use super::module::Module;
use crate::autograd::Tensor;

/// 2D convolution layer.
///
/// # Shape
///
/// - Input: `(N, C_in, H, W)`
/// - Output: `(N, C_out, H_out, W_out)` where
///   `H_out = (H + 2*padding - kernel) / stride + 1` (and likewise for W)
///
/// With a 3×3 kernel, padding 1 and stride 2 this yields `ceil(H / 2)`,
/// which is the halving rule the denoising pyramid relies on at odd
/// sizes.
pub struct Conv2d {
    /// Weight tensor, shape: [`out_channels`, `in_channels`, `kernel_h`, `kernel_w`]
    weight: Tensor,
    /// Bias tensor, shape: [`out_channels`], or None
    bias: Option<Tensor>,
    /// Number of input channels
    in_channels: usize,
    /// Number of output channels
    out_channels: usize,
    /// Kernel height
    kernel_h: usize,
    /// Kernel width
    kernel_w: usize,
    /// Stride height
    stride_h: usize,
    /// Stride width
    stride_w: usize,
    /// Padding height
    padding_h: usize,
    /// Padding width
    padding_w: usize,
    /// Whether to use the im2col+GEMM path (default: true)
    use_im2col: bool,
}

impl Conv2d {
    /// Create a Conv2d with a square kernel, stride 1, no padding, bias on.
    #[must_use]
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize) -> Self {
        Self::with_options(
            in_channels,
            out_channels,
            (kernel_size, kernel_size),
            (1, 1),
            (0, 0),
            true,
            None,
        )
    }

    /// Create a Conv2d with full control.
    ///
    /// # Arguments
    ///
    /// * `in_channels` - Number of input channels
    /// * `out_channels` - Number of output channels
    /// * `kernel_size` - (height, width) of the kernel
    /// * `stride` - (height, width) stride
    /// * `padding` - (height, width) zero-padding
    /// * `bias` - If true, adds a learnable bias
    /// * `seed` - Optional seed for weight initialization
    #[must_use]
    pub fn with_options(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
        bias: bool,
        seed: Option<u64>,
    ) -> Self {
        let (kernel_h, kernel_w) = kernel_size;

        let fan_in = in_channels * kernel_h * kernel_w;
        let weight = kaiming_uniform(
            &[out_channels, in_channels, kernel_h, kernel_w],
            fan_in,
            seed,
        )
        .requires_grad();

        let bias_tensor = if bias {
            Some(zeros(&[out_channels]).requires_grad())
        } else {
            None
        };

        Self {
            weight,
            bias: bias_tensor,
            in_channels,
            out_channels,
            kernel_h,
            kernel_w,
            stride_h: stride.0,
            stride_w: stride.1,
            padding_h: padding.0,
            padding_w: padding.1,
            use_im2col: true,
        }
    }

    /// Get kernel size as (height, width).
    #[must_use]
    pub fn kernel_size(&self) -> (usize, usize) {
        (self.kernel_h, self.kernel_w)
    }

    /// Get stride as (height, width).
    #[must_use]
    pub fn stride(&self) -> (usize, usize) {
        (self.stride_h, self.stride_w)
    }

    /// Get padding as (height, width).
    #[must_use]
    pub fn padding(&self) -> (usize, usize) {
        (self.padding_h, self.padding_w)
    }

    /// Output spatial size for a given input spatial size.
    #[must_use]
    pub fn output_size(&self, in_h: usize, in_w: usize) -> (usize, usize) {
        (
            (in_h + 2 * self.padding_h - self.kernel_h) / self.stride_h + 1,
            (in_w + 2 * self.padding_w - self.kernel_w) / self.stride_w + 1,
        )
    }

    /// im2col + GEMM convolution, batch items in parallel.
    fn forward_im2col(&self, input: &Tensor) -> Tensor {
        let shape = input.shape();
        let (batch_size, in_channels, in_h, in_w) = (shape[0], shape[1], shape[2], shape[3]);
        let (out_h, out_w) = self.output_size(in_h, in_w);

        let kernel_span = self.in_channels * self.kernel_h * self.kernel_w;
        let weight_data = self.weight.data();
        let bias_data = self.bias.as_ref().map(Tensor::data);

        let input_data = input.data();
        let batch_spatial = in_channels * in_h * in_w;

        let per_item: Vec<Vec<f32>> = (0..batch_size)
            .into_par_iter()
            .map(|n| {
                let batch_input = &input_data[n * batch_spatial..(n + 1) * batch_spatial];

                let (col_data, col_h, col_w) = im2col_2d(
                    batch_input,
                    in_channels,
                    in_h,
                    in_w,
                    self.kernel_h,
                    self.kernel_w,
                    self.stride_h,
                    self.stride_w,
                    self.padding_h,
                    self.padding_w,
                );

                let weight_matrix =
                    trueno::Matrix::from_vec(self.out_channels, kernel_span, weight_data.to_vec())
                        .expect("valid weight dimensions");
                let col_matrix = trueno::Matrix::from_vec(col_h, col_w, col_data)
                    .expect("valid column dimensions");
                let mut result = weight_matrix
                    .matmul(&col_matrix)
                    .expect("conv GEMM should succeed")
                    .as_slice()
                    .to_vec();

                if let Some(bias) = bias_data {
                    let spatial = out_h * out_w;
                    for oc in 0..self.out_channels {
                        for s in 0..spatial {
                            result[oc * spatial + s] += bias[oc];
                        }
                    }
                }

                result
            })
            .collect();

        let mut all_output = Vec::with_capacity(batch_size * self.out_channels * out_h * out_w);
        for item in per_item {
            all_output.extend_from_slice(&item);
        }

        Tensor::new(&all_output, &[batch_size, self.out_channels, out_h, out_w])
    }

    /// Naive 7-loop convolution (verification fallback).
    fn forward_naive(&self, input: &Tensor) -> Tensor {
        let shape = input.shape();
        let (batch_size, in_channels, in_h, in_w) = (shape[0], shape[1], shape[2], shape[3]);
        let (out_h, out_w) = self.output_size(in_h, in_w);

        let mut output = vec![0.0; batch_size * self.out_channels * out_h * out_w];

        let input_data = input.data();
        let weight_data = self.weight.data();

        for n in 0..batch_size {
            for oc in 0..self.out_channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let mut sum = 0.0;

                        for ic in 0..self.in_channels {
                            for kh in 0..self.kernel_h {
                                for kw in 0..self.kernel_w {
                                    let ih = oh * self.stride_h + kh;
                                    let iw = ow * self.stride_w + kw;

                                    let val = if ih < self.padding_h
                                        || ih >= in_h + self.padding_h
                                        || iw < self.padding_w
                                        || iw >= in_w + self.padding_w
                                    {
                                        0.0
                                    } else {
                                        let actual_ih = ih - self.padding_h;
                                        let actual_iw = iw - self.padding_w;
                                        input_data[n * in_channels * in_h * in_w
                                            + ic * in_h * in_w
                                            + actual_ih * in_w
                                            + actual_iw]
                                    };

                                    let w_idx =
                                        oc * self.in_channels * self.kernel_h * self.kernel_w
                                            + ic * self.kernel_h * self.kernel_w
                                            + kh * self.kernel_w
                                            + kw;
                                    sum += val * weight_data[w_idx];
                                }
                            }
                        }

                        if let Some(ref bias) = self.bias {
                            sum += bias.data()[oc];
                        }

                        output[n * self.out_channels * out_h * out_w
                            + oc * out_h * out_w
                            + oh * out_w
                            + ow] = sum;
                    }
                }
            }
        }

        Tensor::new(&output, &[batch_size, self.out_channels, out_h, out_w])
    }
}

impl Module for Conv2d {
    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.ndim(),
            4,
            "Conv2d expects 4D input [N, C, H, W], got {}D",
            input.ndim()
        );
        assert_eq!(
            input.shape()[1],
            self.in_channels,
            "Expected {} input channels, got {}",
            self.in_channels,
            input.shape()[1]
        );

        if self.use_im2col {
            self.forward_im2col(input)
        } else {
            self.forward_naive(input)
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

impl std::fmt::Debug for Conv2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conv2d")
            .field("in_channels", &self.in_channels)
            .field("out_channels", &self.out_channels)
            .field("kernel_size", &(self.kernel_h, self.kernel_w))
            .field("stride", &(self.stride_h, self.stride_w))
            .field("padding", &(self.padding_h, self.padding_w))
            .field("bias", &self.bias.is_some())
            .finish_non_exhaustive()
    }
}

/// Global average pooling.
///
/// Averages each channel over its entire spatial extent.
///
/// # Shape
///
/// - Input: `(N, C, H, W)`
/// - Output: `(N, C)`
#[derive(Debug, Default)]
pub struct GlobalAvgPool2d;

impl GlobalAvgPool2d {
    /// Create a new `GlobalAvgPool2d` layer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Module for GlobalAvgPool2d {
    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.ndim(),
            4,
            "GlobalAvgPool2d expects 4D input [N, C, H, W]"
        );

        let shape = input.shape();
        let (batch_size, channels, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let spatial_size = (h * w) as f32;

        let mut output = vec![0.0; batch_size * channels];
        let input_data = input.data();

        for n in 0..batch_size {
            for c in 0..channels {
                let offset = n * channels * h * w + c * h * w;
                let sum: f32 = input_data[offset..offset + h * w].iter().sum();
                output[n * channels + c] = sum / spatial_size;
            }
        }

        Tensor::new(&output, &[batch_size, channels])
    }
}
