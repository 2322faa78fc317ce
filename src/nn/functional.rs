//! Functional interface for stateless network operations.
//!
//! These functions mirror the module-based operations for use in custom
//! forward passes — the denoising pyramid's upsample-and-fuse loop
//! being the main consumer.

use crate::autograd::Tensor;

/// `ReLU` activation: max(0, x)
#[must_use]
pub fn relu(x: &Tensor) -> Tensor {
    x.relu()
}

/// Bilinear resize of a `[N, C, H, W]` tensor to an exact target size.
///
/// Sample coordinates align the corner pixels of source and target
/// grids, so resizing to the input's own size is an exact identity.
/// Target sizes are always supplied by the caller (the pyramid computes
/// them ahead of time from the configuration), never inferred from a
/// tensor.
///
/// # Panics
///
/// Panics on non-4D input or a zero target dimension.
#[must_use]
pub fn upsample_bilinear(input: &Tensor, size: (usize, usize)) -> Tensor {
    assert_eq!(
        input.ndim(),
        4,
        "upsample_bilinear expects 4D input [N, C, H, W], got {}D",
        input.ndim()
    );
    let (out_h, out_w) = size;
    assert!(
        out_h > 0 && out_w > 0,
        "upsample_bilinear target size must be nonzero, got ({out_h}, {out_w})"
    );

    let shape = input.shape();
    let (batch_size, channels, in_h, in_w) = (shape[0], shape[1], shape[2], shape[3]);

    if (in_h, in_w) == (out_h, out_w) {
        return input.clone();
    }

    let scale_h = if out_h > 1 {
        (in_h - 1) as f32 / (out_h - 1) as f32
    } else {
        0.0
    };
    let scale_w = if out_w > 1 {
        (in_w - 1) as f32 / (out_w - 1) as f32
    } else {
        0.0
    };

    let input_data = input.data();
    let mut output = vec![0.0_f32; batch_size * channels * out_h * out_w];

    for n in 0..batch_size {
        for c in 0..channels {
            let plane = &input_data[(n * channels + c) * in_h * in_w..];

            for oy in 0..out_h {
                let src_y = oy as f32 * scale_h;
                let y0 = src_y.floor() as usize;
                let y1 = (y0 + 1).min(in_h - 1);
                let wy = src_y - y0 as f32;

                for ox in 0..out_w {
                    let src_x = ox as f32 * scale_w;
                    let x0 = src_x.floor() as usize;
                    let x1 = (x0 + 1).min(in_w - 1);
                    let wx = src_x - x0 as f32;

                    let top = plane[y0 * in_w + x0] * (1.0 - wx) + plane[y0 * in_w + x1] * wx;
                    let bottom = plane[y1 * in_w + x0] * (1.0 - wx) + plane[y1 * in_w + x1] * wx;

                    output[(n * channels + c) * out_h * out_w + oy * out_w + ox] =
                        top * (1.0 - wy) + bottom * wy;
                }
            }
        }
    }

    Tensor::new(&output, &[batch_size, channels, out_h, out_w])
}

/// Concatenate `[N, C_i, H, W]` tensors along the channel dimension.
///
/// All inputs must agree on batch size and spatial size.
///
/// # Panics
///
/// Panics on an empty input list or mismatched non-channel dimensions.
#[must_use]
pub fn cat_channels(tensors: &[&Tensor]) -> Tensor {
    assert!(!tensors.is_empty(), "cat_channels requires at least one tensor");

    let first_shape = tensors[0].shape();
    assert_eq!(
        first_shape.len(),
        4,
        "cat_channels expects 4D tensors [N, C, H, W]"
    );
    let (batch_size, h, w) = (first_shape[0], first_shape[2], first_shape[3]);

    let mut total_channels = 0;
    for t in tensors {
        let s = t.shape();
        assert_eq!(s.len(), 4, "cat_channels expects 4D tensors [N, C, H, W]");
        assert_eq!(
            (s[0], s[2], s[3]),
            (batch_size, h, w),
            "cat_channels batch/spatial mismatch: {:?} vs {:?}",
            first_shape,
            s
        );
        total_channels += s[1];
    }

    let spatial = h * w;
    let mut output = Vec::with_capacity(batch_size * total_channels * spatial);

    for n in 0..batch_size {
        for t in tensors {
            let channels = t.shape()[1];
            let offset = n * channels * spatial;
            output.extend_from_slice(&t.data()[offset..offset + channels * spatial]);
        }
    }

    Tensor::new(&output, &[batch_size, total_channels, h, w])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsample_identity_when_same_size() {
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2]);
        let y = upsample_bilinear(&x, (2, 2));
        assert_eq!(y.data(), x.data());
        assert_eq!(y.shape(), x.shape());
    }

    #[test]
    fn test_upsample_doubles_with_interpolation() {
        let x = Tensor::new(&[0.0, 1.0], &[1, 1, 1, 2]);
        let y = upsample_bilinear(&x, (1, 3));
        assert_eq!(y.shape(), &[1, 1, 1, 3]);
        let d = y.data();
        assert!((d[0] - 0.0).abs() < 1e-6);
        assert!((d[1] - 0.5).abs() < 1e-6);
        assert!((d[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_upsample_corner_alignment() {
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2]);
        let y = upsample_bilinear(&x, (3, 3));
        let d = y.data();
        // Corner pixels of the target must equal the source corners
        assert_eq!(d[0], 1.0);
        assert_eq!(d[2], 2.0);
        assert_eq!(d[6], 3.0);
        assert_eq!(d[8], 4.0);
        // Center is the average of all four
        assert!((d[4] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_upsample_odd_to_exact_size() {
        let x = Tensor::zeros(&[2, 3, 4, 4]);
        let y = upsample_bilinear(&x, (7, 5));
        assert_eq!(y.shape(), &[2, 3, 7, 5]);
    }

    #[test]
    fn test_cat_channels_counts() {
        let a = Tensor::new(&[1.0, 2.0], &[1, 2, 1, 1]);
        let b = Tensor::new(&[3.0], &[1, 1, 1, 1]);
        let c = cat_channels(&[&a, &b]);
        assert_eq!(c.shape(), &[1, 3, 1, 1]);
        assert_eq!(c.data(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_cat_channels_batched_interleave() {
        // Per-batch-item blocks must interleave, not append wholesale
        let a = Tensor::new(&[1.0, 2.0], &[2, 1, 1, 1]);
        let b = Tensor::new(&[10.0, 20.0], &[2, 1, 1, 1]);
        let c = cat_channels(&[&a, &b]);
        assert_eq!(c.shape(), &[2, 2, 1, 1]);
        assert_eq!(c.data(), &[1.0, 10.0, 2.0, 20.0]);
    }

    #[test]
    #[should_panic(expected = "batch/spatial mismatch")]
    fn test_cat_channels_spatial_mismatch_panics() {
        let a = Tensor::zeros(&[1, 1, 2, 2]);
        let b = Tensor::zeros(&[1, 1, 3, 3]);
        let _ = cat_channels(&[&a, &b]);
    }
}
