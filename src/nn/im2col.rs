//! im2col lowering for convolution.
//!
//! Unfolds a single image's receptive fields into the columns of a
//! matrix so that convolution becomes one GEMM:
//! `weight [C_out, C_in*KH*KW] @ col [C_in*KH*KW, OH*OW]`.

/// Unfold one `[C, H, W]` image into a `[C*KH*KW, OH*OW]` column matrix.
///
/// Returns `(data, rows, cols)` with `rows = channels * kernel_h *
/// kernel_w` and `cols = out_h * out_w`. Out-of-bounds taps (from
/// padding) contribute zeros.
#[allow(clippy::too_many_arguments)]
pub(crate) fn im2col_2d(
    input: &[f32],
    channels: usize,
    in_h: usize,
    in_w: usize,
    kernel_h: usize,
    kernel_w: usize,
    stride_h: usize,
    stride_w: usize,
    padding_h: usize,
    padding_w: usize,
) -> (Vec<f32>, usize, usize) {
    let out_h = (in_h + 2 * padding_h - kernel_h) / stride_h + 1;
    let out_w = (in_w + 2 * padding_w - kernel_w) / stride_w + 1;

    let rows = channels * kernel_h * kernel_w;
    let cols = out_h * out_w;
    let mut data = vec![0.0_f32; rows * cols];

    for c in 0..channels {
        for kh in 0..kernel_h {
            for kw in 0..kernel_w {
                let row = c * kernel_h * kernel_w + kh * kernel_w + kw;

                for oh in 0..out_h {
                    let ih = oh * stride_h + kh;
                    // Padded coordinate; taps outside the image stay zero.
                    if ih < padding_h || ih >= in_h + padding_h {
                        continue;
                    }
                    let actual_ih = ih - padding_h;

                    for ow in 0..out_w {
                        let iw = ow * stride_w + kw;
                        if iw < padding_w || iw >= in_w + padding_w {
                            continue;
                        }
                        let actual_iw = iw - padding_w;

                        data[row * cols + oh * out_w + ow] =
                            input[c * in_h * in_w + actual_ih * in_w + actual_iw];
                    }
                }
            }
        }
    }

    (data, rows, cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_kernel_no_padding() {
        // 1x1 kernel, stride 1: columns are just the pixels in order
        let input = [1.0, 2.0, 3.0, 4.0];
        let (data, rows, cols) = im2col_2d(&input, 1, 2, 2, 1, 1, 1, 1, 0, 0);
        assert_eq!(rows, 1);
        assert_eq!(cols, 4);
        assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_same_padding_3x3_dims() {
        let input = vec![1.0; 2 * 5 * 7];
        let (_, rows, cols) = im2col_2d(&input, 2, 5, 7, 3, 3, 1, 1, 1, 1);
        assert_eq!(rows, 2 * 9);
        assert_eq!(cols, 5 * 7);
    }

    #[test]
    fn test_strided_output_is_ceil_half() {
        // 3x3 kernel, stride 2, padding 1 on odd input: out = ceil(5/2) = 3
        let input = vec![1.0; 5 * 5];
        let (_, _, cols) = im2col_2d(&input, 1, 5, 5, 3, 3, 2, 2, 1, 1);
        assert_eq!(cols, 3 * 3);
    }

    #[test]
    fn test_padding_contributes_zeros() {
        // Single pixel, 3x3 kernel with padding 1: only the center tap is set
        let input = [5.0];
        let (data, rows, cols) = im2col_2d(&input, 1, 1, 1, 3, 3, 1, 1, 1, 1);
        assert_eq!((rows, cols), (9, 1));
        let nonzero: Vec<usize> = data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(nonzero, vec![4]);
        assert_eq!(data[4], 5.0);
    }
}
