//! Multi-scale denoising encoder-decoder.
//!
//! The architectural centerpiece: a pyramid of downsampling residual
//! stages, a symmetric pyramid of upsampling stages fusing
//! skip-connected features, a 1×1 projection, and a residual addition
//! back to the untouched input — the network predicts a corrective
//! delta, not an absolute reconstruction.
//!
//! ```text
//! x ──stage 0──┬──stage 1──┬── ... ──stage L-1──┐
//!              │skip       │skip                │
//!              ▼           ▼                    ▼
//! x + proj(◄─fuse 0◄────fuse 1◄─── ... ◄──upsample──┘
//! ```

mod config;
mod unit;

pub use config::{PyramidConfig, UnitKind};
pub use unit::{BottleneckUnit, ConvUnit, PassThrough};

use crate::autograd::Tensor;
use crate::error::Result;
use crate::nn::functional::{cat_channels, upsample_bilinear};
use crate::nn::{Module, ModuleList, Sequential};

/// Network input channel count (RGB).
const IN_CHANNELS: usize = 3;

fn ceil_half(v: usize) -> usize {
    v.div_ceil(2)
}

fn subseed(seed: Option<u64>, offset: u64) -> Option<u64> {
    seed.map(|s| s.wrapping_add(offset))
}

/// Multi-scale denoising encoder-decoder.
///
/// Built once from a [`PyramidConfig`]; stage lists and per-scale
/// target resolutions are resolved at construction, so the forward pass
/// only walks prebuilt structure. The per-scale resolutions come from
/// repeated ceiling halving of the configured input size — never
/// inferred from tensors at run time — which is what makes odd input
/// sizes exact.
///
/// # Shape
///
/// - Input: `(N, 3, H, W)` with `(H, W)` equal to the configured size
/// - Output: `(N, 3, H, W)` — always exactly the input shape
pub struct Denoiser {
    config: PyramidConfig,
    /// One `Sequential` of residual units per forward scale.
    fwd_stages: ModuleList,
    /// One `Sequential` per backward scale (empty for a 1-scale pyramid).
    back_stages: ModuleList,
    /// Spatial size of every scale, index 0 = full resolution.
    scale_sizes: Vec<(usize, usize)>,
    /// 1×1 projection back to the input channel count.
    final_proj: crate::nn::Conv2d,
}

impl Denoiser {
    /// Build the pyramid described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` violates the pyramid
    /// invariants (see [`PyramidConfig::validate`]).
    pub fn new(config: &PyramidConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;

        let expansion = config.unit.expansion();
        let scales = config.scales();

        // Resolution ladder: scale i is the input size halved i times
        // (ceiling at odd sizes, matching strided same-padding convs).
        let mut scale_sizes = Vec::with_capacity(scales);
        let (mut h, mut w) = config.input_size;
        for _ in 0..scales {
            scale_sizes.push((h, w));
            h = ceil_half(h);
            w = ceil_half(w);
        }

        let mut seed_counter = 0_u64;
        let mut next_seed = || {
            seed_counter += 8;
            subseed(seed, seed_counter)
        };

        // Downsampling stages. The first unit of every scale but the
        // topmost runs at stride 2.
        let mut fwd_stages = ModuleList::new();
        let mut n_in = IN_CHANNELS;
        for i in 0..scales {
            let width = config.fwd_channels[i];
            let mut stage = Sequential::new();
            for j in 0..config.fwd_blocks[i] {
                let stride = if j == 0 && i > 0 { 2 } else { 1 };
                let unit_in = if j == 0 { n_in } else { width * expansion };
                stage = stage.add_boxed(unit::build_unit(
                    config.unit,
                    unit_in,
                    width,
                    stride,
                    next_seed(),
                ));
            }
            n_in = width * expansion;
            fwd_stages.push(stage);
        }

        // Upsampling stages. Stage i consumes the concatenation of the
        // resized deeper feature and the cached scale-i skip feature:
        // the deepest stage sees the two deepest forward widths, every
        // shallower stage sees its deeper neighbour's backward width
        // next to its own scale's forward width.
        let mut back_stages = ModuleList::new();
        for i in 0..scales.saturating_sub(1) {
            let width = config.back_channels[i];
            let concat_in = if i == scales - 2 {
                (config.fwd_channels[scales - 2] + config.fwd_channels[scales - 1]) * expansion
            } else {
                (config.back_channels[i + 1] + config.fwd_channels[i]) * expansion
            };

            let mut stage = Sequential::new();
            for j in 0..config.back_blocks[i] {
                let unit_in = if j == 0 { concat_in } else { width * expansion };
                stage = stage.add_boxed(unit::build_unit(
                    config.unit,
                    unit_in,
                    width,
                    1,
                    next_seed(),
                ));
            }
            back_stages.push(stage);
        }

        // The projection collapses the shallowest backward output (or,
        // for a single-scale pyramid, the forward output) to RGB.
        let proj_in = if scales == 1 {
            config.fwd_channels[0] * expansion
        } else {
            config.back_channels[0] * expansion
        };
        let final_proj = crate::nn::Conv2d::with_options(
            proj_in,
            IN_CHANNELS,
            (1, 1),
            (1, 1),
            (0, 0),
            false,
            next_seed(),
        );

        Ok(Self {
            config: config.clone(),
            fwd_stages,
            back_stages,
            scale_sizes,
            final_proj,
        })
    }

    /// The configuration this pyramid was built from.
    #[must_use]
    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    /// Spatial size of each scale, index 0 = full resolution.
    #[must_use]
    pub fn scale_sizes(&self) -> &[(usize, usize)] {
        &self.scale_sizes
    }
}

impl Module for Denoiser {
    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.ndim(),
            4,
            "Denoiser expects 4D input [N, C, H, W], got {}D",
            input.ndim()
        );
        assert_eq!(
            input.shape()[1],
            IN_CHANNELS,
            "Denoiser expects {} input channels, got {}",
            IN_CHANNELS,
            input.shape()[1]
        );
        assert_eq!(
            (input.shape()[2], input.shape()[3]),
            self.config.input_size,
            "Denoiser built for input size {:?}, got ({}, {})",
            self.config.input_size,
            input.shape()[2],
            input.shape()[3]
        );

        let scales = self.fwd_stages.len();

        // Downsampling pass, caching every scale's output but the last.
        let mut out = input.clone();
        let mut skips: Vec<Tensor> = Vec::with_capacity(scales - 1);
        for (i, stage) in self.fwd_stages.iter().enumerate() {
            out = stage.forward(&out);
            if i != scales - 1 {
                skips.push(out.clone());
            }
        }

        // Upsampling pass, draining the skip cache deepest-first.
        for i in (0..self.back_stages.len()).rev() {
            let skip = skips.pop().expect("skip cache holds one entry per fused scale");
            out = upsample_bilinear(&out, self.scale_sizes[i]);
            out = cat_channels(&[&out, &skip]);
            out = self
                .back_stages
                .get(i)
                .expect("backward stage per fused scale")
                .forward(&out);
        }
        debug_assert!(skips.is_empty(), "skip cache must be fully drained");

        // Single-scale pyramids have nothing to fuse; the resize to the
        // full resolution is a no-op by construction.
        if scales == 1 {
            out = upsample_bilinear(&out, self.scale_sizes[0]);
        }

        // Corrective residual: project to RGB and add the raw input.
        self.final_proj.forward(&out).add(input)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.fwd_stages.parameters();
        params.extend(self.back_stages.parameters());
        params.extend(self.final_proj.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.fwd_stages.parameters_mut();
        params.extend(self.back_stages.parameters_mut());
        params.extend(self.final_proj.parameters_mut());
        params
    }

    fn train(&mut self) {
        self.fwd_stages.train();
        self.back_stages.train();
    }

    fn eval(&mut self) {
        self.fwd_stages.eval();
        self.back_stages.eval();
    }

    fn training(&self) -> bool {
        self.fwd_stages.training()
    }
}

impl std::fmt::Debug for Denoiser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Denoiser")
            .field("scales", &self.fwd_stages.len())
            .field("unit", &self.config.unit)
            .field("input_size", &self.config.input_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(input_size: (usize, usize), unit: UnitKind) -> PyramidConfig {
        PyramidConfig {
            input_size,
            unit,
            fwd_channels: vec![2, 4],
            fwd_blocks: vec![1, 2],
            back_channels: vec![2],
            back_blocks: vec![1],
        }
    }

    #[test]
    fn test_output_shape_equals_input_even() {
        let denoiser =
            Denoiser::new(&small_config((8, 8), UnitKind::Bottleneck), Some(42)).expect("config");
        let x = Tensor::zeros(&[2, 3, 8, 8]);
        let y = denoiser.forward(&x);
        assert_eq!(y.shape(), x.shape());
    }

    #[test]
    fn test_output_shape_equals_input_odd() {
        let denoiser =
            Denoiser::new(&small_config((9, 7), UnitKind::Bottleneck), Some(42)).expect("config");
        let x = Tensor::zeros(&[1, 3, 9, 7]);
        let y = denoiser.forward(&x);
        assert_eq!(y.shape(), &[1, 3, 9, 7]);
    }

    #[test]
    fn test_plain_unit_pyramid() {
        let denoiser =
            Denoiser::new(&small_config((6, 6), UnitKind::Plain), Some(42)).expect("config");
        let x = Tensor::zeros(&[1, 3, 6, 6]);
        let y = denoiser.forward(&x);
        assert_eq!(y.shape(), x.shape());
    }

    #[test]
    fn test_single_scale_degenerates_to_plain_stack() {
        let config = PyramidConfig {
            input_size: (5, 5),
            unit: UnitKind::Bottleneck,
            fwd_channels: vec![2],
            fwd_blocks: vec![2],
            back_channels: vec![],
            back_blocks: vec![],
        };
        let denoiser = Denoiser::new(&config, Some(7)).expect("config");
        assert_eq!(denoiser.scale_sizes(), &[(5, 5)]);

        let x = Tensor::zeros(&[1, 3, 5, 5]);
        let y = denoiser.forward(&x);
        assert_eq!(y.shape(), x.shape());
    }

    #[test]
    fn test_three_scale_pyramid_odd_input() {
        let config = PyramidConfig {
            input_size: (11, 13),
            unit: UnitKind::Bottleneck,
            fwd_channels: vec![2, 2, 4],
            fwd_blocks: vec![1, 1, 1],
            back_channels: vec![2, 2],
            back_blocks: vec![1, 1],
        };
        let denoiser = Denoiser::new(&config, Some(3)).expect("config");
        // 11 -> 6 -> 3, 13 -> 7 -> 4
        assert_eq!(denoiser.scale_sizes(), &[(11, 13), (6, 7), (3, 4)]);

        let x = Tensor::zeros(&[1, 3, 11, 13]);
        let y = denoiser.forward(&x);
        assert_eq!(y.shape(), &[1, 3, 11, 13]);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = small_config((8, 8), UnitKind::Plain);
        config.back_channels = vec![2, 2];
        assert!(Denoiser::new(&config, None).is_err());
    }

    #[test]
    fn test_seeded_construction_reproducible() {
        let config = small_config((8, 8), UnitKind::Bottleneck);
        let a = Denoiser::new(&config, Some(77)).expect("config");
        let b = Denoiser::new(&config, Some(77)).expect("config");

        let data: Vec<f32> = (0..2 * 3 * 8 * 8).map(|i| ((i % 11) as f32) * 0.1).collect();
        let x = Tensor::new(&data, &[2, 3, 8, 8]);
        assert_eq!(a.forward(&x).data(), b.forward(&x).data());
    }

    #[test]
    fn test_denoiser_has_parameters() {
        let denoiser =
            Denoiser::new(&small_config((8, 8), UnitKind::Bottleneck), Some(1)).expect("config");
        assert!(!denoiser.parameters().is_empty());
    }

    #[test]
    #[should_panic(expected = "built for input size")]
    fn test_wrong_input_size_panics() {
        let denoiser =
            Denoiser::new(&small_config((8, 8), UnitKind::Plain), Some(1)).expect("config");
        let x = Tensor::zeros(&[1, 3, 16, 16]);
        let _ = denoiser.forward(&x);
    }
}
