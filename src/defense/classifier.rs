//! Backbone seam and the defended classifier wrapper.

use std::cell::RefCell;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::autograd::Tensor;
use crate::nn::{GlobalAvgPool2d, Linear, Module};

/// Deep feature extractor supplied by the caller.
///
/// The wrapper treats it as a black box: a `[N, 3, H, W]` image batch
/// in, a `[N, C, H', W']` feature map out, with `C`, `H'`, `W'` chosen
/// by the extractor. [`Backbone::feature_channels`] reports `C` so the
/// classification head can be sized.
pub trait Backbone {
    /// Extract a feature map from a 3-channel image batch.
    fn features(&self, input: &Tensor) -> Tensor;

    /// Channel count of the produced feature map.
    fn feature_channels(&self) -> usize;

    /// Switch to training mode (no-op by default).
    fn train(&mut self) {}

    /// Switch to evaluation mode (no-op by default).
    fn eval(&mut self) {}
}

/// Defense-mode parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefenseConfig {
    /// Scale applied to the purifier output before classification.
    pub shrink: f32,
    /// Magnitude of the injected uniform noise; the per-element support
    /// is `[-0.5, 0.5] * noise`. Zero disables injection.
    pub noise: f32,
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            shrink: 1.0,
            noise: 0.0,
        }
    }
}

/// Classifier with a denoising defense in front of it.
///
/// Composes a purifier (usually a [`crate::denoise::Denoiser`], or a
/// [`crate::denoise::PassThrough`] to run undefended), an externally
/// supplied [`Backbone`], global average pooling and a linear head.
///
/// With defense enabled, the input is replaced by
/// `shrink * purifier(x) + r`, where `r` is uniform noise drawn from
/// the constructor-injected seedable source. The noise tensor is
/// created as a plain leaf outside gradient tracking; randomness never
/// enters the differentiable parameter set.
///
/// Every forward returns the same ordered triple:
/// `[defended-or-raw input, pre-pool backbone feature, logits]`.
pub struct DefendedClassifier {
    backbone: Box<dyn Backbone>,
    purifier: Box<dyn Module>,
    pool: GlobalAvgPool2d,
    head: Linear,
    shrink: f32,
    noise: f32,
    rng: RefCell<StdRng>,
}

impl DefendedClassifier {
    /// Create a new defended classifier.
    ///
    /// # Arguments
    ///
    /// * `backbone` - External feature extractor
    /// * `purifier` - Denoising network applied in defense mode
    /// * `num_classes` - Output dimension of the linear head
    /// * `config` - Shrink factor and noise magnitude
    /// * `seed` - Optional seed for the head init and the noise source
    #[must_use]
    pub fn new(
        backbone: Box<dyn Backbone>,
        purifier: Box<dyn Module>,
        num_classes: usize,
        config: DefenseConfig,
        seed: Option<u64>,
    ) -> Self {
        let head = Linear::new(backbone.feature_channels(), num_classes, seed);
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };

        Self {
            backbone,
            purifier,
            pool: GlobalAvgPool2d::new(),
            head,
            shrink: config.shrink,
            noise: config.noise,
            rng: RefCell::new(rng),
        }
    }

    /// The purifier module in front of the backbone.
    #[must_use]
    pub fn purifier(&self) -> &dyn Module {
        self.purifier.as_ref()
    }

    /// Number of classes the head scores.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.head.out_features()
    }

    /// Run the network.
    ///
    /// With `defense` off, the raw input goes straight to the backbone.
    /// With `defense` on, the input is purified, shrunk and (when the
    /// configured magnitude is nonzero) perturbed with fresh uniform
    /// noise before the backbone sees it.
    ///
    /// Returns `[defended-or-raw input, pre-pool feature map, logits]`.
    #[must_use]
    pub fn forward(&self, input: &Tensor, defense: bool) -> [Tensor; 3] {
        let x = if defense {
            let purified = self.purifier.forward(input).mul_scalar(self.shrink);
            if self.noise != 0.0 {
                purified.add(&self.sample_noise(purified.shape()))
            } else {
                purified
            }
        } else {
            input.clone()
        };

        let feature = self.backbone.features(&x);
        let pooled = self.pool.forward(&feature);
        let logits = self.head.forward(&pooled);

        [x, feature, logits]
    }

    /// Draw a mean-zero uniform noise leaf with support
    /// `[-0.5, 0.5] * noise`, untracked by the tape.
    fn sample_noise(&self, shape: &[usize]) -> Tensor {
        let numel: usize = shape.iter().product();
        let mut rng = self.rng.borrow_mut();
        let data: Vec<f32> = (0..numel)
            .map(|_| self.noise * (rng.gen::<f32>() - 0.5))
            .collect();
        Tensor::new(&data, shape)
    }

    /// Switch purifier and backbone to training mode.
    pub fn train(&mut self) {
        self.purifier.train();
        self.backbone.train();
    }

    /// Switch purifier and backbone to evaluation mode.
    pub fn eval(&mut self) {
        self.purifier.eval();
        self.backbone.eval();
    }
}

impl std::fmt::Debug for DefendedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefendedClassifier")
            .field("num_classes", &self.head.out_features())
            .field("shrink", &self.shrink)
            .field("noise", &self.noise)
            .finish_non_exhaustive()
    }
}
