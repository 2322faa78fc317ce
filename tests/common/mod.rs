//! Shared fixtures for integration tests.
#![allow(dead_code)]

use depurar::autograd::Tensor;
use depurar::defense::Backbone;
use depurar::nn::{Conv2d, Module};

/// Minimal strided-conv feature extractor standing in for the real
/// pretrained backbone. Consumes `[N, 3, H, W]`, produces
/// `[N, 8, ceil(H/2), ceil(W/2)]`.
pub struct TinyBackbone {
    conv: Conv2d,
}

impl TinyBackbone {
    pub fn new(seed: u64) -> Self {
        Self {
            conv: Conv2d::with_options(3, 8, (3, 3), (2, 2), (1, 1), false, Some(seed)),
        }
    }
}

impl Backbone for TinyBackbone {
    fn features(&self, input: &Tensor) -> Tensor {
        self.conv.forward(input)
    }

    fn feature_channels(&self) -> usize {
        8
    }
}

/// Deterministic pseudo-image batch with values in roughly [-1, 1].
pub fn image_batch(batch: usize, h: usize, w: usize) -> Tensor {
    let numel = batch * 3 * h * w;
    let data: Vec<f32> = (0..numel)
        .map(|i| (((i * 37 + 11) % 101) as f32) / 50.0 - 1.0)
        .collect();
    Tensor::new(&data, &[batch, 3, h, w])
}
