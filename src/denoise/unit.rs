//! Residual units that make up the pyramid stages.

use crate::autograd::Tensor;
use crate::nn::{BatchNorm2d, Conv2d, Module};

use super::config::UnitKind;

fn subseed(seed: Option<u64>, offset: u64) -> Option<u64> {
    seed.map(|s| s.wrapping_add(offset))
}

/// Build a residual unit of the requested kind.
pub(crate) fn build_unit(
    kind: UnitKind,
    n_in: usize,
    n_out: usize,
    stride: usize,
    seed: Option<u64>,
) -> Box<dyn Module> {
    match kind {
        UnitKind::Plain => Box::new(ConvUnit::new(n_in, n_out, stride, seed)),
        UnitKind::Bottleneck => Box::new(BottleneckUnit::new(n_in, n_out, stride, seed)),
    }
}

/// Basic convolution unit: 3×3 conv (same padding, no bias) + batch
/// norm + `ReLU`.
///
/// The norm layer absorbs the bias; its running statistics are the only
/// cross-call state.
///
/// # Shape
///
/// - Input: `(N, n_in, H, W)`
/// - Output: `(N, n_out, ceil(H / stride), ceil(W / stride))`
#[derive(Debug)]
pub struct ConvUnit {
    conv: Conv2d,
    bn: BatchNorm2d,
}

impl ConvUnit {
    /// Create a new conv unit.
    #[must_use]
    pub fn new(n_in: usize, n_out: usize, stride: usize, seed: Option<u64>) -> Self {
        Self {
            conv: Conv2d::with_options(n_in, n_out, (3, 3), (stride, stride), (1, 1), false, seed),
            bn: BatchNorm2d::new(n_out),
        }
    }
}

impl Module for ConvUnit {
    fn forward(&self, input: &Tensor) -> Tensor {
        self.bn.forward(&self.conv.forward(input)).relu()
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.conv.parameters();
        params.extend(self.bn.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.conv.parameters_mut();
        params.extend(self.bn.parameters_mut());
        params
    }

    fn train(&mut self) {
        self.bn.train();
    }

    fn eval(&mut self) {
        self.bn.eval();
    }

    fn training(&self) -> bool {
        self.bn.training()
    }
}

/// Residual bottleneck unit.
///
/// 1×1 reduce → norm → relu → 3×3 spatial (stride) → norm → relu →
/// 1×1 expand to `n_out * EXPANSION` → norm, then a shortcut sum and a
/// final relu. The shortcut is the identity when the unit changes
/// neither resolution nor width, and a projected 1×1 conv + norm
/// otherwise.
///
/// # Shape
///
/// - Input: `(N, n_in, H, W)`
/// - Output: `(N, n_out * 4, ceil(H / stride), ceil(W / stride))`
#[derive(Debug)]
pub struct BottleneckUnit {
    conv1: Conv2d,
    bn1: BatchNorm2d,
    conv2: Conv2d,
    bn2: BatchNorm2d,
    conv3: Conv2d,
    bn3: BatchNorm2d,
    shortcut: Option<(Conv2d, BatchNorm2d)>,
}

impl BottleneckUnit {
    /// Channel expansion applied by the final 1×1 conv.
    pub const EXPANSION: usize = 4;

    /// Create a new bottleneck unit.
    #[must_use]
    pub fn new(n_in: usize, n_out: usize, stride: usize, seed: Option<u64>) -> Self {
        let expanded = n_out * Self::EXPANSION;

        let shortcut = if stride != 1 || n_in != expanded {
            Some((
                Conv2d::with_options(
                    n_in,
                    expanded,
                    (1, 1),
                    (stride, stride),
                    (0, 0),
                    false,
                    subseed(seed, 3),
                ),
                BatchNorm2d::new(expanded),
            ))
        } else {
            None
        };

        Self {
            conv1: Conv2d::with_options(n_in, n_out, (1, 1), (1, 1), (0, 0), false, seed),
            bn1: BatchNorm2d::new(n_out),
            conv2: Conv2d::with_options(
                n_out,
                n_out,
                (3, 3),
                (stride, stride),
                (1, 1),
                false,
                subseed(seed, 1),
            ),
            bn2: BatchNorm2d::new(n_out),
            conv3: Conv2d::with_options(
                n_out,
                expanded,
                (1, 1),
                (1, 1),
                (0, 0),
                false,
                subseed(seed, 2),
            ),
            bn3: BatchNorm2d::new(expanded),
            shortcut,
        }
    }
}

impl Module for BottleneckUnit {
    fn forward(&self, input: &Tensor) -> Tensor {
        let out = self.bn1.forward(&self.conv1.forward(input)).relu();
        let out = self.bn2.forward(&self.conv2.forward(&out)).relu();
        let out = self.bn3.forward(&self.conv3.forward(&out));

        let residual = match &self.shortcut {
            Some((conv, bn)) => bn.forward(&conv.forward(input)),
            None => input.clone(),
        };

        out.add(&residual).relu()
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::new();
        params.extend(self.conv1.parameters());
        params.extend(self.bn1.parameters());
        params.extend(self.conv2.parameters());
        params.extend(self.bn2.parameters());
        params.extend(self.conv3.parameters());
        params.extend(self.bn3.parameters());
        if let Some((conv, bn)) = &self.shortcut {
            params.extend(conv.parameters());
            params.extend(bn.parameters());
        }
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = Vec::new();
        params.extend(self.conv1.parameters_mut());
        params.extend(self.bn1.parameters_mut());
        params.extend(self.conv2.parameters_mut());
        params.extend(self.bn2.parameters_mut());
        params.extend(self.conv3.parameters_mut());
        params.extend(self.bn3.parameters_mut());
        if let Some((conv, bn)) = &mut self.shortcut {
            params.extend(conv.parameters_mut());
            params.extend(bn.parameters_mut());
        }
        params
    }

    fn train(&mut self) {
        self.bn1.train();
        self.bn2.train();
        self.bn3.train();
        if let Some((_, bn)) = &mut self.shortcut {
            bn.train();
        }
    }

    fn eval(&mut self) {
        self.bn1.eval();
        self.bn2.eval();
        self.bn3.eval();
        if let Some((_, bn)) = &mut self.shortcut {
            bn.eval();
        }
    }

    fn training(&self) -> bool {
        self.bn1.training()
    }
}

/// Identity pass-through unit.
///
/// A no-op placeholder for pipeline slots that can be configured empty,
/// e.g. running the classifier wrapper with no purifier in front of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl PassThrough {
    /// Create a new pass-through unit.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Module for PassThrough {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.clone()
    }
}
