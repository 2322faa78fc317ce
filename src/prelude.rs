//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use depurar::prelude::*;
//! ```

pub use crate::autograd::{no_grad, Tensor};
pub use crate::defense::{
    Backbone, DefendedClassifier, DefenseConfig, FidelityLoss, MultiLevelLoss, PipelineOutput,
    TrainingPipeline,
};
pub use crate::denoise::{Denoiser, PassThrough, PyramidConfig, UnitKind};
pub use crate::error::{DepurarError, Result};
pub use crate::nn::Module;
