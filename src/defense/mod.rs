//! Denoise-then-classify defense: classifier wrapper, fidelity losses
//! and the training-time composition.
//!
//! The [`DefendedClassifier`] puts a purifier and optional injected
//! noise in front of an externally supplied [`Backbone`];
//! [`TrainingPipeline`] runs the clean / control / defended passes and
//! scores them with [`MultiLevelLoss`].
//!
//! # References
//!
//! - Liao, F., et al. (2018). Defense against adversarial attacks using
//!   high-level representation guided denoiser. CVPR.

mod classifier;
mod loss;
mod pipeline;

pub use classifier::{Backbone, DefendedClassifier, DefenseConfig};
pub use loss::{FidelityLoss, MultiLevelLoss};
pub use pipeline::{ControlOutput, PipelineOutput, TrainingPipeline};
