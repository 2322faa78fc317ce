//! Depurar: denoise-then-classify defense for adversarially robust
//! image classification, in pure Rust.
//!
//! An input image runs through a learned multi-scale denoising
//! encoder-decoder before a deep residual backbone classifies it, with
//! optional injected random noise for robustness; a fidelity loss
//! compares the clean signal path against adversarially perturbed
//! paths.
//!
//! # Quick Start
//!
//! ```ignore
//! use depurar::prelude::*;
//!
//! let config = PyramidConfig {
//!     input_size: (224, 224),
//!     unit: UnitKind::Bottleneck,
//!     fwd_channels: vec![32, 64, 128, 256, 256],
//!     fwd_blocks: vec![2, 3, 3, 3, 3],
//!     back_channels: vec![196, 128, 64, 32],
//!     back_blocks: vec![2, 2, 2, 2],
//! };
//! let denoiser = Denoiser::new(&config, Some(42))?;
//!
//! let net = DefendedClassifier::new(
//!     Box::new(my_backbone),
//!     Box::new(denoiser),
//!     1000,
//!     DefenseConfig { shrink: 1.0, noise: 0.1 },
//!     Some(42),
//! );
//! let pipeline = TrainingPipeline::new(
//!     net,
//!     MultiLevelLoss::with_options(1.0, 0.0, true)?,
//! );
//!
//! let out = pipeline.forward(&clean_batch, &adv_batch, true, true);
//! ```
//!
//! # Modules
//!
//! - [`autograd`]: tape-based reverse-mode automatic differentiation
//! - [`nn`]: generic building blocks (conv, batch norm, containers)
//! - [`denoise`]: the multi-scale denoising encoder-decoder
//! - [`defense`]: classifier wrapper, fidelity losses, training pipeline
//! - [`primitives`]: flat storage backing the tensors
//! - [`error`]: configuration error types

pub mod autograd;
pub mod defense;
pub mod denoise;
pub mod error;
pub mod nn;
pub mod prelude;
pub mod primitives;

pub use error::{DepurarError, Result};
