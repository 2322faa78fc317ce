//! Neural network building blocks.
//!
//! Organized around the [`Module`] trait, which defines the interface
//! for all layers:
//!
//! - **Layers**: [`Conv2d`], [`Linear`]
//! - **Pooling**: [`GlobalAvgPool2d`]
//! - **Activations**: [`ReLU`]
//! - **Normalization**: [`BatchNorm2d`]
//! - **Containers**: [`Sequential`], [`ModuleList`]
//! - **Functional**: [`functional`] (bilinear resize, channel concat)
//!
//! # Example
//!
//! ```ignore
//! use depurar::nn::{BatchNorm2d, Conv2d, Module, ReLU, Sequential};
//! use depurar::autograd::Tensor;
//!
//! let stem = Sequential::new()
//!     .add(Conv2d::with_options(3, 16, (3, 3), (1, 1), (1, 1), false, Some(7)))
//!     .add(BatchNorm2d::new(16))
//!     .add(ReLU::new());
//!
//! let x = Tensor::zeros(&[2, 3, 32, 32]);
//! let y = stem.forward(&x);  // [2, 16, 32, 32]
//! ```
//!
//! # References
//!
//! - Paszke, A., et al. (2019). `PyTorch`: An imperative style,
//!   high-performance deep learning library. `NeurIPS`.
//! - He, K., et al. (2015). Delving deep into rectifiers. ICCV.

mod activation;
mod container;
mod conv;
pub mod functional;
mod im2col;
pub mod init;
mod linear;
mod module;
mod normalization;

pub use activation::ReLU;
pub use container::{ModuleList, Sequential};
pub use conv::{Conv2d, GlobalAvgPool2d};
pub use functional as F;
pub use linear::Linear;
pub use module::Module;
pub use normalization::BatchNorm2d;
