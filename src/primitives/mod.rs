//! Core compute primitives.
//!
//! `Vector` is the flat contiguous storage that backs [`crate::autograd::Tensor`].

mod vector;

pub use vector::Vector;
