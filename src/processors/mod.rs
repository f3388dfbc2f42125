//! Image and score processors.
//!
//! - [`normalization`]: per-variant pixel normalization policies
//! - [`preprocess`]: decoding, resizing and tensor conversion
//! - [`postprocess`]: softmax and argmax over raw scores

pub mod normalization;
pub mod postprocess;
pub mod preprocess;

pub use normalization::{NormalizationPolicy, NormalizeImage};
pub use postprocess::{Distribution, argmax, softmax};
pub use preprocess::ImagePreprocessor;
