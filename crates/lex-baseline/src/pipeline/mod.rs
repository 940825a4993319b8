//! Pipeline module.
//!
//! This module composes the transformers into the preprocessing pipeline and
//! attaches the classifier to it.

mod full;
mod preprocessing;

pub use full::FullPipeline;
pub use preprocessing::{Branch, InputColumn, PreprocessingPipeline};
