//! Checkpoint conversion into the transformers layout.

pub mod param_tree;
pub mod wav2vec2;

pub use param_tree::{ParamPath, ParameterTree, Segment};
