//! Error types for sauti-core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model load error: {0}")]
    ModelLoadError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tokenization error: {0}")]
    TokenizationError(String),

    #[error("HuggingFace Hub error: {0}")]
    HfHubError(String),

    #[error(
        "Unrecognized processing class in {identifier}. Can't instantiate a processor, a tokenizer, \
         an image processor or a feature extractor for this model. Make sure the repository \
         contains the files of at least one of those processing classes."
    )]
    UnrecognizedProcessor { identifier: String },

    #[error("Shape of {name} is {expected:?}, but should be {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("{class_name} requires the {dependency} backend, which is not available in this build")]
    MissingDependency {
        class_name: String,
        dependency: String,
    },

    #[error(
        "The repository {identifier} contains custom code which must be executed to load its \
         processor. Pass trust_remote_code=true to allow it."
    )]
    UntrustedRemoteCode { identifier: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),
}

impl Error {
    pub fn shape_mismatch(name: impl Into<String>, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            name: name.into(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
