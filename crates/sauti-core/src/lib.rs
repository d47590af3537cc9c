//! Sauti Core - processor resolution and checkpoint conversion for speech
//! and multimodal models.
//!
//! Two facilities:
//! - [`AutoProcessor`] inspects a model repository (local directory or hub
//!   repo id) and builds the processor, tokenizer, image processor or
//!   feature extractor it declares.
//! - [`convert::wav2vec2`] remaps fairseq wav2vec2 checkpoints into the
//!   transformers parameter layout and writes a loadable model directory.
//!
//! # Example
//!
//! ```ignore
//! use sauti_core::{AutoProcessor, ResolveOptions};
//!
//! let processor = AutoProcessor::from_pretrained(
//!     "facebook/wav2vec2-base-960h",
//!     ResolveOptions::new().set("sampling_rate", 16000),
//! )?;
//! println!("{processor}");
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod hub;
pub mod processing;

pub use config::{HubConfig, ResolveOptions};
pub use error::{Error, Result};
pub use hub::{FileFetcher, HubFetcher};

pub use processing::auto::{
    AutoProcessor, DefaultTrustPolicy, DynamicModuleLoader, ProcessorClass, ProcessorFactory,
    ProcessorRegistry, ProcessorResolver, TrustPolicy, TrustRequest,
};
pub use processing::{
    Component, FeatureExtractor, ImageProcessor, LoadContext, Processor, Tokenizer,
    VideoProcessor,
};

pub use convert::wav2vec2::{convert_wav2vec2_checkpoint, ConversionReport, ConvertRequest};
