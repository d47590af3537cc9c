//! Processing components: tokenizers, feature extractors, image and video
//! processors, and the composite processors that bundle them.

pub mod auto;
pub mod feature_extraction;
pub mod image_processing;
pub mod names;
pub mod overrides;
pub mod processor;
pub mod tokenizer;

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::config::ResolveOptions;
use crate::error::{Error, Result};
use crate::hub::FileFetcher;

pub use feature_extraction::FeatureExtractor;
pub use image_processing::{ImageProcessor, VideoProcessor};
pub use processor::{Component, Processor};
pub use tokenizer::Tokenizer;

/// Where a component is being loaded from.
#[derive(Clone, Copy)]
pub struct LoadContext<'a> {
    pub fetcher: &'a dyn FileFetcher,
    pub identifier: &'a str,
    pub options: &'a ResolveOptions,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        fetcher: &'a dyn FileFetcher,
        identifier: &'a str,
        options: &'a ResolveOptions,
    ) -> Self {
        Self {
            fetcher,
            identifier,
            options,
        }
    }

    pub fn fetch(&self, filename: &str) -> Result<Option<PathBuf>> {
        self.fetcher
            .cached_file(self.identifier, filename, self.options)
    }

    pub fn require(&self, filename: &str) -> Result<PathBuf> {
        self.fetch(filename)?.ok_or_else(|| {
            Error::ModelNotFound(format!(
                "{} does not appear to have a file named {}",
                self.identifier, filename
            ))
        })
    }

    /// Reads and parses a JSON file; a present but malformed file is an error.
    pub fn read_json<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        match self.fetch(filename)? {
            Some(path) => read_json_file(&path).map(Some),
            None => Ok(None),
        }
    }
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(Error::from)
}

pub(crate) fn write_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    std::fs::write(path, data + "\n")?;
    Ok(())
}
