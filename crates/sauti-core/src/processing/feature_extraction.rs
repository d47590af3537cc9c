//! Audio feature extractor configuration (`preprocessor_config.json`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use super::names::FEATURE_EXTRACTOR_NAME;
use super::overrides::apply_overrides;
use super::{read_json_file, write_json_file, LoadContext};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExtractor {
    #[serde(default)]
    pub feature_extractor_type: Option<String>,
    #[serde(default = "default_feature_size")]
    pub feature_size: usize,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    #[serde(default)]
    pub padding_value: f32,
    #[serde(default = "default_padding_side")]
    pub padding_side: String,
    #[serde(default)]
    pub do_normalize: bool,
    #[serde(default)]
    pub return_attention_mask: bool,
    #[serde(default)]
    pub processor_class: Option<String>,
    /// Model-specific settings this crate passes through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_feature_size() -> usize {
    1
}

fn default_sampling_rate() -> u32 {
    16_000
}

fn default_padding_side() -> String {
    "right".to_string()
}

/// Output of [`FeatureExtractor::pad`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub input_values: Vec<Vec<f32>>,
    pub attention_mask: Option<Vec<Vec<u32>>>,
}

impl FeatureExtractor {
    /// The raw-waveform extractor used by wav2vec2 checkpoints.
    pub fn wav2vec2(return_attention_mask: bool) -> Self {
        Self {
            feature_extractor_type: Some("Wav2Vec2FeatureExtractor".to_string()),
            feature_size: 1,
            sampling_rate: 16_000,
            padding_value: 0.0,
            padding_side: default_padding_side(),
            do_normalize: true,
            return_attention_mask,
            processor_class: None,
            extra: Map::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        read_json_file(path)
    }

    pub fn from_pretrained(ctx: &LoadContext<'_>, overrides: &mut Map<String, Value>) -> Result<Self> {
        let path = ctx.require(FEATURE_EXTRACTOR_NAME)?;
        let extractor = Self::from_file(&path)?;
        debug!("Loaded feature extractor from {:?}", path);
        apply_overrides(extractor, overrides)
    }

    /// Loads only when the config declares a `feature_extractor_type`.
    pub fn from_pretrained_declared(
        ctx: &LoadContext<'_>,
        overrides: &mut Map<String, Value>,
    ) -> Result<Self> {
        let extractor = Self::from_pretrained(ctx, overrides)?;
        if extractor.feature_extractor_type.is_none() {
            return Err(Error::ConfigError(format!(
                "{FEATURE_EXTRACTOR_NAME} in {} does not declare a feature_extractor_type",
                ctx.identifier
            )));
        }
        Ok(extractor)
    }

    pub fn save_pretrained(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        write_json_file(&dir.join(FEATURE_EXTRACTOR_NAME), self)
    }

    /// Zero-mean, unit-variance normalization of a single waveform.
    pub fn normalize(&self, samples: &[f32]) -> Vec<f32> {
        if !self.do_normalize || samples.is_empty() {
            return samples.to_vec();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let var = samples
            .iter()
            .map(|&s| {
                let d = s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let denom = (var + 1e-7).sqrt();
        samples
            .iter()
            .map(|&s| ((s as f64 - mean) / denom) as f32)
            .collect()
    }

    /// Normalizes each waveform, then pads the batch to its longest member.
    pub fn pad(&self, batch: &[Vec<f32>]) -> PaddedBatch {
        let longest = batch.iter().map(Vec::len).max().unwrap_or(0);
        let left = self.padding_side == "left";

        let mut input_values = Vec::with_capacity(batch.len());
        let mut masks = Vec::with_capacity(batch.len());
        for samples in batch {
            let normalized = self.normalize(samples);
            let missing = longest - normalized.len();
            let fill = std::iter::repeat(self.padding_value).take(missing);
            let zeros = std::iter::repeat(0u32).take(missing);
            let ones = std::iter::repeat(1u32).take(normalized.len());

            if left {
                input_values.push(fill.chain(normalized).collect());
                masks.push(zeros.chain(ones).collect());
            } else {
                input_values.push(normalized.into_iter().chain(fill).collect());
                masks.push(ones.chain(zeros).collect());
            }
        }

        PaddedBatch {
            input_values,
            attention_mask: self.return_attention_mask.then_some(masks),
        }
    }
}
