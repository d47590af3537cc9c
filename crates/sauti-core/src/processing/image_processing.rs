//! Image and video processor configuration.
//!
//! Only the configuration surface is modelled here: declared type, resize and
//! normalization settings, plus every other key passed through as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use super::names::{IMAGE_PROCESSOR_NAME, VIDEO_PROCESSOR_NAME};
use super::overrides::apply_overrides;
use super::{read_json_file, write_json_file, LoadContext};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProcessor {
    #[serde(default)]
    pub image_processor_type: Option<String>,
    #[serde(default)]
    pub do_resize: Option<bool>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub do_rescale: Option<bool>,
    #[serde(default)]
    pub rescale_factor: Option<f64>,
    #[serde(default)]
    pub do_normalize: Option<bool>,
    #[serde(default)]
    pub image_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub image_std: Option<Vec<f64>>,
    #[serde(default)]
    pub processor_class: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageProcessor {
    pub fn from_file(path: &Path) -> Result<Self> {
        read_json_file(path)
    }

    pub fn from_pretrained(ctx: &LoadContext<'_>, overrides: &mut Map<String, Value>) -> Result<Self> {
        let path = ctx.require(IMAGE_PROCESSOR_NAME)?;
        let processor = Self::from_file(&path)?;
        debug!("Loaded image processor from {:?}", path);
        apply_overrides(processor, overrides)
    }

    /// Loads only when the config declares what kind of image processor it is.
    ///
    /// Legacy configs that name a vision `*FeatureExtractor` are accepted and
    /// renamed to the matching `*ImageProcessor`.
    pub fn from_pretrained_declared(
        ctx: &LoadContext<'_>,
        overrides: &mut Map<String, Value>,
    ) -> Result<Self> {
        let mut processor = Self::from_pretrained(ctx, overrides)?;
        if processor.image_processor_type.is_none() {
            let legacy = processor
                .extra
                .get("feature_extractor_type")
                .and_then(Value::as_str)
                .filter(|name| is_vision_feature_extractor(name))
                .map(|name| name.replace("FeatureExtractor", "ImageProcessor"));
            processor.image_processor_type = legacy;
        }
        if processor.image_processor_type.is_none() {
            return Err(Error::ConfigError(format!(
                "{IMAGE_PROCESSOR_NAME} in {} does not declare an image_processor_type",
                ctx.identifier
            )));
        }
        Ok(processor)
    }

    pub fn save_pretrained(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        write_json_file(&dir.join(IMAGE_PROCESSOR_NAME), self)
    }
}

// Audio extractors also live in preprocessor_config.json and must not be
// mistaken for image processors.
fn is_vision_feature_extractor(name: &str) -> bool {
    const AUDIO_MARKERS: [&str; 6] = ["Wav2Vec2", "Whisper", "Speech", "Audio", "Clap", "Seamless"];
    name.ends_with("FeatureExtractor") && !AUDIO_MARKERS.iter().any(|m| name.contains(m))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProcessor {
    #[serde(default)]
    pub video_processor_type: Option<String>,
    #[serde(default)]
    pub do_resize: Option<bool>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub do_sample_frames: Option<bool>,
    #[serde(default)]
    pub num_frames: Option<usize>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub do_normalize: Option<bool>,
    #[serde(default)]
    pub image_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub image_std: Option<Vec<f64>>,
    #[serde(default)]
    pub processor_class: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VideoProcessor {
    pub fn from_file(path: &Path) -> Result<Self> {
        read_json_file(path)
    }

    /// Reads `video_preprocessor_config.json`, or the shared
    /// `preprocessor_config.json` for repositories saved before video
    /// processors had their own file.
    pub fn from_pretrained(ctx: &LoadContext<'_>, overrides: &mut Map<String, Value>) -> Result<Self> {
        let path = match ctx.fetch(VIDEO_PROCESSOR_NAME)? {
            Some(path) => path,
            None => ctx.require(IMAGE_PROCESSOR_NAME)?,
        };
        let processor = Self::from_file(&path)?;
        debug!("Loaded video processor from {:?}", path);
        apply_overrides(processor, overrides)
    }

    pub fn save_pretrained(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        write_json_file(&dir.join(VIDEO_PROCESSOR_NAME), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clip_style_config() {
        let json = r#"{
            "image_processor_type": "CLIPImageProcessor",
            "crop_size": {"height": 224, "width": 224},
            "do_resize": true,
            "image_mean": [0.48145466, 0.4578275, 0.40821073],
            "image_std": [0.26862954, 0.26130258, 0.27577711],
            "size": {"shortest_edge": 224}
        }"#;
        let ip: ImageProcessor = serde_json::from_str(json).unwrap();
        assert_eq!(ip.image_processor_type.as_deref(), Some("CLIPImageProcessor"));
        assert_eq!(ip.image_mean.as_ref().map(Vec::len), Some(3));
        assert!(ip.extra.contains_key("crop_size"));
    }

    #[test]
    fn audio_extractors_are_not_vision() {
        assert!(!is_vision_feature_extractor("Wav2Vec2FeatureExtractor"));
        assert!(!is_vision_feature_extractor("WhisperFeatureExtractor"));
        assert!(is_vision_feature_extractor("CLIPFeatureExtractor"));
    }
}
