//! Composite processors bundling a tokenizer with audio, image or video
//! components.

use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use super::names::PROCESSOR_NAME;
use super::{
    read_json_file, write_json_file, FeatureExtractor, ImageProcessor, LoadContext, Tokenizer,
    VideoProcessor,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Tokenizer,
    FeatureExtractor,
    ImageProcessor,
    VideoProcessor,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Tokenizer => "tokenizer",
            Component::FeatureExtractor => "feature_extractor",
            Component::ImageProcessor => "image_processor",
            Component::VideoProcessor => "video_processor",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Processor {
    pub class_name: String,
    pub tokenizer: Option<Tokenizer>,
    pub feature_extractor: Option<FeatureExtractor>,
    pub image_processor: Option<ImageProcessor>,
    pub video_processor: Option<VideoProcessor>,
    /// Processor-level settings from `processor_config.json`
    pub attributes: Map<String, Value>,
}

impl Processor {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            tokenizer: None,
            feature_extractor: None,
            image_processor: None,
            video_processor: None,
            attributes: Map::new(),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_feature_extractor(mut self, extractor: FeatureExtractor) -> Self {
        self.feature_extractor = Some(extractor);
        self
    }

    pub fn with_image_processor(mut self, processor: ImageProcessor) -> Self {
        self.image_processor = Some(processor);
        self
    }

    pub fn with_video_processor(mut self, processor: VideoProcessor) -> Self {
        self.video_processor = Some(processor);
        self
    }

    /// Loads every listed component from the repository in `ctx`.
    ///
    /// Overrides are offered to the processor attributes first, then to each
    /// component in order; consumed keys are removed.
    pub fn from_pretrained(
        class_name: &str,
        components: &[Component],
        ctx: &LoadContext<'_>,
        overrides: &mut Map<String, Value>,
    ) -> Result<Self> {
        let mut processor = Self::new(class_name);

        if let Some(path) = ctx.fetch(PROCESSOR_NAME)? {
            let mut attributes: Map<String, Value> = match read_json_file(&path) {
                Ok(attributes) => attributes,
                Err(e) => {
                    warn!("Ignoring malformed {PROCESSOR_NAME} of {}: {e}", ctx.identifier);
                    Map::new()
                }
            };
            attributes.remove("processor_class");
            attributes.remove("auto_map");
            for (key, value) in attributes.iter_mut() {
                if let Some(new_value) = overrides.remove(key) {
                    *value = new_value;
                }
            }
            processor.attributes = attributes;
        }

        for component in components {
            match component {
                Component::Tokenizer => {
                    processor.tokenizer = Some(Tokenizer::from_pretrained(ctx, overrides)?);
                }
                Component::FeatureExtractor => {
                    processor.feature_extractor =
                        Some(FeatureExtractor::from_pretrained(ctx, overrides)?);
                }
                Component::ImageProcessor => {
                    processor.image_processor =
                        Some(ImageProcessor::from_pretrained(ctx, overrides)?);
                }
                Component::VideoProcessor => {
                    processor.video_processor =
                        Some(VideoProcessor::from_pretrained(ctx, overrides)?);
                }
            }
        }

        debug!(
            "Loaded {class_name} with components {:?}",
            processor.components()
        );
        Ok(processor)
    }

    pub fn components(&self) -> Vec<Component> {
        let mut present = Vec::new();
        if self.tokenizer.is_some() {
            present.push(Component::Tokenizer);
        }
        if self.feature_extractor.is_some() {
            present.push(Component::FeatureExtractor);
        }
        if self.image_processor.is_some() {
            present.push(Component::ImageProcessor);
        }
        if self.video_processor.is_some() {
            present.push(Component::VideoProcessor);
        }
        present
    }

    /// Writes every component, tagged with this processor's class, into `dir`.
    pub fn save_pretrained(&mut self, dir: &Path) -> Result<()> {
        if self.components().is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} has no components to save",
                self.class_name
            )));
        }
        std::fs::create_dir_all(dir)?;
        let class_name = Some(self.class_name.clone());

        if let Some(tokenizer) = self.tokenizer.as_mut() {
            tokenizer.set_processor_class(&self.class_name);
            tokenizer.save_pretrained(dir)?;
        }
        if let Some(extractor) = self.feature_extractor.as_mut() {
            extractor.processor_class = class_name.clone();
            extractor.save_pretrained(dir)?;
        }
        // Image processors share preprocessor_config.json with feature
        // extractors; a processor carrying both keeps the audio one.
        if let Some(image) = self.image_processor.as_mut() {
            image.processor_class = class_name.clone();
            if self.feature_extractor.is_none() {
                image.save_pretrained(dir)?;
            }
        }
        if let Some(video) = self.video_processor.as_mut() {
            video.processor_class = class_name.clone();
            video.save_pretrained(dir)?;
        }

        if !self.attributes.is_empty() {
            let mut config = self.attributes.clone();
            config.insert(
                "processor_class".to_string(),
                Value::String(self.class_name.clone()),
            );
            write_json_file(&dir.join(PROCESSOR_NAME), &config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolveOptions;
    use crate::hub::HubFetcher;
    use crate::processing::names::FEATURE_EXTRACTOR_NAME;

    #[test]
    fn save_tags_components_with_class() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor =
            Processor::new("Wav2Vec2Processor").with_feature_extractor(FeatureExtractor::wav2vec2(true));
        processor.save_pretrained(dir.path()).unwrap();

        let saved: Map<String, Value> =
            read_json_file(&dir.path().join(FEATURE_EXTRACTOR_NAME)).unwrap();
        assert_eq!(saved["processor_class"], "Wav2Vec2Processor");
        assert!(!dir.path().join(PROCESSOR_NAME).exists());
    }

    #[test]
    fn empty_processor_refuses_to_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor = Processor::new("Wav2Vec2Processor");
        assert!(processor.save_pretrained(dir.path()).is_err());
    }

    #[test]
    fn load_consumes_matching_overrides() {
        let dir = tempfile::tempdir().unwrap();
        FeatureExtractor::wav2vec2(false)
            .save_pretrained(dir.path())
            .unwrap();

        let fetcher = HubFetcher::default();
        let opts = ResolveOptions::default();
        let id = dir.path().to_str().unwrap();
        let ctx = LoadContext::new(&fetcher, id, &opts);

        let mut overrides = Map::new();
        overrides.insert("sampling_rate".to_string(), Value::from(8000));
        overrides.insert("not_an_attribute".to_string(), Value::from(true));

        let processor = Processor::from_pretrained(
            "Wav2Vec2Processor",
            &[Component::FeatureExtractor],
            &ctx,
            &mut overrides,
        )
        .unwrap();

        let fe = processor.feature_extractor.unwrap();
        assert_eq!(fe.sampling_rate, 8000);
        assert!(overrides.contains_key("not_an_attribute"));
        assert!(!overrides.contains_key("sampling_rate"));
    }
}
