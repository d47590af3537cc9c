//! Locating the declared processor class inside a model repository.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::processing::names::{
    CONFIG_NAME, FEATURE_EXTRACTOR_NAME, IMAGE_PROCESSOR_NAME, PROCESSOR_NAME,
    TOKENIZER_CONFIG_FILE, VIDEO_PROCESSOR_NAME,
};
use crate::processing::{read_json_file, LoadContext};

/// A configuration file consulted while looking for a processor class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigProbe {
    Processor,
    ImageProcessor,
    VideoProcessor,
    FeatureExtractor,
    Tokenizer,
    ModelConfig,
}

pub const PROBE_ORDER: [ConfigProbe; 6] = [
    ConfigProbe::Processor,
    ConfigProbe::ImageProcessor,
    ConfigProbe::VideoProcessor,
    ConfigProbe::FeatureExtractor,
    ConfigProbe::Tokenizer,
    ConfigProbe::ModelConfig,
];

impl ConfigProbe {
    pub fn filename(&self) -> &'static str {
        match self {
            ConfigProbe::Processor => PROCESSOR_NAME,
            ConfigProbe::ImageProcessor => IMAGE_PROCESSOR_NAME,
            ConfigProbe::VideoProcessor => VIDEO_PROCESSOR_NAME,
            ConfigProbe::FeatureExtractor => FEATURE_EXTRACTOR_NAME,
            ConfigProbe::Tokenizer => TOKENIZER_CONFIG_FILE,
            ConfigProbe::ModelConfig => CONFIG_NAME,
        }
    }

    /// Tokenizer and model configs must parse; the others are skipped when malformed.
    fn tolerates_malformed(&self) -> bool {
        !matches!(self, ConfigProbe::Tokenizer | ConfigProbe::ModelConfig)
    }
}

/// What the repository declares about its processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredProcessor {
    pub class_name: Option<String>,
    /// `auto_map.AutoProcessor` reference to remote code
    pub remote_reference: Option<String>,
    /// `model_type` from `config.json`, when that file was consulted
    pub model_type: Option<String>,
    /// Probe the class name came from
    pub source: Option<ConfigProbe>,
}

#[derive(Default)]
struct ProbeState {
    declared: DeclaredProcessor,
    preprocessor_present: bool,
    video_present: bool,
}

impl ProbeState {
    fn should_run(&self, probe: ConfigProbe) -> bool {
        if self.declared.class_name.is_some() {
            return false;
        }
        match probe {
            ConfigProbe::VideoProcessor => !self.preprocessor_present,
            ConfigProbe::FeatureExtractor => !self.preprocessor_present && !self.video_present,
            _ => true,
        }
    }

    fn absorb(&mut self, probe: ConfigProbe, dict: &Map<String, Value>) {
        let class_name = dict
            .get("processor_class")
            .and_then(Value::as_str)
            .map(String::from);
        if class_name.is_some() {
            self.declared.source = Some(probe);
        }
        self.declared.class_name = class_name;
        if let Some(reference) = auto_processor_reference(dict) {
            self.declared.remote_reference = Some(reference);
        }
        if probe == ConfigProbe::ModelConfig {
            self.declared.model_type = dict
                .get("model_type")
                .and_then(Value::as_str)
                .map(String::from);
        }
    }
}

/// Runs the probes in [`PROBE_ORDER`] until one declares a processor class.
pub fn probe_repository(ctx: &LoadContext<'_>) -> Result<DeclaredProcessor> {
    let mut state = ProbeState::default();

    for probe in PROBE_ORDER {
        if !state.should_run(probe) {
            continue;
        }
        let Some(dict) = read_probe(ctx, probe)? else {
            continue;
        };
        match probe {
            ConfigProbe::ImageProcessor => state.preprocessor_present = true,
            ConfigProbe::VideoProcessor => state.video_present = true,
            _ => {}
        }
        state.absorb(probe, &dict);
    }

    debug!("Declared processor for {}: {:?}", ctx.identifier, state.declared);
    Ok(state.declared)
}

fn read_probe(ctx: &LoadContext<'_>, probe: ConfigProbe) -> Result<Option<Map<String, Value>>> {
    let Some(path) = ctx.fetch(probe.filename())? else {
        return Ok(None);
    };
    match read_json_file::<Map<String, Value>>(&path) {
        Ok(dict) => Ok(Some(dict)),
        Err(e) if probe.tolerates_malformed() => {
            warn!("Ignoring malformed {}: {e}", probe.filename());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// `auto_map.AutoProcessor` may be a single reference or a list whose first
/// entry is the processor class.
fn auto_processor_reference(dict: &Map<String, Value>) -> Option<String> {
    match dict.get("auto_map")?.get("AutoProcessor")? {
        Value::String(reference) => Some(reference.clone()),
        Value::Array(items) => items.iter().find_map(Value::as_str).map(String::from),
        _ => None,
    }
}
