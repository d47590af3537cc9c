//! Fairseq wav2vec2 checkpoints → transformers model directories.

pub mod checkpoint;
pub mod config;
pub mod dictionary;
pub mod layout;
pub mod loader;
pub mod mapping;

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::processing::names::SAFE_WEIGHTS_NAME;
use crate::processing::tokenizer::TokenizerConfig;
use crate::processing::{FeatureExtractor, Processor, Tokenizer};

pub use checkpoint::read_checkpoint;
pub use config::Wav2Vec2Config;
pub use dictionary::{read_txt_into_dict, Dictionary};
pub use layout::{build_parameter_tree, HeadKind, WeightNormStyle};
pub use loader::{load_weights, rename_into_dict, ConversionReport};
pub use mapping::{map_source_name, MappedName, WeightType, MAPPING, PARAM_MAPPING, TOP_LEVEL_KEYS};

/// Inputs of one conversion.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub checkpoint_path: PathBuf,
    pub dump_dir: PathBuf,
    /// `config.json` of the target model; library defaults otherwise
    pub config_path: Option<PathBuf>,
    /// Fairseq target dictionary, or the label file for classification
    pub dict_path: Option<PathBuf>,
    pub is_finetuned: bool,
    pub is_seq_class: bool,
    pub weight_norm: WeightNormStyle,
}

impl ConvertRequest {
    pub fn new(checkpoint_path: impl Into<PathBuf>, dump_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            dump_dir: dump_dir.into(),
            config_path: None,
            dict_path: None,
            is_finetuned: true,
            is_seq_class: false,
            weight_norm: WeightNormStyle::default(),
        }
    }

    pub fn head(&self) -> HeadKind {
        if self.is_seq_class {
            HeadKind::SequenceClassification
        } else if self.is_finetuned {
            HeadKind::Ctc
        } else {
            HeadKind::PreTraining
        }
    }
}

/// Converts a checkpoint and writes `config.json`, `model.safetensors` and
/// the processing files the head needs into `request.dump_dir`.
pub fn convert_wav2vec2_checkpoint(request: &ConvertRequest) -> Result<ConversionReport> {
    let mut config = match &request.config_path {
        Some(path) => Wav2Vec2Config::from_pretrained(path)?,
        None => Wav2Vec2Config::default(),
    };
    prepare_dump_dir(&request.dump_dir)?;

    let head = request.head();
    info!("Converting {} as {head}", request.checkpoint_path.display());

    match head {
        HeadKind::SequenceClassification => {
            let dict_path = request.dict_path.as_deref().ok_or_else(|| {
                Error::InvalidInput(
                    "Sequence classification needs a label file (dict_path)".to_string(),
                )
            })?;
            config.set_labels(read_txt_into_dict(dict_path)?);
            FeatureExtractor::wav2vec2(true).save_pretrained(&request.dump_dir)?;
        }
        HeadKind::Ctc => {
            if let Some(dict_path) = request.dict_path.as_deref() {
                save_ctc_processor(&mut config, dict_path, &request.dump_dir)?;
            }
        }
        HeadKind::PreTraining => {}
    }
    config.architectures = Some(vec![head.architecture().to_string()]);

    let mut tree = build_parameter_tree(&config, head, request.weight_norm)?;
    let weights = read_checkpoint(&request.checkpoint_path)?;
    let report = load_weights(weights, &mut tree, config.uses_group_norm())?;

    config.save(&request.dump_dir)?;
    let tensors = tree.into_tensors()?;
    let weights_path = request.dump_dir.join(SAFE_WEIGHTS_NAME);
    candle_core::safetensors::save(&tensors, &weights_path)?;

    info!(
        "Wrote {} parameters to {} ({} initialized, {} unused)",
        tensors.len(),
        weights_path.display(),
        report.initialized,
        report.unused.len()
    );
    Ok(report)
}

fn prepare_dump_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "{} should be a directory",
            dir.display()
        )));
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Points the config at the dictionary's special tokens and writes the
/// matching tokenizer and feature extractor.
fn save_ctc_processor(config: &mut Wav2Vec2Config, dict_path: &Path, dir: &Path) -> Result<()> {
    let dict = Dictionary::load(dict_path)?;

    // `<pad>` and `<s>` trade places in the vocabulary.
    config.bos_token_id = dict.pad_index as u32;
    config.pad_token_id = dict.bos_index as u32;
    config.eos_token_id = dict.eos_index as u32;
    config.vocab_size = dict.len();

    let tokenizer_config = TokenizerConfig {
        tokenizer_class: Some("Wav2Vec2CTCTokenizer".to_string()),
        unk_token: Some(Value::String(dict.unk_word.clone())),
        pad_token: Some(Value::String(dict.pad_word.clone())),
        bos_token: Some(Value::String(dict.bos_word.clone())),
        eos_token: Some(Value::String(dict.eos_word.clone())),
        word_delimiter_token: Some("|".to_string()),
        do_lower_case: Some(false),
        ..Default::default()
    };
    let tokenizer = Tokenizer::ctc(dict.ctc_vocab(), tokenizer_config);
    let extractor = FeatureExtractor::wav2vec2(config.feat_extract_norm == "layer");

    Processor::new("Wav2Vec2Processor")
        .with_feature_extractor(extractor)
        .with_tokenizer(tokenizer)
        .save_pretrained(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_follows_flags() {
        let mut req = ConvertRequest::new("ckpt.pt", "out");
        assert_eq!(req.head(), HeadKind::Ctc);
        req.is_finetuned = false;
        assert_eq!(req.head(), HeadKind::PreTraining);
        req.is_seq_class = true;
        assert_eq!(req.head(), HeadKind::SequenceClassification);
    }

    #[test]
    fn dump_dir_must_not_be_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            prepare_dump_dir(&file),
            Err(Error::InvalidInput(_))
        ));
        prepare_dump_dir(&dir.path().join("fresh")).unwrap();
        assert!(dir.path().join("fresh").is_dir());
    }
}
