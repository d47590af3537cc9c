//! Transformers-style `config.json` for wav2vec2 models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::processing::{read_json_file, write_json_file};

/// Wav2vec2 configuration. Missing keys take the library defaults of the
/// base model; unknown keys are kept and written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wav2Vec2Config {
    pub model_type: String,
    pub architectures: Option<Vec<String>>,
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub hidden_act: String,
    pub layer_norm_eps: f64,
    /// `"group"` or `"layer"`
    pub feat_extract_norm: String,
    pub conv_dim: Vec<usize>,
    pub conv_stride: Vec<usize>,
    pub conv_kernel: Vec<usize>,
    pub conv_bias: bool,
    pub num_conv_pos_embeddings: usize,
    pub num_conv_pos_embedding_groups: usize,
    pub do_stable_layer_norm: bool,
    pub mask_time_prob: f64,
    pub mask_feature_prob: f64,
    pub num_codevectors_per_group: usize,
    pub num_codevector_groups: usize,
    pub codevector_dim: usize,
    pub proj_codevector_dim: usize,
    pub use_weighted_layer_sum: bool,
    pub classifier_proj_size: usize,
    pub output_hidden_size: Option<usize>,
    pub adapter_attn_dim: Option<usize>,
    pub bos_token_id: u32,
    pub pad_token_id: u32,
    pub eos_token_id: u32,
    pub id2label: Option<BTreeMap<String, String>>,
    pub label2id: Option<BTreeMap<String, usize>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Wav2Vec2Config {
    fn default() -> Self {
        Self {
            model_type: "wav2vec2".to_string(),
            architectures: None,
            vocab_size: 32,
            hidden_size: 768,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            intermediate_size: 3072,
            hidden_act: "gelu".to_string(),
            layer_norm_eps: 1e-5,
            feat_extract_norm: "group".to_string(),
            conv_dim: vec![512; 7],
            conv_stride: vec![5, 2, 2, 2, 2, 2, 2],
            conv_kernel: vec![10, 3, 3, 3, 3, 2, 2],
            conv_bias: false,
            num_conv_pos_embeddings: 128,
            num_conv_pos_embedding_groups: 16,
            do_stable_layer_norm: false,
            mask_time_prob: 0.05,
            mask_feature_prob: 0.0,
            num_codevectors_per_group: 320,
            num_codevector_groups: 2,
            codevector_dim: 256,
            proj_codevector_dim: 256,
            use_weighted_layer_sum: false,
            classifier_proj_size: 256,
            output_hidden_size: None,
            adapter_attn_dim: None,
            bos_token_id: 1,
            pad_token_id: 0,
            eos_token_id: 2,
            id2label: None,
            label2id: None,
            extra: Map::new(),
        }
    }
}

impl Wav2Vec2Config {
    /// Reads a `config.json` file, or the one inside a model directory.
    pub fn from_pretrained(path: &Path) -> Result<Self> {
        let file = if path.is_dir() {
            path.join("config.json")
        } else {
            path.to_path_buf()
        };
        let config: Self = read_json_file(&file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        write_json_file(&dir.join("config.json"), self)
    }

    pub fn validate(&self) -> Result<()> {
        let layers = self.conv_dim.len();
        if self.conv_stride.len() != layers || self.conv_kernel.len() != layers {
            return Err(Error::ConfigError(format!(
                "conv_dim ({}), conv_stride ({}) and conv_kernel ({}) must have the same length",
                layers,
                self.conv_stride.len(),
                self.conv_kernel.len()
            )));
        }
        if layers == 0 {
            return Err(Error::ConfigError("conv_dim must not be empty".to_string()));
        }
        let positive = [
            ("hidden_size", self.hidden_size),
            ("num_attention_heads", self.num_attention_heads),
            ("num_conv_pos_embedding_groups", self.num_conv_pos_embedding_groups),
            ("num_codevector_groups", self.num_codevector_groups),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(Error::ConfigError(format!("{name} must be greater than 0")));
        }
        if let Some(layer) = self.conv_dim.iter().position(|&dim| dim == 0) {
            return Err(Error::ConfigError(format!(
                "conv_dim[{layer}] must be greater than 0"
            )));
        }
        if self.hidden_size % self.num_conv_pos_embedding_groups != 0 {
            return Err(Error::ConfigError(format!(
                "hidden_size ({}) must be divisible by num_conv_pos_embedding_groups ({})",
                self.hidden_size, self.num_conv_pos_embedding_groups
            )));
        }
        if self.codevector_dim % self.num_codevector_groups != 0 {
            return Err(Error::ConfigError(format!(
                "codevector_dim ({}) must be divisible by num_codevector_groups ({})",
                self.codevector_dim, self.num_codevector_groups
            )));
        }
        Ok(())
    }

    pub fn uses_group_norm(&self) -> bool {
        self.feat_extract_norm == "group"
    }

    pub fn last_conv_dim(&self) -> usize {
        self.conv_dim.last().copied().unwrap_or(self.hidden_size)
    }

    pub fn output_hidden_size(&self) -> usize {
        self.output_hidden_size.unwrap_or(self.hidden_size)
    }

    pub fn num_labels(&self) -> usize {
        self.id2label.as_ref().map_or(2, BTreeMap::len)
    }

    pub fn has_masked_spec_embed(&self) -> bool {
        self.mask_time_prob > 0.0 || self.mask_feature_prob > 0.0
    }

    /// Replaces the label set, keeping `label2id` consistent.
    pub fn set_labels(&mut self, id2label: BTreeMap<usize, String>) {
        self.label2id = Some(
            id2label
                .iter()
                .map(|(id, label)| (label.clone(), *id))
                .collect(),
        );
        self.id2label = Some(
            id2label
                .into_iter()
                .map(|(id, label)| (id.to_string(), label))
                .collect(),
        );
    }
}
