//! Fairseq parameter names → transformers parameter paths.

use std::fmt;

use crate::convert::param_tree::ParamPath;
use crate::error::{Error, Result};

/// Source substring → destination path, checked in order. `*` is the layer index.
pub const MAPPING: &[(&str, &str)] = &[
    ("post_extract_proj", "feature_projection.projection"),
    ("encoder.pos_conv.0", "encoder.pos_conv_embed.conv"),
    ("self_attn.k_proj", "encoder.layers.*.attention.k_proj"),
    ("self_attn.v_proj", "encoder.layers.*.attention.v_proj"),
    ("self_attn.q_proj", "encoder.layers.*.attention.q_proj"),
    ("self_attn.out_proj", "encoder.layers.*.attention.out_proj"),
    ("self_attn_layer_norm", "encoder.layers.*.layer_norm"),
    ("fc1", "encoder.layers.*.feed_forward.intermediate_dense"),
    ("fc2", "encoder.layers.*.feed_forward.output_dense"),
    ("final_layer_norm", "encoder.layers.*.final_layer_norm"),
    ("encoder.layer_norm", "encoder.layer_norm"),
    ("adapter_layer", "encoder.layers.*.adapter_layer"),
    ("w2v_model.layer_norm", "feature_projection.layer_norm"),
    ("quantizer.weight_proj", "quantizer.weight_proj"),
    ("quantizer.vars", "quantizer.codevectors"),
    ("project_q", "project_q"),
    ("final_proj", "project_hid"),
    ("w2v_encoder.proj", "lm_head"),
    ("mask_emb", "masked_spec_embed"),
    ("pooling_layer.linear", "projector"),
    ("pooling_layer.projection", "classifier"),
];

/// Destinations that live beside the `wav2vec2.` base model rather than in it.
pub const TOP_LEVEL_KEYS: &[&str] = &[
    "lm_head",
    "quantizer.weight_proj",
    "quantizer.codevectors",
    "project_q",
    "project_hid",
    "projector",
    "classifier",
];

/// Adapter parameter suffix → path below the adapter layer.
pub const PARAM_MAPPING: &[(&str, &str)] = &[
    ("W_a", "linear_1.weight"),
    ("W_b", "linear_2.weight"),
    ("b_a", "linear_1.bias"),
    ("b_b", "linear_2.bias"),
    ("ln_W", "norm.weight"),
    ("ln_b", "norm.bias"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightType {
    WeightG,
    WeightV,
    Bias,
    Weight,
    /// Adapter parameter stored under the given sub-path
    Param(&'static str),
}

impl WeightType {
    /// Classifies a source name by substring, first match wins.
    pub fn from_source_name(name: &str) -> Option<Self> {
        if name.contains("weight_g") {
            Some(WeightType::WeightG)
        } else if name.contains("weight_v") {
            Some(WeightType::WeightV)
        } else if name.contains("bias") {
            Some(WeightType::Bias)
        } else if name.contains("weight") {
            Some(WeightType::Weight)
        } else {
            None
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            WeightType::WeightG => "weight_g",
            WeightType::WeightV => "weight_v",
            WeightType::Bias => "bias",
            WeightType::Weight => "weight",
            WeightType::Param(path) => path,
        }
    }
}

impl fmt::Display for WeightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Where a source parameter goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedName {
    /// Module path, already prefixed and with the layer index filled in
    pub module: ParamPath,
    pub weight_type: Option<WeightType>,
}

impl MappedName {
    /// Full parameter name in the destination (module plus weight suffix).
    pub fn full_key(&self) -> String {
        match self.weight_type {
            Some(weight_type) => format!("{}.{}", self.module, weight_type),
            None => self.module.to_string(),
        }
    }

    /// Adapter sources are stacked per adapter; only the first is kept.
    pub fn takes_first_row(&self) -> bool {
        matches!(self.weight_type, Some(WeightType::Param(_)))
    }
}

fn matches_key(key: &str, name: &str) -> bool {
    let bare_key = key.rsplit("w2v_model.").next().unwrap_or(key);
    let first_segment = name.split('.').next().unwrap_or(name);
    name.contains(key) || bare_key == first_segment
}

/// Layer index: the segment just before `key` in `name`.
fn layer_index(name: &str, key: &str) -> Result<usize> {
    let prefix = name.find(key).map_or(name, |at| &name[..at]);
    let parts: Vec<&str> = prefix.split('.').collect();
    parts
        .len()
        .checked_sub(2)
        .and_then(|i| parts[i].parse::<usize>().ok())
        .ok_or_else(|| {
            Error::ModelLoadError(format!("Cannot find the layer index of {name} (matched {key})"))
        })
}

fn param_suffix(name: &str) -> Option<&'static str> {
    if !PARAM_MAPPING.iter().any(|(key, _)| name.ends_with(key)) {
        return None;
    }
    let last = name.rsplit('.').next().unwrap_or(name);
    PARAM_MAPPING
        .iter()
        .find(|(key, _)| *key == last)
        .map(|(_, path)| *path)
}

/// Maps a non-convolutional source name. `Ok(None)` means no rule applies.
pub fn map_source_name(name: &str) -> Result<Option<MappedName>> {
    let Some((key, destination)) = MAPPING.iter().find(|(key, _)| matches_key(key, name)) else {
        return Ok(None);
    };

    let mut module = if TOP_LEVEL_KEYS.contains(destination) {
        ParamPath::parse(destination)
    } else {
        ParamPath::parse(&format!("wav2vec2.{destination}"))
    };
    if module.has_wildcard() {
        module = module.with_index(layer_index(name, key)?);
    }

    let weight_type = match param_suffix(name) {
        Some(path) => Some(WeightType::Param(path)),
        None => WeightType::from_source_name(name),
    };

    Ok(Some(MappedName {
        module,
        weight_type,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_key(name: &str) -> String {
        map_source_name(name).unwrap().unwrap().full_key()
    }

    #[test]
    fn fine_tuned_encoder_layers() {
        assert_eq!(
            full_key("w2v_encoder.w2v_model.encoder.layers.11.fc1.weight"),
            "wav2vec2.encoder.layers.11.feed_forward.intermediate_dense.weight"
        );
        assert_eq!(
            full_key("encoder.layers.0.self_attn.q_proj.bias"),
            "wav2vec2.encoder.layers.0.attention.q_proj.bias"
        );
        assert_eq!(
            full_key("encoder.layers.2.self_attn_layer_norm.weight"),
            "wav2vec2.encoder.layers.2.layer_norm.weight"
        );
    }

    #[test]
    fn top_level_destinations_skip_prefix() {
        assert_eq!(full_key("w2v_encoder.proj.weight"), "lm_head.weight");
        assert_eq!(full_key("quantizer.vars"), "quantizer.codevectors");
        assert_eq!(full_key("final_proj.bias"), "project_hid.bias");
        assert_eq!(full_key("mask_emb"), "wav2vec2.masked_spec_embed");
    }

    #[test]
    fn bare_layer_norm_maps_to_feature_projection() {
        assert_eq!(
            full_key("layer_norm.weight"),
            "wav2vec2.feature_projection.layer_norm.weight"
        );
        assert_eq!(
            full_key("encoder.layer_norm.bias"),
            "wav2vec2.encoder.layer_norm.bias"
        );
    }

    #[test]
    fn weight_norm_components() {
        let mapped = map_source_name("encoder.pos_conv.0.weight_g").unwrap().unwrap();
        assert_eq!(mapped.weight_type, Some(WeightType::WeightG));
        assert_eq!(mapped.module.to_string(), "wav2vec2.encoder.pos_conv_embed.conv");
    }

    #[test]
    fn adapter_params() {
        let mapped = map_source_name("encoder.layers.4.adapter_layer.W_a")
            .unwrap()
            .unwrap();
        assert!(mapped.takes_first_row());
        assert_eq!(
            mapped.full_key(),
            "wav2vec2.encoder.layers.4.adapter_layer.linear_1.weight"
        );
    }

    #[test]
    fn unmatched_and_malformed_names() {
        assert_eq!(map_source_name("decoder.embed_tokens.weight").unwrap(), None);
        assert!(map_source_name("fc1.weight").is_err());
    }
}
