//! Copies fairseq tensors into a wav2vec2 parameter tree.

use candle_core::Tensor;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::mapping::{map_source_name, MappedName, WeightType};
use crate::convert::param_tree::{ParamPath, ParameterTree};
use crate::error::{Error, Result};

/// Outcome of a loading pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Destination parameters that received a tensor
    pub initialized: usize,
    /// Source names no rule consumed
    pub unused: Vec<String>,
    /// Destination parameters left at their fill value
    pub missing: Vec<String>,
}

/// Loads every checkpoint tensor into `tree`.
///
/// Shape mismatches abort the pass; names without a destination are
/// collected in the report and logged once at the end.
pub fn load_weights(
    weights: Vec<(String, Tensor)>,
    tree: &mut ParameterTree,
    use_group_norm: bool,
) -> Result<ConversionReport> {
    let mut report = ConversionReport::default();

    for (name, value) in weights {
        if name.contains("conv_layers") {
            match load_conv_layer(&name, value, tree, use_group_norm)? {
                ConvLoad::Assigned => report.initialized += 1,
                ConvLoad::Consumed => {}
                ConvLoad::Unused => report.unused.push(name),
            }
            continue;
        }

        match map_source_name(&name)? {
            Some(mapped) => {
                set_parameter(&mapped, value, &name, tree)?;
                report.initialized += 1;
            }
            None => report.unused.push(name),
        }
    }

    if !report.unused.is_empty() {
        warn!("Unused weights: {:?}", report.unused);
    }
    report.missing = tree.missing().iter().map(|p| p.to_string()).collect();
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConvLoad {
    Assigned,
    /// Matched a conv rule but carries neither a weight nor a bias
    Consumed,
    Unused,
}

/// Feature-encoder convolutions: `conv_layers.<layer>.<type>.<param>`.
///
/// Type 0 is the convolution, type 2 its norm (every layer for layer norm,
/// layer 0 only for group norm).
fn load_conv_layer(
    full_name: &str,
    value: Tensor,
    tree: &mut ParameterTree,
    use_group_norm: bool,
) -> Result<ConvLoad> {
    let name = full_name.rsplit("conv_layers.").next().unwrap_or(full_name);
    let mut items = name.split('.');
    let mut next_id = |what: &str| {
        items
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| Error::ModelLoadError(format!("Cannot read the {what} of {full_name}")))
    };
    let layer_id = next_id("layer id")?;
    let type_id = next_id("type id")?;

    let module = match type_id {
        0 => "conv",
        2 if !use_group_norm || layer_id == 0 => "layer_norm",
        _ => return Ok(ConvLoad::Unused),
    };
    let param = if name.contains("bias") {
        "bias"
    } else if name.contains("weight") {
        "weight"
    } else {
        debug!("{full_name} has no weight or bias to load");
        return Ok(ConvLoad::Consumed);
    };

    let path = ParamPath::parse(&format!(
        "wav2vec2.feature_extractor.conv_layers.{layer_id}.{module}.{param}"
    ));
    tree.assign(&path, value, full_name)?;
    debug!("Feature encoder {module} {param} of layer {layer_id} was initialized from {full_name}");
    Ok(ConvLoad::Assigned)
}

/// Weight-norm factors go to `weight_g`/`weight_v` when the tree has them,
/// otherwise to the parametrization originals.
fn destination(mapped: &MappedName, tree: &ParameterTree) -> ParamPath {
    let module = &mapped.module;
    match mapped.weight_type {
        None => module.clone(),
        Some(WeightType::WeightG) => {
            let legacy = module.join("weight_g");
            if tree.contains(&legacy) {
                legacy
            } else {
                module.join("parametrizations.weight.original0")
            }
        }
        Some(WeightType::WeightV) => {
            let legacy = module.join("weight_v");
            if tree.contains(&legacy) {
                legacy
            } else {
                module.join("parametrizations.weight.original1")
            }
        }
        Some(weight_type) => module.join(weight_type.suffix()),
    }
}

fn set_parameter(
    mapped: &MappedName,
    value: Tensor,
    full_name: &str,
    tree: &mut ParameterTree,
) -> Result<()> {
    let path = destination(mapped, tree);
    let value = if mapped.takes_first_row() {
        value.get(0)?
    } else {
        value
    };
    tree.assign(&path, value, full_name)?;
    debug!("{path} was initialized from {full_name}");
    Ok(())
}

/// Renames checkpoint tensors to destination keys without a parameter tree.
///
/// Values are reduced to their first row except for `lm_head` keys.
/// Convolution and unmatched names come back as unused.
pub fn rename_into_dict(
    weights: Vec<(String, Tensor)>,
) -> Result<(BTreeMap<String, Tensor>, Vec<String>)> {
    let mut renamed = BTreeMap::new();
    let mut unused = Vec::new();

    for (name, value) in weights {
        if name.contains("conv_layers") {
            unused.push(name);
            continue;
        }
        let Some(mapped) = map_source_name(&name)? else {
            unused.push(name);
            continue;
        };
        let key = mapped.full_key();
        let value = if key.contains("lm_head") {
            value
        } else {
            value.get(0)?
        };
        renamed.insert(key, value);
    }

    if !unused.is_empty() {
        warn!("Unused weights: {unused:?}");
    }
    Ok((renamed, unused))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn zeros(shape: &[usize]) -> Tensor {
        Tensor::zeros(shape, DType::F32, &Device::Cpu).unwrap()
    }

    fn tree() -> ParameterTree {
        let mut tree = ParameterTree::new();
        tree.declare("wav2vec2.feature_extractor.conv_layers.0.conv.weight", &[4, 1, 10]);
        tree.declare("wav2vec2.feature_extractor.conv_layers.0.layer_norm.weight", &[4]);
        tree.declare("wav2vec2.feature_extractor.conv_layers.0.layer_norm.bias", &[4]);
        tree.declare("wav2vec2.feature_extractor.conv_layers.1.conv.weight", &[4, 4, 3]);
        tree.declare("wav2vec2.encoder.layers.0.feed_forward.intermediate_dense.weight", &[3, 3]);
        tree.declare("wav2vec2.encoder.pos_conv_embed.conv.parametrizations.weight.original0", &[1, 1, 4]);
        tree.declare("wav2vec2.encoder.layers.0.adapter_layer.linear_1.weight", &[2, 3]);
        tree
    }

    #[test]
    fn group_norm_loads_only_first_layer() {
        let mut tree = tree();
        let weights = vec![
            ("feature_extractor.conv_layers.0.0.weight".to_string(), zeros(&[4, 1, 10])),
            ("feature_extractor.conv_layers.0.2.weight".to_string(), zeros(&[4])),
            ("feature_extractor.conv_layers.1.0.weight".to_string(), zeros(&[4, 4, 3])),
            ("feature_extractor.conv_layers.1.2.weight".to_string(), zeros(&[4])),
        ];
        let report = load_weights(weights, &mut tree, true).unwrap();
        assert_eq!(report.initialized, 3);
        assert_eq!(report.unused, vec!["feature_extractor.conv_layers.1.2.weight"]);
    }

    #[test]
    fn conv_name_without_weight_or_bias_is_not_counted() {
        let mut tree = tree();
        let weights = vec![(
            "feature_extractor.conv_layers.0.0.running_mean".to_string(),
            zeros(&[4]),
        )];
        let report = load_weights(weights, &mut tree, true).unwrap();
        assert_eq!(report.initialized, 0);
        assert!(report.unused.is_empty());
    }

    #[test]
    fn layer_norm_loads_every_layer() {
        let mut tree = tree();
        tree.declare("wav2vec2.feature_extractor.conv_layers.1.layer_norm.weight", &[4]);
        tree.declare("wav2vec2.feature_extractor.conv_layers.1.layer_norm.bias", &[4]);
        let weights = vec![
            ("feature_extractor.conv_layers.1.2.1.weight".to_string(), zeros(&[4])),
            ("feature_extractor.conv_layers.1.2.1.bias".to_string(), zeros(&[4])),
        ];
        let report = load_weights(weights, &mut tree, false).unwrap();
        assert_eq!(report.initialized, 2);
        let path = ParamPath::parse("wav2vec2.feature_extractor.conv_layers.1.layer_norm.bias");
        assert!(tree.get(&path).is_some());
    }

    #[test]
    fn unmatched_names_are_reported() {
        let mut tree = tree();
        let weights = vec![("decoder.embed.weight".to_string(), zeros(&[2]))];
        let report = load_weights(weights, &mut tree, true).unwrap();
        assert_eq!(report.unused, vec!["decoder.embed.weight"]);
        assert_eq!(report.initialized, 0);
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let mut tree = tree();
        let weights = vec![("encoder.layers.0.fc1.weight".to_string(), zeros(&[4, 4]))];
        let err = load_weights(weights, &mut tree, true).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn weight_g_falls_back_to_parametrization() {
        let mut tree = tree();
        let weights = vec![("encoder.pos_conv.0.weight_g".to_string(), zeros(&[1, 1, 4]))];
        load_weights(weights, &mut tree, true).unwrap();
        let path = ParamPath::parse(
            "wav2vec2.encoder.pos_conv_embed.conv.parametrizations.weight.original0",
        );
        assert!(tree.get(&path).is_some());
    }

    #[test]
    fn adapter_takes_first_stacked_entry() {
        let mut tree = tree();
        let weights = vec![("encoder.layers.0.adapter_layer.W_a".to_string(), zeros(&[5, 2, 3]))];
        load_weights(weights, &mut tree, true).unwrap();
        let path = ParamPath::parse("wav2vec2.encoder.layers.0.adapter_layer.linear_1.weight");
        assert_eq!(tree.get(&path).unwrap().dims(), &[2, 3]);
    }

    #[test]
    fn rename_keeps_lm_head_whole() {
        let weights = vec![
            ("w2v_encoder.proj.weight".to_string(), zeros(&[6, 8])),
            ("encoder.layers.1.fc2.bias".to_string(), zeros(&[2, 8])),
            ("feature_extractor.conv_layers.0.0.weight".to_string(), zeros(&[4, 1, 10])),
        ];
        let (renamed, unused) = rename_into_dict(weights).unwrap();
        assert_eq!(renamed["lm_head.weight"].dims(), &[6, 8]);
        assert_eq!(
            renamed["wav2vec2.encoder.layers.1.feed_forward.output_dense.bias"].dims(),
            &[8]
        );
        assert_eq!(unused.len(), 1);
    }
}
