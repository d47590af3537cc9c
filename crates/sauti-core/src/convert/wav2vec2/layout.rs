//! Parameter layout of the wav2vec2 model family.

use std::fmt;

use super::config::Wav2Vec2Config;
use crate::convert::param_tree::ParameterTree;
use crate::error::Result;

/// Task head on top of the wav2vec2 encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadKind {
    Ctc,
    PreTraining,
    SequenceClassification,
}

impl HeadKind {
    pub fn architecture(&self) -> &'static str {
        match self {
            HeadKind::Ctc => "Wav2Vec2ForCTC",
            HeadKind::PreTraining => "Wav2Vec2ForPreTraining",
            HeadKind::SequenceClassification => "Wav2Vec2ForSequenceClassification",
        }
    }
}

impl fmt::Display for HeadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.architecture())
    }
}

/// How the positional convolution stores its weight-norm factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightNormStyle {
    /// `conv.weight_g` / `conv.weight_v`
    #[default]
    Legacy,
    /// `conv.parametrizations.weight.original0` / `original1`
    Parametrized,
}

const PREFIX: &str = "wav2vec2";

/// Declares every parameter of a `head` model built from `config`.
pub fn build_parameter_tree(
    config: &Wav2Vec2Config,
    head: HeadKind,
    weight_norm: WeightNormStyle,
) -> Result<ParameterTree> {
    config.validate()?;
    let mut tree = ParameterTree::new();
    let h = config.hidden_size;

    declare_feature_encoder(&mut tree, config);

    let last_conv = config.last_conv_dim();
    tree.declare(&format!("{PREFIX}.feature_projection.layer_norm.weight"), &[last_conv]);
    tree.declare(&format!("{PREFIX}.feature_projection.layer_norm.bias"), &[last_conv]);
    tree.declare(&format!("{PREFIX}.feature_projection.projection.weight"), &[h, last_conv]);
    tree.declare(&format!("{PREFIX}.feature_projection.projection.bias"), &[h]);

    if config.has_masked_spec_embed() {
        tree.declare(&format!("{PREFIX}.masked_spec_embed"), &[h]);
    }

    let kernel = config.num_conv_pos_embeddings;
    let groups = config.num_conv_pos_embedding_groups;
    let pos_conv = format!("{PREFIX}.encoder.pos_conv_embed.conv");
    let (g_name, v_name) = match weight_norm {
        WeightNormStyle::Legacy => ("weight_g", "weight_v"),
        WeightNormStyle::Parametrized => (
            "parametrizations.weight.original0",
            "parametrizations.weight.original1",
        ),
    };
    // Weight norm over dim 2: one magnitude per kernel position.
    tree.declare(&format!("{pos_conv}.{g_name}"), &[1, 1, kernel]);
    tree.declare(&format!("{pos_conv}.{v_name}"), &[h, h / groups, kernel]);
    tree.declare(&format!("{pos_conv}.bias"), &[h]);

    tree.declare(&format!("{PREFIX}.encoder.layer_norm.weight"), &[h]);
    tree.declare(&format!("{PREFIX}.encoder.layer_norm.bias"), &[h]);

    for layer in 0..config.num_hidden_layers {
        declare_encoder_layer(&mut tree, config, layer);
    }

    match head {
        HeadKind::Ctc => {
            let out = config.output_hidden_size();
            tree.declare("lm_head.weight", &[config.vocab_size, out]);
            tree.declare("lm_head.bias", &[config.vocab_size]);
        }
        HeadKind::PreTraining => {
            let groups = config.num_codevector_groups;
            let codevectors = groups * config.num_codevectors_per_group;
            tree.declare(
                "quantizer.codevectors",
                &[1, codevectors, config.codevector_dim / groups],
            );
            tree.declare("quantizer.weight_proj.weight", &[codevectors, last_conv]);
            tree.declare("quantizer.weight_proj.bias", &[codevectors]);
            tree.declare("project_hid.weight", &[config.proj_codevector_dim, h]);
            tree.declare("project_hid.bias", &[config.proj_codevector_dim]);
            tree.declare(
                "project_q.weight",
                &[config.proj_codevector_dim, config.codevector_dim],
            );
            tree.declare("project_q.bias", &[config.proj_codevector_dim]);
        }
        HeadKind::SequenceClassification => {
            if config.use_weighted_layer_sum {
                tree.declare("layer_weights", &[config.num_hidden_layers + 1]);
            }
            let proj = config.classifier_proj_size;
            tree.declare("projector.weight", &[proj, h]);
            tree.declare("projector.bias", &[proj]);
            tree.declare("classifier.weight", &[config.num_labels(), proj]);
            tree.declare("classifier.bias", &[config.num_labels()]);
        }
    }

    Ok(tree)
}

fn declare_feature_encoder(tree: &mut ParameterTree, config: &Wav2Vec2Config) {
    let mut in_channels = 1;
    for (i, (&out, &kernel)) in config.conv_dim.iter().zip(&config.conv_kernel).enumerate() {
        let base = format!("{PREFIX}.feature_extractor.conv_layers.{i}");
        tree.declare(&format!("{base}.conv.weight"), &[out, in_channels, kernel]);
        if config.conv_bias {
            tree.declare(&format!("{base}.conv.bias"), &[out]);
        }
        // Group norm only follows the first convolution.
        if !config.uses_group_norm() || i == 0 {
            tree.declare(&format!("{base}.layer_norm.weight"), &[out]);
            tree.declare(&format!("{base}.layer_norm.bias"), &[out]);
        }
        in_channels = out;
    }
}

fn declare_encoder_layer(tree: &mut ParameterTree, config: &Wav2Vec2Config, layer: usize) {
    let h = config.hidden_size;
    let inter = config.intermediate_size;
    let base = format!("{PREFIX}.encoder.layers.{layer}");

    for proj in ["q_proj", "k_proj", "v_proj", "out_proj"] {
        tree.declare(&format!("{base}.attention.{proj}.weight"), &[h, h]);
        tree.declare(&format!("{base}.attention.{proj}.bias"), &[h]);
    }
    for norm in ["layer_norm", "final_layer_norm"] {
        tree.declare(&format!("{base}.{norm}.weight"), &[h]);
        tree.declare(&format!("{base}.{norm}.bias"), &[h]);
    }
    tree.declare(&format!("{base}.feed_forward.intermediate_dense.weight"), &[inter, h]);
    tree.declare(&format!("{base}.feed_forward.intermediate_dense.bias"), &[inter]);
    tree.declare(&format!("{base}.feed_forward.output_dense.weight"), &[h, inter]);
    tree.declare(&format!("{base}.feed_forward.output_dense.bias"), &[h]);

    if let Some(adapter) = config.adapter_attn_dim {
        let base = format!("{base}.adapter_layer");
        tree.declare(&format!("{base}.norm.weight"), &[h]);
        tree.declare(&format!("{base}.norm.bias"), &[h]);
        tree.declare(&format!("{base}.linear_1.weight"), &[adapter, h]);
        tree.declare(&format!("{base}.linear_1.bias"), &[adapter]);
        tree.declare(&format!("{base}.linear_2.weight"), &[h, adapter]);
        tree.declare(&format!("{base}.linear_2.bias"), &[h]);
    }
}
