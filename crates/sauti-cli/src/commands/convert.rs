use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use sauti_core::convert::wav2vec2::{convert_wav2vec2_checkpoint, ConvertRequest, WeightNormStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::output::emit;
use crate::OutputFormat;

pub struct ConvertArgs {
    pub checkpoint_path: PathBuf,
    pub dump_dir: PathBuf,
    pub config_path: Option<PathBuf>,
    pub dict_path: Option<PathBuf>,
    pub not_finetuned: bool,
    pub is_seq_class: bool,
    pub parametrized_weight_norm: bool,
}

#[derive(Serialize)]
struct ConvertSummary {
    checkpoint: PathBuf,
    output: PathBuf,
    architecture: &'static str,
    initialized: usize,
    unused: Vec<String>,
    missing: Vec<String>,
}

pub fn execute(args: ConvertArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut request = ConvertRequest::new(&args.checkpoint_path, &args.dump_dir);
    request.config_path = args.config_path;
    request.dict_path = args.dict_path;
    request.is_finetuned = !args.not_finetuned && !args.is_seq_class;
    request.is_seq_class = args.is_seq_class;
    if args.parametrized_weight_norm {
        request.weight_norm = WeightNormStyle::Parametrized;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.set_message(format!("Converting {}", args.checkpoint_path.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = convert_wav2vec2_checkpoint(&request);
    spinner.finish_and_clear();
    let report = result.with_context(|| {
        format!("Failed to convert {}", args.checkpoint_path.display())
    })?;

    let summary = ConvertSummary {
        checkpoint: args.checkpoint_path,
        output: args.dump_dir,
        architecture: request.head().architecture(),
        initialized: report.initialized,
        unused: report.unused,
        missing: report.missing,
    };
    let rows = [
        ("output", summary.output.display().to_string()),
        ("architecture", summary.architecture.to_string()),
        ("initialized", summary.initialized.to_string()),
        ("unused", summary.unused.len().to_string()),
        ("missing", summary.missing.len().to_string()),
    ];
    emit(format, &summary, &rows)
}
