//! Sauti CLI - processor resolution and wav2vec2 checkpoint conversion
//!
//! Examples:
//!   sauti resolve facebook/wav2vec2-base-960h
//!   sauti resolve ./my-model --set sampling_rate=8000 --output-format json
//!   sauti convert-wav2vec2 --checkpoint-path ckpt.pt --pytorch-dump-folder-path out/ --dict-path dict.ltr.txt

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "sauti",
    about = "Resolve model processors and convert wav2vec2 checkpoints",
    version = env!("CARGO_PKG_VERSION"),
    arg_required_else_help = true,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(
        long = "output-format",
        global = true,
        value_enum,
        default_value = "table"
    )]
    pub output_format: OutputFormat,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve and load the processor of a model repository
    #[command(name = "resolve", alias = "processor")]
    Resolve {
        /// Hub repository id or local directory
        model: String,

        /// Revision (branch, tag or commit)
        #[arg(long)]
        revision: Option<String>,

        /// Hub cache directory
        #[arg(long, env = "SAUTI_CACHE_DIR", value_name = "PATH")]
        cache_dir: Option<PathBuf>,

        /// Access token for private or gated repositories
        #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Allow processors defined by code inside the repository
        #[arg(long)]
        trust_remote_code: bool,

        /// Download files even when cached
        #[arg(long)]
        force_download: bool,

        /// Attribute override, repeatable (e.g. --set sampling_rate=8000)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Convert a fairseq wav2vec2 checkpoint into a transformers model directory
    #[command(name = "convert-wav2vec2")]
    ConvertWav2Vec2 {
        /// Path to the fairseq checkpoint
        #[arg(long)]
        checkpoint_path: PathBuf,

        /// Output directory
        #[arg(long)]
        pytorch_dump_folder_path: PathBuf,

        /// config.json of the model to convert
        #[arg(long)]
        config_path: Option<PathBuf>,

        /// Target dictionary of a fine-tuned model, or label file for classification
        #[arg(long)]
        dict_path: Option<PathBuf>,

        /// The checkpoint is a pretraining checkpoint
        #[arg(long)]
        not_finetuned: bool,

        /// The checkpoint is a fine-tuned sequence classification model
        #[arg(long)]
        is_seq_class: bool,

        /// Store the positional convolution as parametrized weight norm
        #[arg(long)]
        parametrized_weight_norm: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "sauti_cli=debug,sauti_core=debug"
    } else {
        "sauti_cli=info,sauti_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Resolve {
            model,
            revision,
            cache_dir,
            token,
            trust_remote_code,
            force_download,
            overrides,
        } => commands::resolve::execute(
            commands::resolve::ResolveArgs {
                model,
                revision,
                cache_dir,
                token,
                trust_remote_code,
                force_download,
                overrides,
            },
            cli.output_format,
        ),

        Commands::ConvertWav2Vec2 {
            checkpoint_path,
            pytorch_dump_folder_path,
            config_path,
            dict_path,
            not_finetuned,
            is_seq_class,
            parametrized_weight_norm,
        } => commands::convert::execute(
            commands::convert::ConvertArgs {
                checkpoint_path,
                dump_dir: pytorch_dump_folder_path,
                config_path,
                dict_path,
                not_finetuned,
                is_seq_class,
                parametrized_weight_norm,
            },
            cli.output_format,
        ),
    }
}
