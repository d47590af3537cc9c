use anyhow::{bail, Context};
use sauti_core::{AutoProcessor, ResolveOptions};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::output::emit;
use crate::OutputFormat;

pub struct ResolveArgs {
    pub model: String,
    pub revision: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub token: Option<String>,
    pub trust_remote_code: bool,
    pub force_download: bool,
    pub overrides: Vec<String>,
}

#[derive(Serialize)]
struct ResolveSummary {
    model: String,
    kind: &'static str,
    class_name: Option<String>,
    components: Vec<String>,
    unused_overrides: Map<String, Value>,
}

pub fn execute(args: ResolveArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut options = ResolveOptions::new().force_download(args.force_download);
    if let Some(revision) = args.revision {
        options = options.revision(revision);
    }
    if let Some(cache_dir) = args.cache_dir {
        options = options.cache_dir(cache_dir);
    }
    if let Some(token) = args.token {
        options = options.token(token);
    }
    if args.trust_remote_code {
        options = options.trust_remote_code(true);
    }
    for raw in &args.overrides {
        let (key, value) = parse_override(raw)?;
        options = options.set(key, value);
    }

    let (processor, unused) = AutoProcessor::from_pretrained_with_unused(&args.model, options)
        .with_context(|| format!("Failed to resolve a processor for {}", args.model))?;

    let components = processor
        .as_processor()
        .map(|p| p.components().iter().map(ToString::to_string).collect())
        .unwrap_or_default();
    let summary = ResolveSummary {
        model: args.model,
        kind: processor.kind(),
        class_name: processor.class_name().map(String::from),
        components,
        unused_overrides: unused,
    };

    let unused_keys: Vec<&str> = summary.unused_overrides.keys().map(String::as_str).collect();
    let rows = [
        ("model", summary.model.clone()),
        ("kind", summary.kind.to_string()),
        ("class", summary.class_name.clone().unwrap_or_else(|| "-".into())),
        ("components", list_or_dash(&summary.components)),
        ("unused", list_or_dash(&unused_keys)),
    ];
    emit(format, &summary, &rows)
}

fn list_or_dash<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }
}

/// `key=value`; the value is read as JSON when it parses, as a string otherwise.
fn parse_override(raw: &str) -> anyhow::Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid override {raw:?}, expected KEY=VALUE");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid override {raw:?}, the key is empty");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_values_are_typed() {
        assert_eq!(
            parse_override("sampling_rate=8000").unwrap(),
            ("sampling_rate".to_string(), Value::from(8000))
        );
        assert_eq!(
            parse_override("do_normalize=false").unwrap().1,
            Value::Bool(false)
        );
        assert_eq!(
            parse_override("padding_side=left").unwrap().1,
            Value::String("left".into())
        );
        assert!(parse_override("no_equals").is_err());
        assert!(parse_override("=1").is_err());
    }
}
