use sauti_core::processing::auto::{NoRemoteCode, ProcessorRegistry};
use sauti_core::{
    AutoProcessor, Component, DynamicModuleLoader, Error, HubFetcher, ProcessorClass,
    ProcessorFactory, ProcessorResolver, ResolveOptions,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

const FEATURE_EXTRACTOR: &str = r#"{
    "feature_extractor_type": "Wav2Vec2FeatureExtractor",
    "feature_size": 1,
    "sampling_rate": 16000,
    "do_normalize": true
}"#;

const CLIP_IMAGE_PROCESSOR: &str = r#"{
    "image_processor_type": "CLIPImageProcessor",
    "do_resize": true,
    "size": {"shortest_edge": 224}
}"#;

const CTC_VOCAB: &str = r#"{"<pad>": 0, "<s>": 1, "</s>": 2, "<unk>": 3, "|": 4, "A": 5, "B": 6}"#;

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

fn resolver() -> ProcessorResolver {
    ProcessorResolver::new(Arc::new(HubFetcher::default()))
        .with_registry(Arc::new(ProcessorRegistry::new()))
}

fn resolve(dir: &Path, options: ResolveOptions) -> sauti_core::Result<AutoProcessor> {
    resolver()
        .resolve(dir.to_str().unwrap(), options)
        .map(|(processor, _)| processor)
}

#[test]
fn declared_processor_class_is_used() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "processor_config.json",
        r#"{"processor_class": "Wav2Vec2Processor"}"#,
    );
    write(dir.path(), "preprocessor_config.json", FEATURE_EXTRACTOR);
    write(dir.path(), "vocab.json", CTC_VOCAB);
    // The model type would map elsewhere; the declaration wins.
    write(dir.path(), "config.json", r#"{"model_type": "clip"}"#);

    let resolved = resolve(dir.path(), ResolveOptions::default()).unwrap();
    let processor = resolved.as_processor().unwrap();
    assert_eq!(processor.class_name, "Wav2Vec2Processor");
    assert_eq!(
        processor.components(),
        vec![Component::Tokenizer, Component::FeatureExtractor]
    );
}

#[test]
fn processor_class_in_preprocessor_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut fe: Value = serde_json::from_str(FEATURE_EXTRACTOR).unwrap();
    fe["processor_class"] = json!("Wav2Vec2Processor");
    write(dir.path(), "preprocessor_config.json", &fe.to_string());
    write(dir.path(), "vocab.json", CTC_VOCAB);

    let resolved = resolve(dir.path(), ResolveOptions::default()).unwrap();
    assert_eq!(resolved.class_name(), Some("Wav2Vec2Processor"));
}

#[test]
fn model_type_selects_mapped_class() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", r#"{"model_type": "clip"}"#);
    write(dir.path(), "preprocessor_config.json", CLIP_IMAGE_PROCESSOR);
    write(dir.path(), "vocab.json", CTC_VOCAB);

    let resolved = resolve(dir.path(), ResolveOptions::default()).unwrap();
    let processor = resolved.as_processor().unwrap();
    assert_eq!(processor.class_name, "CLIPProcessor");
    assert!(processor.image_processor.is_some());
    assert!(processor.tokenizer.is_some());
}

#[test]
fn mapped_class_needs_its_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", r#"{"model_type": "clip"}"#);

    let err = resolve(dir.path(), ResolveOptions::default()).unwrap_err();
    assert!(matches!(err, Error::ModelNotFound(_) | Error::TokenizationError(_)));
}

#[test]
fn fallback_prefers_tokenizer() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "vocab.json", CTC_VOCAB);
    write(dir.path(), "preprocessor_config.json", CLIP_IMAGE_PROCESSOR);

    let resolved = resolve(dir.path(), ResolveOptions::default()).unwrap();
    assert!(matches!(resolved, AutoProcessor::Tokenizer(_)));
}

#[test]
fn fallback_to_image_processor() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "preprocessor_config.json", CLIP_IMAGE_PROCESSOR);

    let resolved = resolve(dir.path(), ResolveOptions::default()).unwrap();
    assert!(matches!(resolved, AutoProcessor::ImageProcessor(_)));
    assert_eq!(resolved.class_name(), Some("CLIPImageProcessor"));
}

#[test]
fn fallback_to_feature_extractor() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "preprocessor_config.json", FEATURE_EXTRACTOR);

    let resolved = resolve(dir.path(), ResolveOptions::default()).unwrap();
    assert!(matches!(resolved, AutoProcessor::FeatureExtractor(_)));
}

#[test]
fn nothing_loadable_names_the_identifier() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", r#"{"model_type": "gpt2"}"#);
    let id = dir.path().to_str().unwrap();

    let err = resolve(dir.path(), ResolveOptions::default()).unwrap_err();
    assert!(matches!(err, Error::UnrecognizedProcessor { .. }));
    assert!(err.to_string().contains(id));
}

#[test]
fn malformed_tokenizer_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "tokenizer_config.json", "{\"processor_class\": ");
    write(dir.path(), "vocab.json", CTC_VOCAB);

    let err = resolve(dir.path(), ResolveOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn malformed_processor_config_is_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "processor_config.json", "not json at all");
    write(dir.path(), "vocab.json", CTC_VOCAB);

    let resolved = resolve(dir.path(), ResolveOptions::default()).unwrap();
    assert!(matches!(resolved, AutoProcessor::Tokenizer(_)));
}

#[test]
fn malformed_processor_config_does_not_block_declared_class() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "processor_config.json", "{not json");
    let mut fe: Value = serde_json::from_str(FEATURE_EXTRACTOR).unwrap();
    fe["processor_class"] = json!("Wav2Vec2Processor");
    write(dir.path(), "preprocessor_config.json", &fe.to_string());
    write(dir.path(), "vocab.json", CTC_VOCAB);

    let resolved = resolve(dir.path(), ResolveOptions::default()).unwrap();
    let processor = resolved.as_processor().unwrap();
    assert_eq!(processor.class_name, "Wav2Vec2Processor");
    assert!(processor.attributes.is_empty());
    assert!(processor.feature_extractor.is_some());
}

#[test]
fn malformed_model_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", "{");
    write(dir.path(), "vocab.json", CTC_VOCAB);

    assert!(matches!(
        resolve(dir.path(), ResolveOptions::default()),
        Err(Error::Json(_))
    ));
}

#[test]
fn overrides_update_components_and_leftovers_are_returned() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "processor_config.json",
        r#"{"processor_class": "Wav2Vec2Processor"}"#,
    );
    write(dir.path(), "preprocessor_config.json", FEATURE_EXTRACTOR);
    write(dir.path(), "vocab.json", CTC_VOCAB);

    let options = ResolveOptions::new()
        .set("sampling_rate", 8000)
        .set("not_an_attribute", "x")
        .return_unused_kwargs(true);
    let (resolved, unused) = resolver()
        .resolve(dir.path().to_str().unwrap(), options)
        .unwrap();

    let processor = resolved.as_processor().unwrap();
    assert_eq!(processor.feature_extractor.as_ref().unwrap().sampling_rate, 8000);
    assert_eq!(unused.len(), 1);
    assert_eq!(unused["not_an_attribute"], "x");
}

#[test]
fn unused_overrides_dropped_without_flag() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "vocab.json", CTC_VOCAB);

    let options = ResolveOptions::new().set("mystery", 1);
    let (_, unused) = resolver()
        .resolve(dir.path().to_str().unwrap(), options)
        .unwrap();
    assert!(unused.is_empty());
}

#[test]
fn token_and_legacy_token_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let options = ResolveOptions::new()
        .token("hf_a")
        .set("use_auth_token", "hf_b");
    assert!(matches!(
        resolve(dir.path(), options),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn registered_model_type_is_resolved() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", r#"{"model_type": "acme-speech"}"#);
    write(dir.path(), "preprocessor_config.json", FEATURE_EXTRACTOR);

    let registry = Arc::new(ProcessorRegistry::new());
    registry
        .register(
            "acme-speech",
            Arc::new(ProcessorClass::new(
                "AcmeProcessor",
                &[Component::FeatureExtractor],
            )),
            false,
        )
        .unwrap();

    let (resolved, _) = ProcessorResolver::new(Arc::new(HubFetcher::default()))
        .with_registry(registry)
        .resolve(dir.path().to_str().unwrap(), ResolveOptions::default())
        .unwrap();
    assert_eq!(resolved.class_name(), Some("AcmeProcessor"));
}

#[test]
fn placeholder_class_reports_missing_backend() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "processor_config.json",
        r#"{"processor_class": "Wav2Vec2ProcessorWithLM"}"#,
    );
    let err = resolve(dir.path(), ResolveOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MissingDependency { .. }));
}

struct FakeLoader;

impl DynamicModuleLoader for FakeLoader {
    fn load(
        &self,
        reference: &str,
        _identifier: &str,
        _options: &ResolveOptions,
    ) -> sauti_core::Result<Arc<dyn ProcessorFactory>> {
        let class_name = reference.rsplit('.').next().unwrap_or(reference);
        Ok(Arc::new(ProcessorClass::new(
            class_name,
            &[Component::Tokenizer],
        )))
    }
}

fn remote_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "processor_config.json",
        r#"{"auto_map": {"AutoProcessor": "acme/shared--processing.RemoteProcessor"}}"#,
    );
    write(dir.path(), "vocab.json", CTC_VOCAB);
    dir
}

#[test]
fn trusted_remote_code_is_loaded_and_registered() {
    let dir = remote_repo();
    let resolver = resolver().with_loader(Arc::new(FakeLoader));

    let (resolved, _) = resolver
        .resolve(
            dir.path().to_str().unwrap(),
            ResolveOptions::new().trust_remote_code(true),
        )
        .unwrap();
    assert_eq!(resolved.class_name(), Some("RemoteProcessor"));
    assert!(resolver.registry().class_from_name("RemoteProcessor").is_some());
}

#[test]
fn remote_only_repository_requires_trust() {
    let dir = remote_repo();
    let err = resolver()
        .with_loader(Arc::new(FakeLoader))
        .resolve(dir.path().to_str().unwrap(), ResolveOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::UntrustedRemoteCode { .. }));
}

#[test]
fn declined_remote_code_falls_back() {
    let dir = remote_repo();
    let (resolved, _) = resolver()
        .with_loader(Arc::new(NoRemoteCode))
        .resolve(
            dir.path().to_str().unwrap(),
            ResolveOptions::new().trust_remote_code(false),
        )
        .unwrap();
    assert!(matches!(resolved, AutoProcessor::Tokenizer(_)));
}
