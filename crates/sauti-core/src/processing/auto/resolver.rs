//! `AutoProcessor`: picks and instantiates the right processing class for a
//! model repository.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::probe::probe_repository;
use super::registry::{ProcessorFactory, ProcessorRegistry};
use super::trust::{DefaultTrustPolicy, DynamicModuleLoader, NoRemoteCode, TrustPolicy, TrustRequest};
use crate::config::ResolveOptions;
use crate::error::{Error, Result};
use crate::hub::{FileFetcher, HubFetcher};
use crate::processing::{FeatureExtractor, ImageProcessor, LoadContext, Processor, Tokenizer};

/// Whatever the resolver managed to build.
#[derive(Debug)]
pub enum AutoProcessor {
    Processor(Processor),
    Tokenizer(Tokenizer),
    ImageProcessor(ImageProcessor),
    FeatureExtractor(FeatureExtractor),
}

impl AutoProcessor {
    /// Resolves with the hub fetcher, no remote code and the global registry.
    pub fn from_pretrained(identifier: &str, options: ResolveOptions) -> Result<Self> {
        ProcessorResolver::default()
            .resolve(identifier, options)
            .map(|(processor, _)| processor)
    }

    /// Like [`AutoProcessor::from_pretrained`], also returning the overrides no
    /// component consumed.
    pub fn from_pretrained_with_unused(
        identifier: &str,
        options: ResolveOptions,
    ) -> Result<(Self, Map<String, Value>)> {
        ProcessorResolver::default().resolve(identifier, options.return_unused_kwargs(true))
    }

    /// Adds a processor for `model_type` to the global registry.
    pub fn register(
        model_type: &str,
        factory: Arc<dyn ProcessorFactory>,
        exist_ok: bool,
    ) -> Result<()> {
        ProcessorRegistry::global().register(model_type, factory, exist_ok)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AutoProcessor::Processor(_) => "processor",
            AutoProcessor::Tokenizer(_) => "tokenizer",
            AutoProcessor::ImageProcessor(_) => "image_processor",
            AutoProcessor::FeatureExtractor(_) => "feature_extractor",
        }
    }

    /// Class name of the built object, when it records one.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            AutoProcessor::Processor(p) => Some(&p.class_name),
            AutoProcessor::Tokenizer(t) => t.class_name(),
            AutoProcessor::ImageProcessor(ip) => ip.image_processor_type.as_deref(),
            AutoProcessor::FeatureExtractor(fe) => fe.feature_extractor_type.as_deref(),
        }
    }

    pub fn as_processor(&self) -> Option<&Processor> {
        match self {
            AutoProcessor::Processor(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for AutoProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class_name() {
            Some(name) => write!(f, "{} ({name})", self.kind()),
            None => f.write_str(self.kind()),
        }
    }
}

/// The resolver with its collaborators.
pub struct ProcessorResolver {
    fetcher: Arc<dyn FileFetcher>,
    loader: Arc<dyn DynamicModuleLoader>,
    policy: Arc<dyn TrustPolicy>,
    registry: Arc<ProcessorRegistry>,
}

impl Default for ProcessorResolver {
    fn default() -> Self {
        Self {
            fetcher: Arc::new(HubFetcher::default()),
            loader: Arc::new(NoRemoteCode),
            policy: Arc::new(DefaultTrustPolicy),
            registry: ProcessorRegistry::global(),
        }
    }
}

impl ProcessorResolver {
    pub fn new(fetcher: Arc<dyn FileFetcher>) -> Self {
        Self {
            fetcher,
            ..Self::default()
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn DynamicModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn TrustPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_registry(mut self, registry: Arc<ProcessorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<ProcessorRegistry> {
        &self.registry
    }

    /// Returns the built object and the overrides left unused.
    pub fn resolve(
        &self,
        identifier: &str,
        options: ResolveOptions,
    ) -> Result<(AutoProcessor, Map<String, Value>)> {
        let mut options = options.normalize()?;
        let mut overrides = std::mem::take(&mut options.overrides);
        let ctx = LoadContext::new(self.fetcher.as_ref(), identifier, &options);

        let declared = probe_repository(&ctx)?;
        let class = declared
            .class_name
            .as_deref()
            .and_then(|name| self.registry.class_from_name(name));
        let mapped = declared
            .model_type
            .as_deref()
            .and_then(|model_type| self.registry.for_model_type(model_type));

        if let Some(reference) = declared.remote_reference.as_deref() {
            let has_local_code = class.is_some() || mapped.is_some();
            let request = TrustRequest::new(
                options.trust_remote_code,
                identifier,
                has_local_code,
                reference,
            );
            if self.policy.resolve(&request)? {
                info!("Loading remote processor code {reference} for {identifier}");
                let factory = self.loader.load(reference, identifier, &options)?;
                self.registry.register_class(factory.clone());
                let processor = factory.from_pretrained(&ctx, &mut overrides)?;
                return Ok(finish(AutoProcessor::Processor(processor), overrides, &options));
            }
        }

        if let Some(factory) = class.or(mapped) {
            info!("Loading {} for {identifier}", factory.class_name());
            let processor = factory.from_pretrained(&ctx, &mut overrides)?;
            return Ok(finish(AutoProcessor::Processor(processor), overrides, &options));
        }

        if let Some(name) = &declared.class_name {
            debug!("Processor class {name} declared by {identifier} is not available");
        }

        let (processor, remaining) = self.fallback(&ctx, &overrides)?;
        Ok(finish(processor, remaining, &options))
    }

    /// Tokenizer, then image processor, then feature extractor. Each attempt
    /// gets its own copy of the overrides.
    fn fallback(
        &self,
        ctx: &LoadContext<'_>,
        overrides: &Map<String, Value>,
    ) -> Result<(AutoProcessor, Map<String, Value>)> {
        let mut attempt = overrides.clone();
        match Tokenizer::from_pretrained(ctx, &mut attempt) {
            Ok(tokenizer) => return Ok((AutoProcessor::Tokenizer(tokenizer), attempt)),
            Err(e) => debug!("No tokenizer for {}: {e}", ctx.identifier),
        }

        let mut attempt = overrides.clone();
        match ImageProcessor::from_pretrained_declared(ctx, &mut attempt) {
            Ok(processor) => return Ok((AutoProcessor::ImageProcessor(processor), attempt)),
            Err(e) => debug!("No image processor for {}: {e}", ctx.identifier),
        }

        let mut attempt = overrides.clone();
        match FeatureExtractor::from_pretrained_declared(ctx, &mut attempt) {
            Ok(extractor) => return Ok((AutoProcessor::FeatureExtractor(extractor), attempt)),
            Err(e) => debug!("No feature extractor for {}: {e}", ctx.identifier),
        }

        Err(Error::UnrecognizedProcessor {
            identifier: ctx.identifier.to_string(),
        })
    }
}

fn finish(
    processor: AutoProcessor,
    unused: Map<String, Value>,
    options: &ResolveOptions,
) -> (AutoProcessor, Map<String, Value>) {
    if !options.return_unused_kwargs && !unused.is_empty() {
        let keys: Vec<&String> = unused.keys().collect();
        debug!("Ignoring overrides that match no attribute: {keys:?}");
        return (processor, Map::new());
    }
    (processor, unused)
}
