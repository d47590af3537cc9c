//! Processor classes and the registry that maps names and model types to them.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::info;

use super::mapping::{
    builtin_components, is_builtin_class, processor_class_for_model_type, PLACEHOLDER_CLASSES,
    PROCESSOR_MAPPING_NAMES,
};
use crate::error::{Error, Result};
use crate::processing::{Component, LoadContext, Processor};

/// Something that can build a [`Processor`] from a model repository.
pub trait ProcessorFactory: Send + Sync {
    fn class_name(&self) -> &str;

    fn from_pretrained(
        &self,
        ctx: &LoadContext<'_>,
        overrides: &mut Map<String, Value>,
    ) -> Result<Processor>;
}

/// A processor class described by the components it bundles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorClass {
    name: String,
    components: Vec<Component>,
    missing_dependency: Option<&'static str>,
}

impl ProcessorClass {
    pub fn new(name: impl Into<String>, components: &[Component]) -> Self {
        Self {
            name: name.into(),
            components: components.to_vec(),
            missing_dependency: None,
        }
    }

    fn placeholder(name: &str, dependency: &'static str) -> Self {
        Self {
            name: name.to_string(),
            components: builtin_components(name).to_vec(),
            missing_dependency: Some(dependency),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }
}

impl ProcessorFactory for ProcessorClass {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn from_pretrained(
        &self,
        ctx: &LoadContext<'_>,
        overrides: &mut Map<String, Value>,
    ) -> Result<Processor> {
        if let Some(dependency) = self.missing_dependency {
            return Err(Error::MissingDependency {
                class_name: self.name.clone(),
                dependency: dependency.to_string(),
            });
        }
        Processor::from_pretrained(&self.name, &self.components, ctx, overrides)
    }
}

fn builtin_classes() -> &'static HashMap<&'static str, Arc<ProcessorClass>> {
    static BUILTIN: OnceLock<HashMap<&'static str, Arc<ProcessorClass>>> = OnceLock::new();
    BUILTIN.get_or_init(|| {
        PROCESSOR_MAPPING_NAMES
            .iter()
            .map(|(_, class)| {
                let processor_class = ProcessorClass::new(*class, builtin_components(class));
                (*class, Arc::new(processor_class))
            })
            .collect()
    })
}

/// Runtime extensions on top of the built-in table.
#[derive(Default)]
pub struct ProcessorRegistry {
    by_model_type: RwLock<HashMap<String, Arc<dyn ProcessorFactory>>>,
    by_name: RwLock<HashMap<String, Arc<dyn ProcessorFactory>>>,
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model_types: Vec<String> = self
            .by_model_type
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("ProcessorRegistry")
            .field("model_types", &model_types)
            .finish()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`super::AutoProcessor`].
    pub fn global() -> Arc<ProcessorRegistry> {
        static GLOBAL: OnceLock<Arc<ProcessorRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ProcessorRegistry::new())).clone()
    }

    /// Maps `model_type` to `factory`.
    ///
    /// Model types already present, built-in or registered, are only replaced
    /// when `exist_ok` is set.
    pub fn register(
        &self,
        model_type: &str,
        factory: Arc<dyn ProcessorFactory>,
        exist_ok: bool,
    ) -> Result<()> {
        let mut by_model_type = self
            .by_model_type
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let taken = processor_class_for_model_type(model_type).is_some()
            || by_model_type.contains_key(model_type);
        if taken && !exist_ok {
            return Err(Error::InvalidInput(format!(
                "'{model_type}' is already used by a processor class, pass exist_ok to replace it"
            )));
        }
        info!(
            "Registered processor {} for model type {model_type}",
            factory.class_name()
        );
        by_model_type.insert(model_type.to_string(), factory.clone());
        drop(by_model_type);
        self.register_class(factory);
        Ok(())
    }

    /// Makes `factory` resolvable by class name.
    pub fn register_class(&self, factory: Arc<dyn ProcessorFactory>) {
        self.by_name
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(factory.class_name().to_string(), factory);
    }

    /// Class name → factory: built-in table, then registered classes, then
    /// placeholders for classes whose backend is unavailable.
    pub fn class_from_name(&self, class_name: &str) -> Option<Arc<dyn ProcessorFactory>> {
        if is_builtin_class(class_name) {
            if let Some(class) = builtin_classes().get(class_name) {
                return Some(class.clone() as Arc<dyn ProcessorFactory>);
            }
        }

        if let Some(factory) = self
            .by_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
        {
            return Some(factory.clone());
        }

        PLACEHOLDER_CLASSES
            .iter()
            .find(|(name, _)| *name == class_name)
            .map(|(name, dependency)| {
                Arc::new(ProcessorClass::placeholder(name, dependency)) as Arc<dyn ProcessorFactory>
            })
    }

    /// Factory for a model type, registered entries first.
    pub fn for_model_type(&self, model_type: &str) -> Option<Arc<dyn ProcessorFactory>> {
        if let Some(factory) = self
            .by_model_type
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model_type)
        {
            return Some(factory.clone());
        }
        let class_name = processor_class_for_model_type(model_type)?;
        builtin_classes()
            .get(class_name)
            .map(|class| class.clone() as Arc<dyn ProcessorFactory>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_by_name_and_type() {
        let registry = ProcessorRegistry::new();
        let by_name = registry.class_from_name("CLIPProcessor").unwrap();
        assert_eq!(by_name.class_name(), "CLIPProcessor");

        let by_type = registry.for_model_type("groupvit").unwrap();
        assert_eq!(by_type.class_name(), "CLIPProcessor");

        assert!(registry.class_from_name("NoSuchProcessor").is_none());
        assert!(registry.for_model_type("no_such_type").is_none());
    }

    #[test]
    fn register_rejects_taken_model_type() {
        let registry = ProcessorRegistry::new();
        let custom = Arc::new(ProcessorClass::new("CustomProcessor", &[Component::Tokenizer]));

        assert!(registry.register("clip", custom.clone(), false).is_err());
        registry.register("custom", custom.clone(), false).unwrap();
        assert!(registry.register("custom", custom.clone(), false).is_err());
        registry.register("custom", custom, true).unwrap();

        assert_eq!(
            registry.for_model_type("custom").unwrap().class_name(),
            "CustomProcessor"
        );
        assert!(registry.class_from_name("CustomProcessor").is_some());
    }

    #[test]
    fn placeholder_reports_missing_dependency() {
        let registry = ProcessorRegistry::new();
        let class = registry.class_from_name("Wav2Vec2ProcessorWithLM").unwrap();

        let fetcher = crate::hub::HubFetcher::default();
        let opts = crate::config::ResolveOptions::default();
        let ctx = LoadContext::new(&fetcher, "/nowhere", &opts);
        let err = class.from_pretrained(&ctx, &mut Map::new()).unwrap_err();
        assert!(matches!(err, Error::MissingDependency { .. }));
        assert!(err.to_string().contains("pyctcdecode"));
    }
}
