//! Automatic processor resolution.
//!
//! A repository is probed for a declared processor class, falling back to
//! the static model-type table and finally to standalone tokenizers, image
//! processors and feature extractors.

pub mod mapping;
pub mod probe;
pub mod registry;
pub mod resolver;
pub mod trust;

pub use mapping::PROCESSOR_MAPPING_NAMES;
pub use probe::{ConfigProbe, DeclaredProcessor};
pub use registry::{ProcessorClass, ProcessorFactory, ProcessorRegistry};
pub use resolver::{AutoProcessor, ProcessorResolver};
pub use trust::{DefaultTrustPolicy, DynamicModuleLoader, NoRemoteCode, TrustPolicy, TrustRequest};
