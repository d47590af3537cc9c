//! Named parameter slots of a destination model.
//!
//! Paths are dotted names (`encoder.layers.3.attention.q_proj.weight`) held as
//! typed segments so numeric components are layer indices, not attributes.

use candle_core::{DType, Device, Tensor};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Name(String),
    Index(usize),
    /// `*` placeholder for a layer index
    Wildcard,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => f.write_str(name),
            Segment::Index(idx) => write!(f, "{idx}"),
            Segment::Wildcard => f.write_str("*"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamPath {
    segments: Vec<Segment>,
}

impl ParamPath {
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::Wildcard,
                _ => s
                    .parse::<usize>()
                    .map(Segment::Index)
                    .unwrap_or_else(|_| Segment::Name(s.to_string())),
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&Segment::Wildcard)
    }

    /// Replaces every `*` with `index`.
    pub fn with_index(&self, index: usize) -> Self {
        let segments = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Wildcard => Segment::Index(index),
                other => other.clone(),
            })
            .collect();
        Self { segments }
    }

    /// Appends a dotted suffix.
    pub fn join(&self, suffix: &str) -> Self {
        let mut joined = self.clone();
        joined.segments.extend(ParamPath::parse(suffix).segments);
        joined
    }
}

impl fmt::Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Slot {
    shape: Vec<usize>,
    value: Option<Tensor>,
}

/// Every parameter of a model, each with its expected shape and, once
/// loaded, its tensor.
#[derive(Debug, Clone, Default)]
pub struct ParameterTree {
    slots: BTreeMap<ParamPath, Slot>,
}

impl ParameterTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, path: &str, shape: &[usize]) {
        self.slots.insert(
            ParamPath::parse(path),
            Slot {
                shape: shape.to_vec(),
                value: None,
            },
        );
    }

    pub fn contains(&self, path: &ParamPath) -> bool {
        self.slots.contains_key(path)
    }

    pub fn shape(&self, path: &ParamPath) -> Option<&[usize]> {
        self.slots.get(path).map(|slot| slot.shape.as_slice())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, path: &ParamPath) -> Option<&Tensor> {
        self.slots.get(path).and_then(|slot| slot.value.as_ref())
    }

    /// Stores `value` at `path` after checking its shape. `source` names the
    /// checkpoint entry in error messages.
    pub fn assign(&mut self, path: &ParamPath, value: Tensor, source: &str) -> Result<()> {
        let slot = self.slots.get_mut(path).ok_or_else(|| {
            Error::ModelLoadError(format!("{path} does not exist in the model (from {source})"))
        })?;
        if slot.shape.as_slice() != value.dims() {
            return Err(Error::shape_mismatch(
                format!("{path} for {source}"),
                &slot.shape,
                value.dims(),
            ));
        }
        slot.value = Some(value);
        Ok(())
    }

    /// Paths that were declared but never assigned.
    pub fn missing(&self) -> Vec<&ParamPath> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.value.is_none())
            .map(|(path, _)| path)
            .collect()
    }

    /// Flattens into a name → tensor table. Unassigned norm weights become
    /// ones, every other unassigned slot zeros.
    pub fn into_tensors(self) -> Result<HashMap<String, Tensor>> {
        let missing = self.missing().len();
        if missing > 0 {
            warn!("{missing} parameters were not initialized from the checkpoint");
        }

        let mut tensors = HashMap::with_capacity(self.slots.len());
        for (path, slot) in self.slots {
            let name = path.to_string();
            let tensor = match slot.value {
                Some(tensor) => tensor,
                None if name.ends_with("norm.weight") => {
                    Tensor::ones(slot.shape.as_slice(), DType::F32, &Device::Cpu)?
                }
                None => Tensor::zeros(slot.shape.as_slice(), DType::F32, &Device::Cpu)?,
            };
            tensors.insert(name, tensor);
        }
        Ok(tensors)
    }
}
