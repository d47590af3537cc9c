//! Reading the flat tensor table of a fairseq checkpoint.

use candle_core::{Device, Tensor};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Loads `name → tensor` pairs from a PyTorch checkpoint (state dict under
/// `model`, as fairseq saves it) or from a safetensors file.
pub fn read_checkpoint(path: &Path) -> Result<Vec<(String, Tensor)>> {
    if !path.is_file() {
        return Err(Error::ModelNotFound(format!(
            "Checkpoint {} does not exist",
            path.display()
        )));
    }

    let is_safetensors = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("safetensors"));

    let mut tensors: Vec<(String, Tensor)> = if is_safetensors {
        candle_core::safetensors::load(path, &Device::Cpu)?
            .into_iter()
            .collect()
    } else {
        let nested = candle_core::pickle::read_all_with_key(path, Some("model"))
            .unwrap_or_default();
        if nested.is_empty() {
            debug!("No `model` entry in {}, reading top-level tensors", path.display());
            candle_core::pickle::read_all_with_key(path, None)?
        } else {
            nested
        }
    };

    if tensors.is_empty() {
        return Err(Error::ModelLoadError(format!(
            "No tensors found in {}",
            path.display()
        )));
    }

    // Conversion logs and reports follow checkpoint name order.
    tensors.sort_by(|a, b| a.0.cmp(&b.0));
    info!("Read {} tensors from {}", tensors.len(), path.display());
    Ok(tensors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use std::collections::HashMap;

    #[test]
    fn reads_safetensors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.safetensors");
        let tensors = HashMap::from([
            ("b".to_string(), Tensor::zeros(2, DType::F32, &Device::Cpu).unwrap()),
            ("a".to_string(), Tensor::ones((2, 3), DType::F32, &Device::Cpu).unwrap()),
        ]);
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let loaded = read_checkpoint(&path).unwrap();
        let names: Vec<&str> = loaded.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(loaded[0].1.dims(), &[2, 3]);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_checkpoint(Path::new("/no/such/checkpoint.pt")).unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(_)));
    }
}
