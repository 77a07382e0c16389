use crate::error::PredictError;
use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::path::Path;

/// Prefix that torch's DataParallel wrapper prepends to every parameter name
/// when a model is saved from multi-device training.
pub const DATA_PARALLEL_PREFIX: &str = "module.";

/// Declared rename rule applied to parameter names before assignment. The
/// rule only fires when the whole name set matches, so checkpoints saved
/// with and without the wrapper load identically.
#[derive(Debug, Clone)]
pub struct RenameRule {
    prefix: String,
}

impl RenameRule {
    pub fn strip_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn applies_to<'a>(&self, names: impl Iterator<Item = &'a str>) -> bool {
        let mut any = false;
        for name in names {
            if !name.starts_with(&self.prefix) {
                return false;
            }
            any = true;
        }
        any
    }

    pub fn apply(&self, name: &str) -> String {
        name.strip_prefix(&self.prefix)
            .unwrap_or(name)
            .to_string()
    }
}

/// Normalizes a checkpoint's parameter names: strips the uniform
/// `module.` prefix when present, leaves everything else untouched.
/// Idempotent by construction.
pub fn normalize_keys(tensors: HashMap<String, Tensor>) -> HashMap<String, Tensor> {
    let rule = RenameRule::strip_prefix(DATA_PARALLEL_PREFIX);
    if !rule.applies_to(tensors.keys().map(String::as_str)) {
        return tensors;
    }

    tracing::debug!("Stripping {DATA_PARALLEL_PREFIX:?} prefix from parameter names");
    tensors
        .into_iter()
        .map(|(name, tensor)| (rule.apply(&name), tensor))
        .collect()
}

/// Reads a weights artifact into a `name -> tensor` map. PyTorch pickle
/// checkpoints (`.pt`/`.pth`) and `.safetensors` files are both accepted.
pub fn read_weights(path: &Path) -> Result<HashMap<String, Tensor>, PredictError> {
    if !path.is_file() {
        return Err(PredictError::WeightLoad(format!(
            "Weights file not found: {}",
            path.display()
        )));
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let tensors = match extension {
        "safetensors" => candle_core::safetensors::load(path, &Device::Cpu)
            .map_err(|e| PredictError::WeightLoad(e.to_string()))?,
        _ => candle_core::pickle::read_all(path)
            .map_err(|e| PredictError::WeightLoad(e.to_string()))?
            .into_iter()
            .collect(),
    };

    tracing::info!(
        "Loaded {} tensors from {}",
        tensors.len(),
        path.display()
    );
    Ok(tensors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn tensor_map(names: &[&str]) -> HashMap<String, Tensor> {
        names
            .iter()
            .map(|name| {
                let t = Tensor::zeros((1,), DType::F32, &Device::Cpu).unwrap();
                (name.to_string(), t)
            })
            .collect()
    }

    fn key_set(tensors: &HashMap<String, Tensor>) -> Vec<String> {
        let mut keys: Vec<String> = tensors.keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_normalize_strips_uniform_prefix() {
        let tensors = tensor_map(&["module.fc.weight", "module.fc.bias"]);
        let normalized = normalize_keys(tensors);

        assert_eq!(key_set(&normalized), vec!["fc.bias", "fc.weight"]);
    }

    #[test]
    fn test_normalize_leaves_unprefixed_names_untouched() {
        let tensors = tensor_map(&["fc.weight", "fc.bias"]);
        let normalized = normalize_keys(tensors);

        assert_eq!(key_set(&normalized), vec!["fc.bias", "fc.weight"]);
    }

    #[test]
    fn test_normalize_ignores_partial_prefix() {
        // A mixed name set means the prefix is part of the architecture,
        // not a wrapper artifact.
        let tensors = tensor_map(&["module.fc.weight", "conv1.weight"]);
        let normalized = normalize_keys(tensors);

        assert_eq!(key_set(&normalized), vec!["conv1.weight", "module.fc.weight"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_keys(tensor_map(&["module.fc.weight", "module.fc.bias"]));
        let twice = normalize_keys(once.clone());

        assert_eq!(key_set(&once), key_set(&twice));
    }

    #[test]
    fn test_rename_rule_does_not_apply_to_empty_set() {
        let rule = RenameRule::strip_prefix(DATA_PARALLEL_PREFIX);
        assert!(!rule.applies_to(std::iter::empty()));
    }

    #[test]
    fn test_read_weights_missing_file() {
        let err = read_weights(Path::new("/tmp/does_not_exist_weights.pt")).unwrap_err();
        assert!(err.to_string().contains("Weights file not found"));
    }
}
