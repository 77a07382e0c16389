use crate::error::PredictError;
use std::collections::BTreeMap;
use std::path::Path;

/// Fixed index -> disease label lookup table. The backing artifact is a JSON
/// object whose keys are decimal strings ("0", "1", ...); keys are converted
/// to integers on load since every downstream lookup is by class index.
#[derive(Debug, Clone)]
pub struct ClassMap {
    labels: BTreeMap<usize, String>,
}

impl ClassMap {
    pub fn load(path: &Path) -> Result<Self, PredictError> {
        let class_map_err = |reason: String| PredictError::ClassMap {
            path: path.display().to_string(),
            reason,
        };

        let bytes = std::fs::read(path)
            .map_err(|e| class_map_err(e.to_string()))?;
        let raw: BTreeMap<String, String> =
            serde_json::from_slice(&bytes).map_err(|e| class_map_err(e.to_string()))?;

        let mut labels = BTreeMap::new();
        for (key, label) in raw {
            let index: usize = key
                .trim()
                .parse()
                .map_err(|_| class_map_err(format!("key is not an integer index: {key:?}")))?;
            labels.insert(index, label);
        }

        if labels.is_empty() {
            return Err(class_map_err("class map is empty".to_string()));
        }
        if *labels.keys().last().unwrap_or(&0) != labels.len() - 1 {
            tracing::warn!(
                "Class map indices are not contiguous from 0 to {}",
                labels.len() - 1
            );
        }

        tracing::debug!("Loaded {} class labels", labels.len());
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    /// Guarded lookup: an index outside the map yields a synthesized
    /// placeholder instead of a failure.
    pub fn label_or_placeholder(&self, index: usize) -> String {
        match self.label(index) {
            Some(label) => label.to_string(),
            None => format!("class_{index}"),
        }
    }
}
