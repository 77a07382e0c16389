use crate::error::PredictError;
use std::path::{Path, PathBuf};

pub const WEIGHTS_FILE: &str = "plant_disease_model.pt";
pub const CLASS_MAP_FILE: &str = "class_names.json";

const DEFAULT_TOP_K: usize = 3;

/// Per-invocation settings, built once and threaded through the pipeline.
/// There are no config files or environment variables: the artifacts live
/// next to the executable, with the working directory as a fallback.
#[derive(Debug, Clone)]
pub struct Settings {
    pub weights_file: PathBuf,
    pub class_map_file: PathBuf,
    top_k: usize,
}

impl Settings {
    pub fn new(weights_file: PathBuf, class_map_file: PathBuf) -> Self {
        Self {
            weights_file,
            class_map_file,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn from_model_dir(dir: &Path) -> Self {
        Self::new(dir.join(WEIGHTS_FILE), dir.join(CLASS_MAP_FILE))
    }

    /// Clamped to at least 1: the report always mirrors a top record.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn discover() -> Result<Self, PredictError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf));

        let base = match exe_dir {
            Some(dir) if dir.join(WEIGHTS_FILE).is_file() => dir,
            _ => std::env::current_dir()?,
        };

        tracing::debug!("Loading model artifacts from {}", base.display());
        Ok(Self::from_model_dir(&base))
    }
}
