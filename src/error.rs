use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Usage: {0} <image_path>")]
    Usage(String),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: String,
        source: image::ImageError,
    },
    #[error("Failed to load class map {path}: {reason}")]
    ClassMap { path: String, reason: String },
    #[error("Failed to load weights: {0}")]
    WeightLoad(String),
    #[error("Weight shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Inference failed: {0}")]
    Inference(#[from] candle_core::Error),
    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}
