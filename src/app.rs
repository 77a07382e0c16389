use crate::config::Settings;
use crate::engine;
use crate::error::PredictError;
use std::path::Path;

const PROGRAM_NAME: &str = "plant_prediction";

/// Process boundary: every failure, whatever its origin, is translated into
/// a single `{"error": ...}` line on stdout and a non-zero exit code, so the
/// caller always reads exactly one JSON object.
pub fn run(args: &[String]) -> i32 {
    match execute(args) {
        Ok(line) => {
            println!("{line}");
            0
        }
        Err(err) => {
            let message = err.to_string();
            tracing::error!("Prediction failed: {message}");
            println!("{}", serde_json::json!({ "error": message }));
            1
        }
    }
}

fn execute(args: &[String]) -> Result<String, PredictError> {
    let image_path = parse_args(args)?;
    if !image_path.is_file() {
        return Err(PredictError::FileNotFound(image_path.display().to_string()));
    }

    let settings = Settings::discover()?;
    let report = engine::predict(&settings, &image_path)?;
    Ok(serde_json::to_string(&report)?)
}

fn parse_args(args: &[String]) -> Result<&Path, PredictError> {
    match args {
        [_, image_path] => Ok(Path::new(image_path)),
        _ => Err(PredictError::Usage(PROGRAM_NAME.to_string())),
    }
}
