use crate::class_map::ClassMap;
use crate::config::Settings;
use crate::error::PredictError;
use crate::model::load_model;
use crate::prediction::{rank_top_k, round_confidence, Prediction, PredictionReport, Status};
use crate::preprocess::preprocess;
use candle_core::D;
use std::path::Path;

/// Runs the full pipeline for one image: class map -> model -> preprocess ->
/// forward -> softmax -> top-K -> report. Everything is loaded fresh; no
/// state survives the invocation.
pub fn predict(settings: &Settings, image_path: &Path) -> Result<PredictionReport, PredictError> {
    let class_map = ClassMap::load(&settings.class_map_file)?;
    let model = load_model(&settings.weights_file, class_map.len())?;

    let input = preprocess(image_path)?;
    let logits = model.forward(&input)?;
    let probabilities = candle_nn::ops::softmax(&logits, D::Minus1)?
        .squeeze(0)?
        .to_vec1::<f32>()?;

    let ranked = rank_top_k(&probabilities, settings.top_k());
    tracing::debug!(
        "Top prediction: class {} at {:.4}",
        ranked[0].0,
        ranked[0].1
    );

    let predictions: Vec<Prediction> = ranked
        .into_iter()
        .map(|(index, probability)| Prediction {
            label: class_map.label_or_placeholder(index),
            confidence: round_confidence(probability),
        })
        .collect();

    // The class map is never empty, so there is always a top record.
    let disease = predictions[0].label.clone();
    let confidence = predictions[0].confidence;
    Ok(PredictionReport {
        status: Status::from_label(&disease),
        disease,
        confidence,
        predictions,
    })
}
