use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Health status derived from the top label's text, not from a model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Infected,
}

impl Status {
    /// Labeling-convention dependency: a class is reported healthy iff its
    /// label contains the case-insensitive substring "healthy". A disease
    /// class named outside the `*healthy*` convention is reported infected
    /// regardless of true state, and vice versa. Kept as-is for
    /// compatibility with the backend and the training-time label naming.
    pub fn from_label(label: &str) -> Self {
        if label.to_lowercase().contains("healthy") {
            Status::Healthy
        } else {
            Status::Infected
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub disease: String,
    pub confidence: f64,
    pub status: Status,
    pub predictions: Vec<Prediction>,
}

/// Top-K selection over the full-precision distribution: descending
/// probability, ties broken by the lowest class index, truncated to
/// `min(k, len)`.
pub fn rank_top_k(probabilities: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k.min(probabilities.len()));
    ranked
}

/// Output-representation rounding only; ranking happens at full precision.
pub fn round_confidence(probability: f32) -> f64 {
    (probability as f64 * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_top_k_orders_by_descending_probability() {
        let ranked = rank_top_k(&[0.1, 0.7, 0.2], 3);
        assert_eq!(ranked, vec![(1, 0.7), (2, 0.2), (0, 0.1)]);
    }

    #[test]
    fn test_rank_top_k_breaks_ties_by_lowest_index() {
        let ranked = rank_top_k(&[0.25, 0.25, 0.5], 3);
        assert_eq!(ranked, vec![(2, 0.5), (0, 0.25), (1, 0.25)]);
    }

    #[test]
    fn test_rank_top_k_truncates_to_class_count() {
        let ranked = rank_top_k(&[0.6, 0.4], 3);
        assert_eq!(ranked.len(), 2);

        let ranked = rank_top_k(&[0.1, 0.2, 0.3, 0.4], 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0], (3, 0.4));
    }

    #[test]
    fn test_round_confidence_four_decimals() {
        assert_eq!(round_confidence(0.94321868), 0.9432);
        assert_eq!(round_confidence(0.00006), 0.0001);
        assert_eq!(round_confidence(1.0), 1.0);
    }

    #[test]
    fn test_status_from_label_is_case_insensitive() {
        assert_eq!(Status::from_label("Tomato___healthy"), Status::Healthy);
        assert_eq!(Status::from_label("Pepper__bell___HEALTHY"), Status::Healthy);
        assert_eq!(Status::from_label("Tomato___Late_blight"), Status::Infected);
        assert_eq!(Status::from_label("class_7"), Status::Infected);
    }

    #[test]
    fn test_report_serializes_to_contract_shape() {
        let report = PredictionReport {
            disease: "Tomato___Late_blight".to_string(),
            confidence: 0.9432,
            status: Status::Infected,
            predictions: vec![Prediction {
                label: "Tomato___Late_blight".to_string(),
                confidence: 0.9432,
            }],
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["disease"], "Tomato___Late_blight");
        assert_eq!(value["confidence"], 0.9432);
        assert_eq!(value["status"], "infected");
        assert_eq!(value["predictions"][0]["label"], "Tomato___Late_blight");
        assert_eq!(value["predictions"][0]["confidence"], 0.9432);
    }
}
