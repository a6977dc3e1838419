use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version string reported with every prediction.
pub const MODEL_VERSION: &str = "v1.0";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictRequest {
    pub features: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictResponse {
    pub prediction: i64,
    pub model_version: String,
}

impl PredictResponse {
    pub fn new(prediction: i64) -> Self {
        PredictResponse {
            prediction,
            model_version: MODEL_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorResponse {
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_version: &'static str,
}

/// Pulls the `features` value out of a leniently parsed body.
///
/// `None` covers every shape that should be answered with "Missing features":
/// an unparsable body, a non-object, an empty object or an object without the
/// key. The element types of `features` are left for inference to reject.
pub fn extract_features(body: Option<&Value>) -> Option<&Value> {
    match body? {
        Value::Object(map) if !map.is_empty() => map.get("features"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_carries_fixed_version() {
        let body = serde_json::to_value(PredictResponse::new(2)).unwrap();
        assert_eq!(body, json!({"prediction": 2, "model_version": "v1.0"}));
    }

    #[test]
    fn features_are_found_in_object() {
        let body = json!({"features": [1.0, "x"]});
        assert_eq!(extract_features(Some(&body)), Some(&json!([1.0, "x"])));
    }

    #[test]
    fn missing_shapes_yield_none() {
        assert!(extract_features(None).is_none());
        assert!(extract_features(Some(&json!({}))).is_none());
        assert!(extract_features(Some(&json!({"other": 1}))).is_none());
        assert!(extract_features(Some(&json!([1, 2, 3]))).is_none());
        assert!(extract_features(Some(&json!("features"))).is_none());
    }

    #[test]
    fn null_features_still_count_as_present() {
        let body = json!({"features": null});
        assert_eq!(extract_features(Some(&body)), Some(&Value::Null));
    }
}
