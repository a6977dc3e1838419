use ndarray::Array2;
use serde_json::Value;
use std::path::Path;
use tract_onnx::prelude::*;

use crate::error::{InferenceError, ModelLoadError};
use crate::models::PredictResponse;

/// Anything that maps a batch of feature vectors to one integer label per row.
///
/// Implementations are shared read-only between all server workers.
pub trait Classifier: Send + Sync {
    fn predict(&self, batch: &[Vec<f32>]) -> Result<Vec<i64>, InferenceError>;
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX classifier run through tract.
pub struct OnnxClassifier {
    plan: OnnxPlan,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self, ModelLoadError> {
        let path = model_path.as_ref();
        let plan = Self::build_plan(path).map_err(|e| ModelLoadError {
            path: path.to_path_buf(),
            message: format!("{e:#}"),
        })?;
        Ok(Self { plan })
    }

    fn build_plan(path: &Path) -> TractResult<OnnxPlan> {
        tract_onnx::onnx()
            .model_for_path(path)?
            .into_optimized()?
            .into_runnable()
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, batch: &[Vec<f32>]) -> Result<Vec<i64>, InferenceError> {
        let input = to_batch_array(batch)?;
        let (rows, cols) = input.dim();
        let tensor =
            Tensor::from_shape(&[rows, cols], &input.into_raw_vec()).map_err(engine_error)?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(engine_error)?;
        let first = outputs.first().ok_or(InferenceError::NoOutput)?;
        labels_from_output(first)
    }
}

fn engine_error(e: anyhow::Error) -> InferenceError {
    InferenceError::Engine(format!("{e:#}"))
}

/// Packs rows into a dense `(rows, cols)` matrix; every row must share the
/// first row's length.
pub fn to_batch_array(batch: &[Vec<f32>]) -> Result<Array2<f32>, InferenceError> {
    let expected = batch.first().ok_or(InferenceError::EmptyBatch)?.len();
    if let Some((row, found)) = batch
        .iter()
        .map(Vec::len)
        .enumerate()
        .find(|&(_, len)| len != expected)
    {
        return Err(InferenceError::RaggedBatch {
            row,
            expected,
            found,
        });
    }

    let flat: Vec<f32> = batch.iter().flatten().copied().collect();
    Array2::from_shape_vec((batch.len(), expected), flat)
        .map_err(|e| InferenceError::Engine(e.to_string()))
}

/// Turns the model's first output into integer labels.
///
/// Integer tensors are labels already. A rank-2 float tensor is read as
/// per-class scores and reduced by argmax; a rank-1 float tensor is truncated.
pub fn labels_from_output(output: &Tensor) -> Result<Vec<i64>, InferenceError> {
    match output.datum_type() {
        DatumType::I64 => Ok(output
            .to_array_view::<i64>()
            .map_err(engine_error)?
            .iter()
            .copied()
            .collect()),
        DatumType::I32 => Ok(output
            .to_array_view::<i32>()
            .map_err(engine_error)?
            .iter()
            .map(|&v| v as i64)
            .collect()),
        DatumType::F32 => {
            let view = output.to_array_view::<f32>().map_err(engine_error)?;
            match *view.shape() {
                [_] => Ok(view.iter().map(|&v| v as i64).collect()),
                [_, classes] if classes > 0 => {
                    let scores: Vec<f32> = view.iter().copied().collect();
                    Ok(scores.chunks(classes).map(argmax).collect())
                }
                _ => Err(InferenceError::UnsupportedOutput(format!(
                    "f32 with shape {:?}",
                    view.shape()
                ))),
            }
        }
        other => Err(InferenceError::UnsupportedOutput(format!("{other:?}"))),
    }
}

fn argmax(scores: &[f32]) -> i64 {
    scores
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index as i64)
        .unwrap_or_default()
}

/// Converts an untyped `features` value into a feature vector.
pub fn features_from_value(value: &Value) -> Result<Vec<f32>, InferenceError> {
    let items = value.as_array().ok_or(InferenceError::FeaturesNotArray)?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_f64()
                .map(|v| v as f32)
                .filter(|v| v.is_finite())
                .ok_or_else(|| InferenceError::InvalidFeature {
                    index,
                    value: item.to_string(),
                })
        })
        .collect()
}

/// Shared prediction path behind both HTTP variants.
pub struct PredictionService {
    classifier: Box<dyn Classifier>,
}

impl PredictionService {
    pub fn new<C: Classifier + 'static>(classifier: C) -> Self {
        Self {
            classifier: Box::new(classifier),
        }
    }

    pub fn predict_one(&self, features: &[f32]) -> Result<PredictResponse, InferenceError> {
        let batch = [features.to_vec()];
        let labels = self.classifier.predict(&batch)?;
        let label = labels.first().copied().ok_or(InferenceError::NoLabel)?;
        Ok(PredictResponse::new(label))
    }

    pub fn predict_value(&self, features: &Value) -> Result<PredictResponse, InferenceError> {
        let features = features_from_value(features)?;
        self.predict_one(&features)
    }
}
