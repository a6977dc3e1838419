//! Single-route prediction service over an ONNX classifier.
//!
//! The model is loaded once in `main`, before the server is built, and handed
//! to every worker as shared read-only [`inference::PredictionService`] state.
//! Two HTTP variants sit on top of that service, see [`config::Variant`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod models;
