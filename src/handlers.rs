use actix_cors::Cors;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::Method;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use futures_util::StreamExt;
use log::{error, warn};
use serde_json::Value;

use crate::config::Variant;
use crate::error::ApiError;
use crate::inference::PredictionService;
use crate::models::{
    extract_features, HealthResponse, PredictRequest, PredictResponse, MODEL_VERSION,
};

/// Largest request body either variant reads.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Registers the routes for the chosen variant.
pub fn configure(variant: Variant) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.route("/health", web::get().to(health));
        match variant {
            Variant::Web => {
                let cors = Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header();
                cfg.service(
                    web::resource("/predict")
                        .wrap(cors)
                        .app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
                        .route(web::post().to(predict)),
                );
            }
            Variant::Function => {
                cfg.service(
                    web::resource("/predict")
                        .route(web::method(Method::OPTIONS).to(preflight))
                        .default_service(web::to(function_predict)),
                );
            }
        }
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        model_version: MODEL_VERSION,
    })
}

/// `POST /predict` for the web variant. Malformed bodies never get here: the
/// JSON extractor answers them with its own 400.
pub async fn predict(
    service: web::Data<PredictionService>,
    req: web::Json<PredictRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = service.predict_one(&req.features).map_err(|e| {
        error!("Inference failed: {}", e);
        ApiError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(response))
}

/// CORS preflight for the function variant.
pub async fn preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .finish()
}

/// `/predict` for the function variant, any method but OPTIONS.
pub async fn function_predict(
    service: web::Data<PredictionService>,
    req: HttpRequest,
    payload: web::Payload,
) -> HttpResponse {
    let result = match read_body(payload).await {
        Ok(body) => predict_from_body(&service, &req, &body),
        Err(e) => {
            warn!("Rejected request body: {}", e);
            Err(e)
        }
    };

    let mut response = match result {
        Ok(prediction) => HttpResponse::Ok().json(prediction),
        Err(e) => e.error_response(),
    };
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

fn predict_from_body(
    service: &PredictionService,
    req: &HttpRequest,
    body: &[u8],
) -> Result<PredictResponse, ApiError> {
    let parsed = parse_json_body(req, body);
    match extract_features(parsed.as_ref()) {
        Some(features) => service.predict_value(features).map_err(|e| {
            error!("Inference failed: {}", e);
            ApiError::from(e)
        }),
        None => {
            warn!("Rejected request without features");
            Err(ApiError::MissingFeatures)
        }
    }
}

async fn read_body(mut payload: web::Payload) -> Result<web::BytesMut, ApiError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| ApiError::Payload(e.to_string()))?;
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(ApiError::PayloadTooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Silent JSON parse: a non-JSON content type or an unparsable body gives `None`.
fn parse_json_body(req: &HttpRequest, body: &[u8]) -> Option<Value> {
    if !is_json_mime(req.content_type()) {
        return None;
    }
    serde_json::from_slice(body).ok()
}

fn is_json_mime(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mime_detection() {
        assert!(is_json_mime("application/json"));
        assert!(is_json_mime("Application/JSON"));
        assert!(is_json_mime("application/vnd.api+json"));
        assert!(!is_json_mime("text/plain"));
        assert!(!is_json_mime(""));
    }
}
