use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::info;

use predict_service::config::ServerConfig;
use predict_service::handlers;
use predict_service::inference::{OnnxClassifier, PredictionService};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;

    // Loaded exactly once; no request is served without it.
    let classifier = OnnxClassifier::load(&config.model_path)?;
    info!("Model loaded from {}", config.model_path.display());

    let service = web::Data::new(PredictionService::new(classifier));
    let variant = config.variant;

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(service.clone())
            .configure(handlers::configure(variant))
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    info!(
        "Serving {:?} variant at http://{}:{}",
        variant, config.host, config.port
    );
    server
        .bind((config.host.as_str(), config.port))
        .with_context(|| format!("could not bind {}:{}", config.host, config.port))?
        .run()
        .await?;
    Ok(())
}
