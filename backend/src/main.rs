mod config;
mod errors;
mod inference;
mod routes;
mod upload;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use config::{CorsPolicy, ServerConfig};
use inference::config::ModelManifest;
use inference::model::TorchScriptModel;
use inference::predictor::Predictor;
use routes::{UploadLimits, configure_routes};
use std::env;
use std::sync::Arc;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

fn build_cors(policy: &CorsPolicy) -> Cors {
    match policy {
        CorsPolicy::AnyOrigin => Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600),
        CorsPolicy::AllowList(origins) => origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = ServerConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    if let Some(threads) = config.torch_threads {
        tch::set_num_threads(threads);
        log::info!("Torch intra-op threads capped at {}", threads);
    }

    let manifest = ModelManifest::load(&config.manifest_path)
        .map_err(|e| startup_error("Failed to load model manifest", e))?;
    let model = TorchScriptModel::load(&config.model_path)
        .map_err(|e| startup_error("Failed to load model at startup", e))?;

    let predictor = Predictor::new(Arc::new(model), manifest);
    predictor
        .warm_up()
        .map_err(|e| startup_error("Model does not match its manifest", e))?;
    log::info!("Serving labels in order: {:?}", predictor.labels());

    let predictor = web::Data::new(predictor);
    let limits = web::Data::new(UploadLimits {
        max_bytes: config.max_upload_bytes,
        max_pixels: config.max_image_pixels,
    });
    let cors_policy = config.cors.clone();
    match &cors_policy {
        CorsPolicy::AnyOrigin => log::warn!("CORS allows any origin"),
        CorsPolicy::AllowList(origins) => log::info!("CORS allowed origins: {:?}", origins),
    }

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(build_cors(&cors_policy))
            .app_data(predictor.clone())
            .app_data(limits.clone())
            .configure(configure_routes)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await
}
