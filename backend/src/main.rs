mod auth;
mod classify;
mod config;
mod error;
mod inspection;
mod routes;
mod storage;
mod views;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use auth::CsrfService;
use classify::ModelRegistry;
use config::Config;
use routes::{AppServices, configure_routes};
use std::env;
use storage::UploadStore;

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, e);
    std::io::Error::other(format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let models = ModelRegistry::load(&config.model_dirs)
        .map_err(|e| startup_error("Model loading failed", e))?;

    let store = UploadStore::new(&config.upload_dir);
    store
        .ensure_root()
        .await
        .map_err(|e| startup_error("Upload directory unavailable", e))?;
    log::info!("Storing uploads in {}", store.root().display());

    let services = AppServices {
        models,
        store,
        csrf: CsrfService::new(&config.secret_key),
        max_upload_bytes: config.max_upload_bytes,
    };

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(|cfg| configure_routes(cfg, &services))
    })
    .bind(&bind_address)?
    .run()
    .await
}
