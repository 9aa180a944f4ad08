use actix_web::{web, App, HttpServer};
use log::{error, info};
use std::io;
use std::sync::Arc;

use renju::config::ServerConfig;
use renju::models::AppState;
use renju::routes::configure_routes;
use renju::store::JsonFileStore;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::load_or_default(&ServerConfig::path_from_env())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let store = JsonFileStore::open(&config.data_dir)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    // Create shared application state
    let app_state = web::Data::new(AppState::new(Arc::new(store), config.store_timeout()));

    // Games whose last save failed stay cached until a retry succeeds.
    let retry_state = app_state.clone();
    let retry_every = config.flush_retry_interval();
    actix_rt::spawn(async move {
        let mut interval = actix_rt::time::interval(retry_every);
        loop {
            interval.tick().await;
            let evicted = retry_state.cache.flush_idle().await;
            if evicted > 0 {
                info!("Saved and evicted {} idle games", evicted);
            }
        }
    });

    info!("Starting renju server at http://{}", config.bind_address);

    let static_dir = config.static_dir.clone();
    HttpServer::new(move || {
        let static_dir = static_dir.clone();
        App::new()
            .app_data(app_state.clone())
            .configure(move |cfg| configure_routes(cfg, &static_dir))
    })
    .bind(&config.bind_address)
    .map_err(|e| {
        error!("Cannot bind {}: {}", config.bind_address, e);
        e
    })?
    .run()
    .await
}
