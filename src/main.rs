mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod schema;
mod services;
mod utils;

use std::io;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LogFormat};
use crate::services::payment_gateway::{CinetPayGateway, PaymentGateway};
use crate::utils::crypto::SireneCipher;
use crate::utils::jwt::JwtKeys;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    init_logging(config.log_format);

    tracing::info!("connecting to database");
    let db = db::establish_connection(&config)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string()))?;
    schema::create_schema(&db)
        .await
        .map_err(|e| io::Error::other(format!("schema creation failed: {}", e)))?;
    tracing::info!("database ready");

    let db = web::Data::new(db);
    let cipher = web::Data::new(SireneCipher::new(&config.sirene_token_secret));
    let jwt_keys = web::Data::new(JwtKeys::new(&config.jwt_secret));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(CinetPayGateway::new(config.cinetpay.clone()));
    let gateway = web::Data::new(gateway);

    let bind = (config.bind_address.clone(), config.port);
    let config = web::Data::new(config);

    tracing::info!(address = %bind.0, port = bind.1, "starting server");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(cipher.clone())
            .app_data(jwt_keys.clone())
            .app_data(gateway.clone())
            .app_data(config.clone())
            .configure(routes::configure_routes)
    })
        .bind(bind)?
        .run()
        .await
}
