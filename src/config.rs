// Configuration chargée depuis l'environnement (.env via dotenv)

use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    /// Secret de dérivation de la clé partagée avec le firmware des sirènes
    pub sirene_token_secret: String,
    pub jwt_secret: String,
    pub log_format: LogFormat,
    pub cinetpay: CinetPayConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct CinetPayConfig {
    pub api_url: String,
    pub api_key: String,
    pub site_id: String,
    pub notify_url: String,
    /// Si présent, le header x-token des notifications est vérifié
    pub webhook_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(p) => p
                .parse::<u16>()
                .map_err(|_| AppError::Configuration(format!("Invalid PORT: {}", p)))?,
            Err(_) => 8080,
        };

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            sirene_token_secret: required("SIRENE_TOKEN_SECRET")?,
            jwt_secret: required("JWT_SECRET")?,
            log_format,
            cinetpay: CinetPayConfig {
                api_url: env::var("CINETPAY_API_URL")
                    .unwrap_or_else(|_| "https://api-checkout.cinetpay.com/v2/payment".to_string()),
                api_key: env::var("CINETPAY_API_KEY").unwrap_or_default(),
                site_id: env::var("CINETPAY_SITE_ID").unwrap_or_default(),
                notify_url: env::var("CINETPAY_NOTIFY_URL").unwrap_or_default(),
                webhook_secret: env::var("CINETPAY_WEBHOOK_SECRET")
                    .ok()
                    .filter(|s| !s.is_empty()),
            },
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Configuration(format!("{} must be set in .env file", key)))
}
