use chrono::{DateTime, Utc};
use serde::Serialize;

/// Réponse de GET /api/health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
    pub time: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(database_ok: bool) -> Self {
        Self {
            status: if database_ok { "ok" } else { "degraded" },
            database: if database_ok { "ok" } else { "unreachable" },
            version: env!("CARGO_PKG_VERSION"),
            time: Utc::now(),
        }
    }
}
