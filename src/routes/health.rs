use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::models::health::HealthResponse;

/// GET /api/health - État du service et de la base
#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let database_ok = match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "database ping failed");
            false
        }
    };

    let response = HealthResponse::new(database_ok);
    if database_ok {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
