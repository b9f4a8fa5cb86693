use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::middleware::SireneAuth;
use crate::models::dto::SirenePollResponse;
use crate::services::programmation_service::ProgrammationService;

/// GET /api/sirenes/programmation - Interrogation périodique du boîtier
///
/// Authentifié par X-Sirene-Token ; seules les programmations de l'école
/// abonnée sont servies. Sans programmation active : 404.
#[get("/programmation")]
pub async fn poll_programmation(
    auth: SireneAuth,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let sirene = &auth.0.sirene;
    let today = Utc::now().date_naive();

    let programmation =
        ProgrammationService::programmation_courante(db.get_ref(), &auth.0.abonnement, today).await?;

    tracing::debug!(
        sirene_id = sirene.id,
        programmation_id = programmation.id,
        version = programmation.version,
        "programmation served"
    );

    Ok(HttpResponse::Ok().json(SirenePollResponse {
        programmation_id: programmation.id,
        chaine_cryptee: programmation.chaine_cryptee,
        version: programmation.version,
        date_generation: programmation.date_generation,
        date_debut: programmation.date_debut,
        date_fin: programmation.date_fin,
    }))
}

pub fn sirenes_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/sirenes")
            .service(poll_programmation)
    );
}
