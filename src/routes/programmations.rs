use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthAccount;
use crate::models::dto::{
    CreateProgrammationRequest, PlanningQuery, ProgrammationResponse, UpdateProgrammationRequest,
};
use crate::services::programmation::encodeur::ChargeUtile;
use crate::services::programmation_service::ProgrammationService;
use crate::utils::crypto::SireneCipher;

#[derive(Debug, Deserialize)]
pub struct ProgrammationFilter {
    pub sirene_id: Option<i32>,
}

/// POST /api/programmations - Nouveau planning, compilé immédiatement
#[post("")]
pub async fn create_programmation(
    auth: AuthAccount,
    body: web::Json<CreateProgrammationRequest>,
    db: web::Data<DatabaseConnection>,
    cipher: web::Data<SireneCipher>,
) -> Result<HttpResponse, AppError> {
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;

    let programmation =
        ProgrammationService::creer(db.get_ref(), cipher.get_ref(), &auth.scope(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ProgrammationResponse::from_model(programmation)?))
}

/// GET /api/programmations?sirene_id=
#[get("")]
pub async fn list_programmations(
    auth: AuthAccount,
    query: web::Query<ProgrammationFilter>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let programmations = ProgrammationService::lister(db.get_ref(), &auth.scope(), query.sirene_id).await?;
    let reponses = programmations
        .into_iter()
        .map(ProgrammationResponse::from_model)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HttpResponse::Ok().json(reponses))
}

/// GET /api/programmations/{id}
#[get("/{id}")]
pub async fn get_programmation(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let programmation = ProgrammationService::obtenir(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ProgrammationResponse::from_model(programmation)?))
}

/// PUT /api/programmations/{id} - Modification partielle, régénère la chaîne
#[put("/{id}")]
pub async fn update_programmation(
    auth: AuthAccount,
    path: web::Path<i32>,
    body: web::Json<UpdateProgrammationRequest>,
    db: web::Data<DatabaseConnection>,
    cipher: web::Data<SireneCipher>,
) -> Result<HttpResponse, AppError> {
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;

    let programmation = ProgrammationService::modifier(
        db.get_ref(),
        cipher.get_ref(),
        &auth.scope(),
        path.into_inner(),
        body.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(ProgrammationResponse::from_model(programmation)?))
}

/// POST /api/programmations/{id}/regenerer
#[post("/{id}/regenerer")]
pub async fn regenerate_programmation(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    cipher: web::Data<SireneCipher>,
) -> Result<HttpResponse, AppError> {
    let programmation =
        ProgrammationService::regenerer(db.get_ref(), cipher.get_ref(), &auth.scope(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ProgrammationResponse::from_model(programmation)?))
}

/// DELETE /api/programmations/{id}
#[delete("/{id}")]
pub async fn delete_programmation(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    ProgrammationService::supprimer(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/programmations/{id}/planning?date=YYYY-MM-DD - Sonneries du jour
#[get("/{id}/planning")]
pub async fn get_planning(
    auth: AuthAccount,
    path: web::Path<i32>,
    query: web::Query<PlanningQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let sonneries =
        ProgrammationService::planning(db.get_ref(), &auth.scope(), path.into_inner(), query.date).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "date": query.date,
        "sonneries": sonneries,
    })))
}

/// GET /api/programmations/{id}/decoder (admin) - Relit la chaîne comme le firmware
#[get("/{id}/decoder")]
pub async fn decode_programmation(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    cipher: web::Data<SireneCipher>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let programmation = ProgrammationService::obtenir(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    let charge = ChargeUtile::decoder(cipher.get_ref(), &programmation.chaine_cryptee)?;
    Ok(HttpResponse::Ok().json(charge))
}

pub fn programmations_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/programmations")
            .service(create_programmation)
            .service(list_programmations)
            .service(get_programmation)
            .service(update_programmation)
            .service(regenerate_programmation)
            .service(delete_programmation)
            .service(get_planning)
            .service(decode_programmation)
    );
}
