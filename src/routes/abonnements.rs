use std::sync::Arc;

use actix_web::{delete, get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthAccount;
use crate::models::dto::{AbonnementResponse, CreateAbonnementRequest};
use crate::services::abonnement_service::AbonnementService;
use crate::services::paiement_service::PaiementService;
use crate::services::payment_gateway::PaymentGateway;
use crate::services::token_service::TokenService;
use crate::utils::crypto::SireneCipher;

fn reponse(abonnement: crate::models::abonnement::Model) -> AbonnementResponse {
    AbonnementResponse::new(abonnement, Utc::now().date_naive())
}

/// GET /api/abonnements - Abonnements visibles par le compte
#[get("")]
pub async fn list_abonnements(
    auth: AuthAccount,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let abonnements = AbonnementService::lister(db.get_ref(), &auth.scope()).await?;
    let reponses: Vec<AbonnementResponse> = abonnements.into_iter().map(reponse).collect();
    Ok(HttpResponse::Ok().json(reponses))
}

/// POST /api/abonnements - Nouvel abonnement (en attente de paiement)
#[post("")]
pub async fn create_abonnement(
    auth: AuthAccount,
    body: web::Json<CreateAbonnementRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;
    if !auth.scope().covers_ecole(body.ecole_id) {
        return Err(AppError::Forbidden("Cannot subscribe for another school".to_string()));
    }

    let abonnement = AbonnementService::creer(db.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(reponse(abonnement)))
}

/// POST /api/abonnements/expirer - Passe en expiré les abonnements échus (admin)
#[post("/expirer")]
pub async fn expire_abonnements(
    auth: AuthAccount,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let today = Utc::now().date_naive();
    let expired = AbonnementService::expirer_abonnements(db.get_ref(), today).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "expired": expired, "date": today })))
}

/// GET /api/abonnements/{id}
#[get("/{id}")]
pub async fn get_abonnement(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let abonnement = AbonnementService::obtenir(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reponse(abonnement)))
}

/// POST /api/abonnements/{id}/activer (admin)
#[post("/{id}/activer")]
pub async fn activate_abonnement(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    cipher: web::Data<SireneCipher>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let abonnement = AbonnementService::activer(db.get_ref(), cipher.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reponse(abonnement)))
}

/// POST /api/abonnements/{id}/suspendre (admin)
#[post("/{id}/suspendre")]
pub async fn suspend_abonnement(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let abonnement = AbonnementService::suspendre(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reponse(abonnement)))
}

/// POST /api/abonnements/{id}/reactiver (admin)
#[post("/{id}/reactiver")]
pub async fn reactivate_abonnement(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    cipher: web::Data<SireneCipher>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let abonnement = AbonnementService::reactiver(db.get_ref(), cipher.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reponse(abonnement)))
}

/// POST /api/abonnements/{id}/annuler (admin)
#[post("/{id}/annuler")]
pub async fn cancel_abonnement(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let abonnement = AbonnementService::annuler(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reponse(abonnement)))
}

/// POST /api/abonnements/{id}/renouveler - Renouvellement d'un abonnement terminé
#[post("/{id}/renouveler")]
pub async fn renew_abonnement(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let ancien = AbonnementService::obtenir(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    let nouveau = AbonnementService::renouveler(db.get_ref(), ancien.id).await?;
    Ok(HttpResponse::Created().json(reponse(nouveau)))
}

/// DELETE /api/abonnements/{id} - Archivage d'un abonnement terminé (admin)
#[delete("/{id}")]
pub async fn delete_abonnement(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    AbonnementService::supprimer(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/abonnements/{id}/token - Token actif à installer sur le boîtier
#[get("/{id}/token")]
pub async fn get_token(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let abonnement = AbonnementService::obtenir(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    let token = TokenService::token_actif(db.get_ref(), abonnement.id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("No active token for subscription {}", abonnement.id)))?;
    Ok(HttpResponse::Ok().json(token))
}

/// POST /api/abonnements/{id}/token/regenerer (admin)
#[post("/{id}/token/regenerer")]
pub async fn regenerate_token(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    cipher: web::Data<SireneCipher>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let token = TokenService::regenerer(db.get_ref(), cipher.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(token))
}

/// POST /api/abonnements/{id}/paiements - Ouvre un paiement CinetPay
#[post("/{id}/paiements")]
pub async fn initiate_payment(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    gateway: web::Data<Arc<dyn PaymentGateway>>,
) -> Result<HttpResponse, AppError> {
    let paiement =
        PaiementService::initier(db.get_ref(), gateway.get_ref().as_ref(), &auth.scope(), path.into_inner()).await?;
    Ok(HttpResponse::Created().json(paiement))
}

/// GET /api/abonnements/{id}/paiements
#[get("/{id}/paiements")]
pub async fn list_payments(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let paiements = PaiementService::lister_pour_abonnement(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(paiements))
}

pub fn abonnements_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/abonnements")
            .service(list_abonnements)
            .service(create_abonnement)
            .service(expire_abonnements)
            .service(get_abonnement)
            .service(activate_abonnement)
            .service(suspend_abonnement)
            .service(reactivate_abonnement)
            .service(cancel_abonnement)
            .service(renew_abonnement)
            .service(delete_abonnement)
            .service(get_token)
            .service(regenerate_token)
            .service(initiate_payment)
            .service(list_payments)
    );
}
