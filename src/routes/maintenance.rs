use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthAccount;
use crate::models::dto::{
    AvisRequest, CandidatureRequest, DeclarePanneRequest, EvaluationRapportRequest, RapportRequest,
    SuspensionRequest, TerminerInterventionRequest, ValidatePanneRequest,
};
use crate::services::intervention_service::InterventionService;
use crate::services::mission_service::MissionService;
use crate::services::panne_service::PanneService;

// ----------------------------------------------------------------------------
// Pannes
// ----------------------------------------------------------------------------

/// POST /api/pannes - Déclaration d'une panne
#[post("")]
pub async fn declare_panne(
    auth: AuthAccount,
    body: web::Json<DeclarePanneRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;
    let panne = PanneService::declarer(db.get_ref(), &auth.scope(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(panne))
}

/// GET /api/pannes
#[get("")]
pub async fn list_pannes(
    auth: AuthAccount,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let pannes = PanneService::lister(db.get_ref(), &auth.scope()).await?;
    Ok(HttpResponse::Ok().json(pannes))
}

/// GET /api/pannes/{id}
#[get("/{id}")]
pub async fn get_panne(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let panne = PanneService::obtenir(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(panne))
}

/// POST /api/pannes/{id}/valider (admin) - Ouvre l'ordre de mission
#[post("/{id}/valider")]
pub async fn validate_panne(
    auth: AuthAccount,
    path: web::Path<i32>,
    body: web::Json<ValidatePanneRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let admin_id = auth.admin_id()?;
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;

    let (panne, ordre) = PanneService::valider(db.get_ref(), admin_id, path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "panne": panne,
        "ordre_mission": ordre,
    })))
}

/// POST /api/pannes/{id}/cloturer (admin)
#[post("/{id}/cloturer")]
pub async fn close_panne(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let panne = PanneService::cloturer(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(panne))
}

// ----------------------------------------------------------------------------
// Ordres de mission et candidatures
// ----------------------------------------------------------------------------

/// GET /api/ordres-mission
#[get("")]
pub async fn list_ordres(
    auth: AuthAccount,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let ordres = MissionService::lister_ordres(db.get_ref(), &auth.scope()).await?;
    Ok(HttpResponse::Ok().json(ordres))
}

/// POST /api/ordres-mission/{id}/candidatures (technicien)
#[post("/{id}/candidatures")]
pub async fn apply(
    auth: AuthAccount,
    path: web::Path<i32>,
    body: web::Json<CandidatureRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let technicien_id = auth.technicien_id()?;
    let candidature =
        MissionService::soumettre(db.get_ref(), technicien_id, path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(candidature))
}

/// GET /api/ordres-mission/{id}/candidatures
#[get("/{id}/candidatures")]
pub async fn list_candidatures(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let candidatures = MissionService::lister_candidatures(db.get_ref(), &auth.scope(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(candidatures))
}

/// POST /api/ordres-mission/{id}/cloturer (admin) - Clôture manuelle
#[post("/{id}/cloturer")]
pub async fn close_candidatures(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let admin_id = auth.admin_id()?;
    let ordre = MissionService::cloturer_candidatures(db.get_ref(), admin_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ordre))
}

/// POST /api/candidatures/{id}/accepter (admin)
#[post("/{id}/accepter")]
pub async fn accept_candidature(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let (candidature, intervention) = MissionService::accepter(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "candidature": candidature,
        "intervention": intervention,
    })))
}

/// POST /api/candidatures/{id}/refuser (admin)
#[post("/{id}/refuser")]
pub async fn refuse_candidature(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let candidature = MissionService::refuser(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(candidature))
}

/// POST /api/candidatures/{id}/retirer (technicien)
#[post("/{id}/retirer")]
pub async fn withdraw_candidature(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let technicien_id = auth.technicien_id()?;
    let candidature = MissionService::retirer_candidature(db.get_ref(), technicien_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(candidature))
}

/// POST /api/candidatures/{id}/suspension (admin)
#[post("/{id}/suspension")]
pub async fn suspend_candidature(
    auth: AuthAccount,
    path: web::Path<i32>,
    body: web::Json<SuspensionRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let candidature = MissionService::suspendre(db.get_ref(), path.into_inner(), body.suspendue).await?;
    Ok(HttpResponse::Ok().json(candidature))
}

// ----------------------------------------------------------------------------
// Interventions, rapports et avis
// ----------------------------------------------------------------------------

/// GET /api/interventions
#[get("")]
pub async fn list_interventions(
    auth: AuthAccount,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let interventions = InterventionService::lister(db.get_ref(), &auth.scope()).await?;
    Ok(HttpResponse::Ok().json(interventions))
}

/// POST /api/interventions/{id}/accepter (technicien)
#[post("/{id}/accepter")]
pub async fn accept_intervention(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let technicien_id = auth.technicien_id()?;
    let intervention = InterventionService::accepter(db.get_ref(), technicien_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(intervention))
}

/// POST /api/interventions/{id}/demarrer (technicien)
#[post("/{id}/demarrer")]
pub async fn start_intervention(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let technicien_id = auth.technicien_id()?;
    let intervention = InterventionService::demarrer(db.get_ref(), technicien_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(intervention))
}

/// POST /api/interventions/{id}/terminer (technicien)
#[post("/{id}/terminer")]
pub async fn finish_intervention(
    auth: AuthAccount,
    path: web::Path<i32>,
    body: web::Json<TerminerInterventionRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let technicien_id = auth.technicien_id()?;
    let intervention = InterventionService::terminer(
        db.get_ref(),
        technicien_id,
        path.into_inner(),
        body.into_inner().observations,
    )
    .await?;
    Ok(HttpResponse::Ok().json(intervention))
}

/// POST /api/interventions/{id}/retirer-technicien (admin)
#[post("/{id}/retirer-technicien")]
pub async fn withdraw_technician(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let ordre = InterventionService::retirer_technicien(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ordre))
}

/// POST /api/interventions/{id}/annuler (admin)
#[post("/{id}/annuler")]
pub async fn cancel_intervention(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let intervention = InterventionService::annuler(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(intervention))
}

/// POST /api/interventions/{id}/rapports (technicien)
#[post("/{id}/rapports")]
pub async fn submit_rapport(
    auth: AuthAccount,
    path: web::Path<i32>,
    body: web::Json<RapportRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let technicien_id = auth.technicien_id()?;
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;

    let rapport =
        InterventionService::soumettre_rapport(db.get_ref(), technicien_id, path.into_inner(), body.into_inner())
            .await?;
    Ok(HttpResponse::Created().json(rapport))
}

/// GET /api/interventions/{id}/rapports (admin)
#[get("/{id}/rapports")]
pub async fn list_rapports(
    auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    let rapports = InterventionService::rapports(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rapports))
}

/// POST /api/interventions/{id}/avis (école)
#[post("/{id}/avis")]
pub async fn rate_intervention(
    auth: AuthAccount,
    path: web::Path<i32>,
    body: web::Json<AvisRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let ecole_id = auth.ecole_id()?;
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;

    let avis = InterventionService::noter(db.get_ref(), ecole_id, path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(avis))
}

/// POST /api/rapports/{id}/evaluer (admin)
#[post("/{id}/evaluer")]
pub async fn evaluate_rapport(
    auth: AuthAccount,
    path: web::Path<i32>,
    body: web::Json<EvaluationRapportRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;

    let rapport = InterventionService::evaluer_rapport(db.get_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rapport))
}

pub fn maintenance_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/pannes")
            .service(declare_panne)
            .service(list_pannes)
            .service(get_panne)
            .service(validate_panne)
            .service(close_panne)
    )
    .service(
        web::scope("/ordres-mission")
            .service(list_ordres)
            .service(apply)
            .service(list_candidatures)
            .service(close_candidatures)
    )
    .service(
        web::scope("/candidatures")
            .service(accept_candidature)
            .service(refuse_candidature)
            .service(withdraw_candidature)
            .service(suspend_candidature)
    )
    .service(
        web::scope("/interventions")
            .service(list_interventions)
            .service(accept_intervention)
            .service(start_intervention)
            .service(finish_intervention)
            .service(withdraw_technician)
            .service(cancel_intervention)
            .service(submit_rapport)
            .service(list_rapports)
            .service(rate_intervention)
    )
    .service(
        web::scope("/rapports")
            .service(evaluate_rapport)
    );
}
