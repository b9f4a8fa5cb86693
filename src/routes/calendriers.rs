use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthAccount;
use crate::models::account::Scope;
use crate::models::dto::{CreateCalendrierRequest, CreateJourFerieRequest, JourFerieQuery, JoursOuvresQuery};
use crate::services::calendrier_service::CalendrierService;

#[derive(Debug, Deserialize)]
pub struct CalendrierFilter {
    pub pays_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct JourFerieFilter {
    pub calendrier_id: Option<i32>,
    pub ecole_id: Option<i32>,
}

/// POST /api/calendriers (admin)
#[post("")]
pub async fn create_calendrier(
    auth: AuthAccount,
    body: web::Json<CreateCalendrierRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    auth.admin_id()?;
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;

    let calendrier = CalendrierService::creer_calendrier(db.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(calendrier))
}

/// GET /api/calendriers?pays_id=
#[get("")]
pub async fn list_calendriers(
    _auth: AuthAccount,
    query: web::Query<CalendrierFilter>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let calendriers = CalendrierService::lister_calendriers(db.get_ref(), query.pays_id).await?;
    Ok(HttpResponse::Ok().json(calendriers))
}

/// GET /api/calendriers/{id}
#[get("/{id}")]
pub async fn get_calendrier(
    _auth: AuthAccount,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let calendrier = CalendrierService::obtenir_calendrier(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(calendrier))
}

/// GET /api/calendriers/{id}/jours-ouvres?ecole_id= - Jours de classe de l'année
#[get("/{id}/jours-ouvres")]
pub async fn count_school_days(
    _auth: AuthAccount,
    path: web::Path<i32>,
    query: web::Query<JoursOuvresQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let calendrier_id = path.into_inner();
    let jours = CalendrierService::compter_jours_ouvres(db.get_ref(), calendrier_id, query.ecole_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "calendrier_id": calendrier_id,
        "ecole_id": query.ecole_id,
        "jours_ouvres": jours,
    })))
}

/// POST /api/jours-feries - Admin, ou école pour ses propres jours
#[post("")]
pub async fn create_jour_ferie(
    auth: AuthAccount,
    body: web::Json<CreateJourFerieRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate().map_err(|e| AppError::validation(e.to_string()))?;

    match auth.scope() {
        Scope::Admin => {}
        Scope::Ecole(id) if body.ecole_id == Some(id) && !body.est_national => {}
        _ => {
            return Err(AppError::Forbidden("Not allowed to add this holiday".to_string()));
        }
    }

    let jour = CalendrierService::ajouter_jour_ferie(db.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(jour))
}

/// GET /api/jours-feries?calendrier_id=&ecole_id=
#[get("")]
pub async fn list_jours_feries(
    _auth: AuthAccount,
    query: web::Query<JourFerieFilter>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let jours = CalendrierService::lister_jours_feries(db.get_ref(), query.calendrier_id, query.ecole_id).await?;
    Ok(HttpResponse::Ok().json(jours))
}

/// GET /api/jours-feries/verifier?date=&ecole_id=&calendrier_id=
#[get("/verifier")]
pub async fn check_holiday(
    _auth: AuthAccount,
    query: web::Query<JourFerieQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let feries = CalendrierService::charger_jours_feries(db.get_ref(), query.calendrier_id, query.ecole_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "date": query.date,
        "ferie": feries.est_ferie(query.date),
        "vacances": feries.est_en_vacances(query.date),
    })))
}

pub fn calendriers_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/calendriers")
            .service(create_calendrier)
            .service(list_calendriers)
            .service(get_calendrier)
            .service(count_school_days)
    )
    .service(
        web::scope("/jours-feries")
            .service(create_jour_ferie)
            .service(list_jours_feries)
            .service(check_holiday)
    );
}
