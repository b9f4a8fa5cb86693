// Authentification des boîtiers : header X-Sirene-Token
//
// Le token présenté est résolu en (token, abonnement actif, sirène) par
// TokenService::verifier. Toute anomalie donne un 401.

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::services::token_service::{SireneAuthentifiee, TokenService};

pub const SIRENE_TOKEN_HEADER: &str = "X-Sirene-Token";

#[derive(Debug, Clone)]
pub struct SireneAuth(pub SireneAuthentifiee);

impl FromRequest for SireneAuth {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req
            .headers()
            .get(SIRENE_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let db = req.app_data::<web::Data<DatabaseConnection>>().cloned();

        Box::pin(async move {
            let token = token
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| AppError::Authentication(format!("Missing {} header", SIRENE_TOKEN_HEADER)))?;
            let db = db.ok_or_else(|| AppError::Configuration("Database not configured".to_string()))?;

            let authentifiee = TokenService::verifier(db.get_ref(), &token, Utc::now().naive_utc()).await?;
            Ok(SireneAuth(authentifiee))
        })
    }
}
