use actix_web::{post, web, HttpRequest, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::dto::PaymentNotification;
use crate::services::paiement_service::PaiementService;
use crate::utils::crypto::{SireneCipher, verify_hmac_hex};

/// POST /api/paiements/notification - Webhook CinetPay
///
/// Le corps brut est conservé pour vérifier la signature `x-token`
/// (HMAC-SHA256 hex) quand CINETPAY_WEBHOOK_SECRET est défini.
#[post("/notification")]
pub async fn payment_notification(
    req: HttpRequest,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
    cipher: web::Data<SireneCipher>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    if let Some(secret) = &config.cinetpay.webhook_secret {
        let signature = req
            .headers()
            .get("x-token")
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();

        if !verify_hmac_hex(secret, &body, signature) {
            tracing::warn!("payment notification rejected: bad signature");
            return Err(AppError::Authentication("Invalid notification signature".to_string()));
        }
    }

    let notification: PaymentNotification = serde_json::from_slice(&body)
        .map_err(|e| AppError::validation(format!("Invalid notification payload: {}", e)))?;

    tracing::info!(transaction_id = %notification.transaction_id, status = %notification.status, "payment notification received");

    let paiement = PaiementService::traiter_notification(db.get_ref(), cipher.get_ref(), notification).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "transaction_id": paiement.transaction_id,
        "statut": paiement.statut,
    })))
}

pub fn paiements_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/paiements")
            .service(payment_notification)
    );
}
