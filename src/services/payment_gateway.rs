// Passerelle de paiement (CinetPay)
//
// Le service de paiement ne connaît que le trait : les tests injectent une
// passerelle factice, l'application la passerelle HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::CinetPayConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct DemandePaiement {
    pub transaction_id: String,
    pub montant: i64,
    pub description: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ouvre une transaction et renvoie l'URL de paiement
    async fn initier(&self, demande: &DemandePaiement) -> AppResult<String>;
}

pub struct CinetPayGateway {
    http_client: reqwest::Client,
    config: CinetPayConfig,
}

#[derive(Debug, Deserialize)]
struct CinetPayResponse {
    code: String,
    message: Option<String>,
    data: Option<CinetPayData>,
}

#[derive(Debug, Deserialize)]
struct CinetPayData {
    payment_url: String,
}

impl CinetPayGateway {
    pub fn new(config: CinetPayConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PaymentGateway for CinetPayGateway {
    async fn initier(&self, demande: &DemandePaiement) -> AppResult<String> {
        let body = json!({
            "apikey": self.config.api_key,
            "site_id": self.config.site_id,
            "transaction_id": demande.transaction_id,
            "amount": demande.montant,
            "currency": "XOF",
            "description": demande.description,
            "notify_url": self.config.notify_url,
            "channels": "ALL",
        });

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Payment gateway unreachable: {}", e)))?;

        let status = response.status();
        let payload: CinetPayResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Invalid payment gateway response ({}): {}", status, e)))?;

        // CinetPay renvoie "201" quand la transaction est créée
        match (payload.code.as_str(), payload.data) {
            ("201", Some(data)) => Ok(data.payment_url),
            (code, _) => {
                tracing::warn!(
                    transaction_id = %demande.transaction_id,
                    code,
                    message = payload.message.as_deref().unwrap_or(""),
                    "payment gateway refused transaction"
                );
                Err(AppError::External(format!(
                    "Payment gateway refused transaction (code {})",
                    code
                )))
            }
        }
    }
}
