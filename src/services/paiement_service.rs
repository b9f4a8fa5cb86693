// ============================================================================
// SERVICE : PAIEMENTS
// ============================================================================
//
// Description:
//   Ouverture d'un paiement auprès de la passerelle, puis traitement de la
//   notification asynchrone qui valide le paiement et active l'abonnement.
//
// Points d'attention:
//   - La passerelle est appelée avant toute écriture : un échec ne laisse
//     aucun paiement en base et aucune transaction n'attend le réseau
//   - Notification idempotente : un paiement déjà validé n'est plus touché,
//     une seconde livraison n'active rien et n'émet aucun token
//
// ============================================================================

use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::abonnement::StatutAbonnement;
use crate::models::account::Scope;
use crate::models::dto::PaymentNotification;
use crate::models::paiement::{self, StatutPaiement};
use crate::services::abonnement_service::AbonnementService;
use crate::services::payment_gateway::{DemandePaiement, PaymentGateway};
use crate::utils::crypto::SireneCipher;

pub struct PaiementService;

impl PaiementService {
    /// Obtient l'URL de paiement puis enregistre le paiement en attente
    pub async fn initier(
        db: &DatabaseConnection,
        gateway: &dyn PaymentGateway,
        scope: &Scope,
        abonnement_id: i32,
    ) -> AppResult<paiement::Model> {
        let abonnement = AbonnementService::charger(db, abonnement_id).await?;
        if !scope.covers_ecole(abonnement.ecole_id) {
            return Err(AppError::not_found(format!("Subscription {} not found", abonnement_id)));
        }
        if !matches!(abonnement.statut, StatutAbonnement::EnAttente | StatutAbonnement::Suspendu) {
            return Err(AppError::validation(format!(
                "Subscription {} cannot be paid in status {:?}",
                abonnement_id, abonnement.statut
            )));
        }

        let demande = DemandePaiement {
            transaction_id: format!("SIR-{}-{}", abonnement_id, Uuid::new_v4().simple()),
            montant: abonnement.montant,
            description: format!("Abonnement sirene #{}", abonnement_id),
        };

        // Aucune connexion n'est tenue pendant l'appel à la passerelle
        let url = match gateway.initier(&demande).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(abonnement_id, transaction_id = %demande.transaction_id, error = %e, "payment initiation failed");
                return Err(e);
            }
        };

        let now = Utc::now().naive_utc();
        let paiement = paiement::ActiveModel {
            abonnement_id: Set(abonnement_id),
            transaction_id: Set(demande.transaction_id),
            montant: Set(demande.montant),
            statut: Set(StatutPaiement::EnAttente),
            url_paiement: Set(Some(url)),
            date_paiement: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(
            abonnement_id,
            paiement_id = paiement.id,
            transaction_id = %paiement.transaction_id,
            "payment initiated"
        );
        Ok(paiement)
    }

    /// Notification de la passerelle (ACCEPTED | 00 => valide, sinon échoué)
    pub async fn traiter_notification(
        db: &DatabaseConnection,
        cipher: &SireneCipher,
        notification: PaymentNotification,
    ) -> AppResult<paiement::Model> {
        let txn = db.begin().await?;

        let paiement = paiement::Entity::find()
            .filter(paiement::Column::TransactionId.eq(notification.transaction_id.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Payment {} not found", notification.transaction_id))
            })?;

        if paiement.statut == StatutPaiement::Valide {
            tracing::info!(paiement_id = paiement.id, "payment notification already processed");
            return Ok(paiement);
        }

        let paiement = match StatutPaiement::from_gateway(&notification.status) {
            StatutPaiement::Valide => {
                let abonnement_id = paiement.abonnement_id;
                let now = Utc::now().naive_utc();

                let mut active: paiement::ActiveModel = paiement.into();
                active.statut = Set(StatutPaiement::Valide);
                active.date_paiement = Set(Some(now));
                active.updated_at = Set(now);
                let paiement = active.update(&txn).await?;

                let abonnement = AbonnementService::charger(&txn, abonnement_id).await?;
                let activable = match abonnement.statut {
                    StatutAbonnement::EnAttente => true,
                    StatutAbonnement::Suspendu => abonnement.date_fin >= now.date(),
                    _ => false,
                };

                if activable {
                    AbonnementService::activer_avec(&txn, cipher, abonnement_id).await?;
                    tracing::info!(abonnement_id, paiement_id = paiement.id, "subscription activated by payment");
                } else {
                    tracing::warn!(
                        abonnement_id,
                        statut = ?abonnement.statut,
                        "validated payment for a subscription that cannot be activated"
                    );
                }
                paiement
            }
            _ if paiement.statut == StatutPaiement::EnAttente => {
                let mut active: paiement::ActiveModel = paiement.into();
                active.statut = Set(StatutPaiement::Echoue);
                active.updated_at = Set(Utc::now().naive_utc());
                let paiement = active.update(&txn).await?;

                tracing::warn!(
                    paiement_id = paiement.id,
                    status = %notification.status,
                    "payment refused by gateway"
                );
                paiement
            }
            _ => paiement,
        };

        txn.commit().await?;
        Ok(paiement)
    }

    pub async fn lister_pour_abonnement(
        db: &DatabaseConnection,
        scope: &Scope,
        abonnement_id: i32,
    ) -> AppResult<Vec<paiement::Model>> {
        let abonnement = AbonnementService::obtenir(db, scope, abonnement_id).await?;

        Ok(paiement::Entity::find()
            .filter(paiement::Column::AbonnementId.eq(abonnement.id))
            .order_by_desc(paiement::Column::CreatedAt)
            .all(db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token_sirene;
    use crate::services::test_support::*;
    use async_trait::async_trait;

    struct StubGateway;

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn initier(&self, demande: &DemandePaiement) -> AppResult<String> {
            Ok(format!("https://pay.test/{}", demande.transaction_id))
        }
    }

    struct DownGateway;

    #[async_trait]
    impl PaymentGateway for DownGateway {
        async fn initier(&self, _demande: &DemandePaiement) -> AppResult<String> {
            Err(AppError::External("gateway unreachable".to_string()))
        }
    }

    /// Passerelle qui interroge la base pendant l'appel
    struct ObservingGateway {
        db: DatabaseConnection,
    }

    #[async_trait]
    impl PaymentGateway for ObservingGateway {
        async fn initier(&self, demande: &DemandePaiement) -> AppResult<String> {
            let deja = paiement::Entity::find().count(&self.db).await?;
            Ok(format!("https://pay.test/{}?existants={}", demande.transaction_id, deja))
        }
    }

    fn accepted(transaction_id: &str) -> PaymentNotification {
        PaymentNotification {
            transaction_id: transaction_id.to_string(),
            status: "ACCEPTED".to_string(),
        }
    }

    #[tokio::test]
    async fn test_initiate_payment() {
        let db = crate::db::test_connection().await;
        let sirene = creer_sirene(&db, "SRN-P1").await;
        let abonnement = creer_abonnement(&db, sirene.id).await;

        let paiement = PaiementService::initier(&db, &StubGateway, &Scope::Admin, abonnement.id)
            .await
            .unwrap();

        assert_eq!(paiement.statut, StatutPaiement::EnAttente);
        assert_eq!(paiement.montant, abonnement.montant);
        assert!(paiement.url_paiement.unwrap().ends_with(&paiement.transaction_id));
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_no_payment() {
        let db = crate::db::test_connection().await;
        let sirene = creer_sirene(&db, "SRN-P2").await;
        let abonnement = creer_abonnement(&db, sirene.id).await;

        let err = PaiementService::initier(&db, &DownGateway, &Scope::Admin, abonnement.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::External(_)));

        let count = paiement::Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_gateway_call_holds_no_connection() {
        let db = crate::db::test_connection().await;
        let sirene = creer_sirene(&db, "SRN-P6").await;
        let abonnement = creer_abonnement(&db, sirene.id).await;

        // La base de test n'a qu'une connexion : elle doit être libre pendant l'appel
        let gateway = ObservingGateway { db: db.clone() };
        let paiement = PaiementService::initier(&db, &gateway, &Scope::Admin, abonnement.id)
            .await
            .unwrap();

        assert!(paiement.url_paiement.unwrap().ends_with("existants=0"));
        assert_eq!(paiement::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_other_school_cannot_initiate() {
        let db = crate::db::test_connection().await;
        let sirene = creer_sirene(&db, "SRN-P3").await;
        let abonnement = creer_abonnement(&db, sirene.id).await;

        let err = PaiementService::initier(&db, &StubGateway, &Scope::Ecole(ECOLE_ID + 1), abonnement.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_webhook_is_idempotent() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let sirene = creer_sirene(&db, "SRN-P4").await;
        let abonnement = creer_abonnement(&db, sirene.id).await;
        let paiement = PaiementService::initier(&db, &StubGateway, &Scope::Admin, abonnement.id)
            .await
            .unwrap();

        let premier = PaiementService::traiter_notification(&db, &cipher, accepted(&paiement.transaction_id))
            .await
            .unwrap();
        let second = PaiementService::traiter_notification(&db, &cipher, accepted(&paiement.transaction_id))
            .await
            .unwrap();

        assert_eq!(premier.statut, StatutPaiement::Valide);
        assert_eq!(second.date_paiement, premier.date_paiement);

        let active = AbonnementService::charger(&db, abonnement.id).await.unwrap();
        assert_eq!(active.statut, StatutAbonnement::Actif);

        let tokens = token_sirene::Entity::find()
            .filter(token_sirene::Column::AbonnementId.eq(abonnement.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(tokens, 1);
    }

    #[tokio::test]
    async fn test_refused_payment_keeps_subscription_pending() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let sirene = creer_sirene(&db, "SRN-P5").await;
        let abonnement = creer_abonnement(&db, sirene.id).await;
        let paiement = PaiementService::initier(&db, &StubGateway, &Scope::Admin, abonnement.id)
            .await
            .unwrap();

        let notification = PaymentNotification {
            transaction_id: paiement.transaction_id.clone(),
            status: "REFUSED".to_string(),
        };
        let refuse = PaiementService::traiter_notification(&db, &cipher, notification)
            .await
            .unwrap();

        assert_eq!(refuse.statut, StatutPaiement::Echoue);
        let recharge = AbonnementService::charger(&db, abonnement.id).await.unwrap();
        assert_eq!(recharge.statut, StatutAbonnement::EnAttente);
    }

    #[tokio::test]
    async fn test_unknown_transaction() {
        let db = crate::db::test_connection().await;
        let err = PaiementService::traiter_notification(&db, &cipher(), accepted("SIR-404"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
