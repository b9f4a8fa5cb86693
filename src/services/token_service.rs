use chrono::{NaiveDateTime, NaiveTime};
use sea_orm::sea_query::Expr;
use sea_orm::*;

use crate::error::{AppError, AppResult};
use crate::models::abonnement::{self, StatutAbonnement};
use crate::models::paiement::{self, StatutPaiement};
use crate::models::{sirene, token_sirene};
use crate::utils::crypto::{SireneCipher, sha256_hex};

pub const TOKEN_VERSION: u8 = 1;

pub struct TokenService;

/// Résultat d'une authentification boîtier réussie
#[derive(Debug, Clone)]
pub struct SireneAuthentifiee {
    pub token: token_sirene::Model,
    pub abonnement: abonnement::Model,
    pub sirene: sirene::Model,
}

impl TokenService {
    /// Texte clair : VERSION|ECOLE|NUMERO_SERIE|DEBUT_EPOCH|FIN_EPOCH
    pub fn payload(ecole_id: i32, numero_serie: &str, debut: i64, fin: i64) -> String {
        format!("{}|{}|{}|{}|{}", TOKEN_VERSION, ecole_id, numero_serie, debut, fin)
    }

    /// Fenêtre de validité : du début du premier jour à la fin du dernier
    pub fn fenetre(abonnement: &abonnement::Model) -> AppResult<(NaiveDateTime, NaiveDateTime)> {
        let debut = abonnement.date_debut.and_time(NaiveTime::MIN);
        let fin = abonnement
            .date_fin
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| AppError::validation("Invalid subscription end date"))?;
        Ok((debut, fin))
    }

    /// Génère le token d'un abonnement, en désactivant les précédents.
    ///
    /// Sans paiement validé, ne fait rien et renvoie `None` : c'est à
    /// l'appelant de différer. À appeler dans la transaction de la transition.
    pub async fn generer<C: ConnectionTrait>(
        conn: &C,
        cipher: &SireneCipher,
        abonnement: &abonnement::Model,
    ) -> AppResult<Option<token_sirene::Model>> {
        let paiement_valide = paiement::Entity::find()
            .filter(paiement::Column::AbonnementId.eq(abonnement.id))
            .filter(paiement::Column::Statut.eq(StatutPaiement::Valide))
            .one(conn)
            .await?;

        if paiement_valide.is_none() {
            tracing::info!(abonnement_id = abonnement.id, "token generation deferred: no validated payment");
            return Ok(None);
        }

        let sirene = sirene::Entity::find_by_id(abonnement.sirene_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Sirene {} not found", abonnement.sirene_id)))?;

        Self::invalider(conn, abonnement.id).await?;

        let (debut, fin) = Self::fenetre(abonnement)?;
        let clair = Self::payload(
            abonnement.ecole_id,
            &sirene.numero_serie,
            debut.and_utc().timestamp(),
            fin.and_utc().timestamp(),
        );
        let token_crypte = cipher.encrypt(&clair)?;

        let token = token_sirene::ActiveModel {
            abonnement_id: Set(abonnement.id),
            sirene_id: Set(sirene.id),
            token_hash: Set(sha256_hex(&token_crypte)),
            token_crypte: Set(token_crypte),
            date_debut: Set(debut),
            date_expiration: Set(fin),
            actif: Set(true),
            date_generation: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        tracing::info!(
            abonnement_id = abonnement.id,
            sirene_id = sirene.id,
            token_id = token.id,
            "token issued"
        );

        Ok(Some(token))
    }

    /// Désactive tous les tokens actifs d'un abonnement
    pub async fn invalider<C: ConnectionTrait>(conn: &C, abonnement_id: i32) -> AppResult<u64> {
        let result = token_sirene::Entity::update_many()
            .col_expr(token_sirene::Column::Actif, Expr::value(false))
            .filter(token_sirene::Column::AbonnementId.eq(abonnement_id))
            .filter(token_sirene::Column::Actif.eq(true))
            .exec(conn)
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(abonnement_id, count = result.rows_affected, "tokens invalidated");
        }

        Ok(result.rows_affected)
    }

    /// Régénération explicite, réservée aux abonnements actifs
    pub async fn regenerer(
        db: &DatabaseConnection,
        cipher: &SireneCipher,
        abonnement_id: i32,
    ) -> AppResult<token_sirene::Model> {
        let txn = db.begin().await?;

        let abonnement = abonnement::Entity::find_by_id(abonnement_id)
            .filter(abonnement::Column::DeletedAt.is_null())
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Subscription {} not found", abonnement_id)))?;

        if abonnement.statut != StatutAbonnement::Actif {
            return Err(AppError::precondition(format!(
                "Cannot regenerate a token for subscription {} in status {:?}",
                abonnement_id, abonnement.statut
            )));
        }

        let token = Self::generer(&txn, cipher, &abonnement).await?.ok_or_else(|| {
            AppError::precondition(format!(
                "Subscription {} has no validated payment",
                abonnement_id
            ))
        })?;

        txn.commit().await?;
        Ok(token)
    }

    pub async fn token_actif(
        db: &DatabaseConnection,
        abonnement_id: i32,
    ) -> AppResult<Option<token_sirene::Model>> {
        Ok(token_sirene::Entity::find()
            .filter(token_sirene::Column::AbonnementId.eq(abonnement_id))
            .filter(token_sirene::Column::Actif.eq(true))
            .one(db)
            .await?)
    }

    /// Vérifie un token présenté par un boîtier.
    /// Toute anomalie est un refus d'authentification.
    pub async fn verifier(
        db: &DatabaseConnection,
        presente: &str,
        now: NaiveDateTime,
    ) -> AppResult<SireneAuthentifiee> {
        let refus = |raison: &str| {
            tracing::warn!(reason = raison, "sirene authentication rejected");
            AppError::Authentication(format!("Invalid sirene token: {}", raison))
        };

        let hash = sha256_hex(presente.trim());
        let token = token_sirene::Entity::find()
            .filter(token_sirene::Column::TokenHash.eq(hash))
            .filter(token_sirene::Column::Actif.eq(true))
            .order_by_desc(token_sirene::Column::Id)
            .one(db)
            .await?
            .ok_or_else(|| refus("unknown or revoked token"))?;

        if token.date_expiration < now {
            return Err(refus("token expired"));
        }

        let abonnement = abonnement::Entity::find_by_id(token.abonnement_id)
            .filter(abonnement::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| refus("subscription not found"))?;

        if abonnement.statut != StatutAbonnement::Actif {
            return Err(refus("subscription is not active"));
        }
        if abonnement.date_fin < now.date() {
            return Err(refus("subscription has ended"));
        }

        let sirene = sirene::Entity::find_by_id(abonnement.sirene_id)
            .filter(sirene::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| refus("sirene not found"))?;

        Ok(SireneAuthentifiee {
            token,
            abonnement,
            sirene,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    #[test]
    fn test_payload_format() {
        assert_eq!(
            TokenService::payload(42, "SRN-0001", 100, 200),
            "1|42|SRN-0001|100|200"
        );
    }

    #[tokio::test]
    async fn test_no_token_without_validated_payment() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let sirene = creer_sirene(&db, "SRN-T1").await;
        let abonnement = creer_abonnement(&db, sirene.id).await;

        let token = TokenService::generer(&db, &cipher, &abonnement).await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_generation_keeps_single_active_token() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (abonnement, _) = abonnement_actif(&db, &cipher, "SRN-T2").await;

        TokenService::regenerer(&db, &cipher, abonnement.id).await.unwrap();
        TokenService::regenerer(&db, &cipher, abonnement.id).await.unwrap();

        let actifs = token_sirene::Entity::find()
            .filter(token_sirene::Column::AbonnementId.eq(abonnement.id))
            .filter(token_sirene::Column::Actif.eq(true))
            .count(&db)
            .await
            .unwrap();
        let total = token_sirene::Entity::find()
            .filter(token_sirene::Column::AbonnementId.eq(abonnement.id))
            .count(&db)
            .await
            .unwrap();

        assert_eq!(actifs, 1);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_verify_token() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (abonnement, sirene) = abonnement_actif(&db, &cipher, "SRN-T3").await;
        let token = TokenService::token_actif(&db, abonnement.id).await.unwrap().unwrap();

        // Le boîtier retrouve son numéro de série dans le token
        let clair = cipher.decrypt(&token.token_crypte).unwrap();
        assert!(clair.starts_with(&format!("1|{}|SRN-T3|", abonnement.ecole_id)));

        let now = chrono::Utc::now().naive_utc();
        let auth = TokenService::verifier(&db, &token.token_crypte, now).await.unwrap();
        assert_eq!(auth.sirene.id, sirene.id);
        assert_eq!(auth.abonnement.id, abonnement.id);

        assert!(matches!(
            TokenService::verifier(&db, "garbage", now).await,
            Err(AppError::Authentication(_))
        ));

        TokenService::invalider(&db, abonnement.id).await.unwrap();
        assert!(matches!(
            TokenService::verifier(&db, &token.token_crypte, now).await,
            Err(AppError::Authentication(_))
        ));
    }
}
