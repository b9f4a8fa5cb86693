// ============================================================================
// SERVICE : CYCLE DE VIE DES ABONNEMENTS
// ============================================================================
//
// Description:
//   Transitions explicites (créer, activer, suspendre, réactiver, annuler,
//   renouveler, expirer). Chaque transition s'exécute dans UNE transaction :
//   vérifications, abonnement, tokens et statut sirène sont validés ensemble
//   ou pas du tout (un `?` abandonne la transaction, qui est annulée).
//
// Statut sirène recalculé à chaque changement de statut:
//   - actif / en_attente -> reserve
//   - suspendu           -> inchangé
//   - expire / annule    -> en_stock, sauf si en_panne
//
// Points d'attention:
//   - Au plus un abonnement vivant par sirène : vérifié ici, garanti par
//     l'index unique partiel en cas de course (AppError::Conflict)
//   - Sur PostgreSQL la ligne sirène est verrouillée (FOR UPDATE)
//
// ============================================================================

use chrono::{NaiveDate, Utc};
use sea_orm::*;

use crate::error::{AppError, AppResult};
use crate::models::abonnement::{self, StatutAbonnement};
use crate::models::account::Scope;
use crate::models::dto::CreateAbonnementRequest;
use crate::models::paiement::{self, StatutPaiement};
use crate::models::sirene;
use crate::services::token_service::TokenService;
use crate::utils::crypto::SireneCipher;

pub struct AbonnementService;

impl AbonnementService {
    /// Crée un abonnement en attente (achat ou renouvellement manuel)
    pub async fn creer(
        db: &DatabaseConnection,
        request: CreateAbonnementRequest,
    ) -> AppResult<abonnement::Model> {
        let sirene_id = request
            .sirene_id
            .ok_or_else(|| AppError::validation("sirene_id is required"))?;

        if request.date_debut > request.date_fin {
            return Err(AppError::validation("date_debut must be before or equal to date_fin"));
        }

        let txn = db.begin().await?;

        let sirene = Self::verrouiller_sirene(&txn, sirene_id).await?;

        if let Some(parent_id) = request.parent_abonnement_id {
            let parent = Self::charger(&txn, parent_id).await?;
            if parent.sirene_id != sirene_id {
                return Err(AppError::validation(format!(
                    "Parent subscription {} belongs to another sirene",
                    parent_id
                )));
            }
            if !parent.can_be_renewed() {
                return Err(AppError::validation(format!(
                    "Parent subscription {} cannot be renewed from status {:?}",
                    parent_id, parent.statut
                )));
            }
        }

        Self::verifier_aucun_abonnement_vivant(&txn, sirene_id).await?;

        let now = Utc::now().naive_utc();
        let abonnement = abonnement::ActiveModel {
            sirene_id: Set(sirene_id),
            ecole_id: Set(request.ecole_id),
            site_id: Set(request.site_id),
            parent_abonnement_id: Set(request.parent_abonnement_id),
            date_debut: Set(request.date_debut),
            date_fin: Set(request.date_fin),
            montant: Set(request.montant),
            statut: Set(StatutAbonnement::EnAttente),
            sirene_statut_precedent: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        Self::synchroniser_statut_sirene(&txn, &sirene, abonnement.statut).await?;

        txn.commit().await?;

        tracing::info!(abonnement_id = abonnement.id, sirene_id, "subscription created");
        Ok(abonnement)
    }

    /// en_attente | suspendu -> actif. Exige un paiement validé.
    pub async fn activer(
        db: &DatabaseConnection,
        cipher: &SireneCipher,
        abonnement_id: i32,
    ) -> AppResult<abonnement::Model> {
        let txn = db.begin().await?;
        let abonnement = Self::activer_avec(&txn, cipher, abonnement_id).await?;
        txn.commit().await?;

        tracing::info!(abonnement_id, "subscription activated");
        Ok(abonnement)
    }

    /// Activation dans une transaction existante (webhook de paiement)
    pub async fn activer_avec<C: ConnectionTrait>(
        conn: &C,
        cipher: &SireneCipher,
        abonnement_id: i32,
    ) -> AppResult<abonnement::Model> {
        let abonnement = Self::charger(conn, abonnement_id).await?;

        if !abonnement.statut.peut_passer_a(StatutAbonnement::Actif) {
            return Err(AppError::validation(format!(
                "Cannot activate subscription {} from status {:?}",
                abonnement_id, abonnement.statut
            )));
        }

        let today = Utc::now().date_naive();
        if abonnement.statut == StatutAbonnement::Suspendu && abonnement.date_fin < today {
            return Err(AppError::validation(format!(
                "Subscription {} ended on {}, it cannot be reactivated",
                abonnement_id, abonnement.date_fin
            )));
        }

        if !Self::a_paiement_valide(conn, abonnement_id).await? {
            return Err(AppError::precondition(format!(
                "Subscription {} has no validated payment",
                abonnement_id
            )));
        }

        let sirene = Self::verrouiller_sirene(conn, abonnement.sirene_id).await?;

        let mut active: abonnement::ActiveModel = abonnement.into();
        active.statut = Set(StatutAbonnement::Actif);
        active.sirene_statut_precedent = Set(Some(sirene.statut));
        active.updated_at = Set(Utc::now().naive_utc());
        let abonnement = active.update(conn).await?;

        Self::synchroniser_statut_sirene(conn, &sirene, abonnement.statut).await?;

        // Paiement vérifié plus haut : le token est forcément émis
        TokenService::generer(conn, cipher, &abonnement).await?;

        Ok(abonnement)
    }

    /// actif -> suspendu. La sirène garde son statut, les tokens tombent.
    pub async fn suspendre(
        db: &DatabaseConnection,
        abonnement_id: i32,
    ) -> AppResult<abonnement::Model> {
        let txn = db.begin().await?;

        let abonnement = Self::charger(&txn, abonnement_id).await?;
        if abonnement.statut != StatutAbonnement::Actif {
            return Err(AppError::validation(format!(
                "Only an active subscription can be suspended (subscription {} is {:?})",
                abonnement_id, abonnement.statut
            )));
        }

        let abonnement = Self::changer_statut(&txn, abonnement, StatutAbonnement::Suspendu).await?;
        TokenService::invalider(&txn, abonnement_id).await?;

        txn.commit().await?;

        tracing::info!(abonnement_id, "subscription suspended");
        Ok(abonnement)
    }

    /// suspendu -> actif, tant que date_fin n'est pas dépassée
    pub async fn reactiver(
        db: &DatabaseConnection,
        cipher: &SireneCipher,
        abonnement_id: i32,
    ) -> AppResult<abonnement::Model> {
        let txn = db.begin().await?;

        let abonnement = Self::charger(&txn, abonnement_id).await?;
        if abonnement.statut != StatutAbonnement::Suspendu {
            return Err(AppError::validation(format!(
                "Only a suspended subscription can be reactivated (subscription {} is {:?})",
                abonnement_id, abonnement.statut
            )));
        }

        let abonnement = Self::activer_avec(&txn, cipher, abonnement_id).await?;
        txn.commit().await?;

        tracing::info!(abonnement_id, "subscription reactivated");
        Ok(abonnement)
    }

    /// Annulation : date_fin ramenée à aujourd'hui (au plus tôt date_debut), tokens désactivés
    pub async fn annuler(
        db: &DatabaseConnection,
        abonnement_id: i32,
    ) -> AppResult<abonnement::Model> {
        let txn = db.begin().await?;

        let abonnement = Self::charger(&txn, abonnement_id).await?;
        if abonnement.statut.est_terminal() {
            return Err(AppError::validation(format!(
                "Subscription {} is already {:?}",
                abonnement_id, abonnement.statut
            )));
        }

        let sirene = Self::verrouiller_sirene(&txn, abonnement.sirene_id).await?;

        // Un abonnement qui n'a pas commencé garde date_fin >= date_debut
        let now = Utc::now().naive_utc();
        let date_fin = now.date().max(abonnement.date_debut);
        let mut active: abonnement::ActiveModel = abonnement.into();
        active.statut = Set(StatutAbonnement::Annule);
        active.date_fin = Set(date_fin);
        active.updated_at = Set(now);
        let abonnement = active.update(&txn).await?;

        TokenService::invalider(&txn, abonnement_id).await?;
        Self::synchroniser_statut_sirene(&txn, &sirene, abonnement.statut).await?;

        txn.commit().await?;

        tracing::info!(abonnement_id, "subscription cancelled");
        Ok(abonnement)
    }

    /// Crée le renouvellement d'un abonnement terminé : même sirène, école
    /// et site, démarrant le lendemain de sa date de fin, pour un an.
    pub async fn renouveler(
        db: &DatabaseConnection,
        abonnement_id: i32,
    ) -> AppResult<abonnement::Model> {
        let txn = db.begin().await?;

        let ancien = Self::charger(&txn, abonnement_id).await?;
        if !ancien.can_be_renewed() {
            return Err(AppError::validation(format!(
                "Subscription {} cannot be renewed from status {:?}",
                abonnement_id, ancien.statut
            )));
        }

        let (date_debut, date_fin) = ancien
            .periode_renouvellement()
            .ok_or_else(|| AppError::validation("Renewal period is out of range"))?;

        let sirene = Self::verrouiller_sirene(&txn, ancien.sirene_id).await?;
        Self::verifier_aucun_abonnement_vivant(&txn, ancien.sirene_id).await?;

        let now = Utc::now().naive_utc();
        let nouveau = abonnement::ActiveModel {
            sirene_id: Set(ancien.sirene_id),
            ecole_id: Set(ancien.ecole_id),
            site_id: Set(ancien.site_id),
            parent_abonnement_id: Set(Some(ancien.id)),
            date_debut: Set(date_debut),
            date_fin: Set(date_fin),
            montant: Set(ancien.montant),
            statut: Set(StatutAbonnement::EnAttente),
            sirene_statut_precedent: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        Self::synchroniser_statut_sirene(&txn, &sirene, nouveau.statut).await?;

        txn.commit().await?;

        tracing::info!(
            abonnement_id = nouveau.id,
            parent_abonnement_id = ancien.id,
            "subscription renewed"
        );
        Ok(nouveau)
    }

    /// Traitement par lot, déclenché de l'extérieur et idempotent :
    /// actif/suspendu dont date_fin < today -> expire.
    pub async fn expirer_abonnements(db: &DatabaseConnection, today: NaiveDate) -> AppResult<u64> {
        let echus = abonnement::Entity::find()
            .filter(abonnement::Column::Statut.is_in([StatutAbonnement::Actif, StatutAbonnement::Suspendu]))
            .filter(abonnement::Column::DateFin.lt(today))
            .filter(abonnement::Column::DeletedAt.is_null())
            .all(db)
            .await?;

        let mut expires = 0;
        for abonnement in echus {
            let abonnement_id = abonnement.id;
            let txn = db.begin().await?;

            let sirene = Self::verrouiller_sirene(&txn, abonnement.sirene_id).await?;
            let abonnement = Self::changer_statut(&txn, abonnement, StatutAbonnement::Expire).await?;
            TokenService::invalider(&txn, abonnement_id).await?;
            Self::synchroniser_statut_sirene(&txn, &sirene, abonnement.statut).await?;

            txn.commit().await?;
            expires += 1;
        }

        if expires > 0 {
            tracing::info!(count = expires, %today, "subscriptions expired");
        }
        Ok(expires)
    }

    /// Suppression logique, seulement depuis un statut terminal
    pub async fn supprimer(db: &DatabaseConnection, abonnement_id: i32) -> AppResult<()> {
        let abonnement = Self::charger(db, abonnement_id).await?;
        if !abonnement.statut.est_terminal() {
            return Err(AppError::validation(format!(
                "Subscription {} must be expired or cancelled before deletion",
                abonnement_id
            )));
        }

        let mut active: abonnement::ActiveModel = abonnement.into();
        active.deleted_at = Set(Some(Utc::now().naive_utc()));
        active.update(db).await?;

        tracing::info!(abonnement_id, "subscription archived");
        Ok(())
    }

    pub async fn obtenir(
        db: &DatabaseConnection,
        scope: &Scope,
        abonnement_id: i32,
    ) -> AppResult<abonnement::Model> {
        let abonnement = Self::charger(db, abonnement_id).await?;
        if !scope.covers_ecole(abonnement.ecole_id) {
            return Err(AppError::not_found(format!("Subscription {} not found", abonnement_id)));
        }
        Ok(abonnement)
    }

    pub async fn lister(db: &DatabaseConnection, scope: &Scope) -> AppResult<Vec<abonnement::Model>> {
        let mut query = abonnement::Entity::find()
            .filter(abonnement::Column::DeletedAt.is_null())
            .order_by_desc(abonnement::Column::DateDebut)
            .order_by_desc(abonnement::Column::Id);

        match scope {
            Scope::Admin => {}
            Scope::Ecole(ecole_id) => {
                query = query.filter(abonnement::Column::EcoleId.eq(*ecole_id));
            }
            Scope::Technicien(_) => {
                return Err(AppError::Forbidden("Technicians cannot list subscriptions".to_string()));
            }
        }

        Ok(query.all(db).await?)
    }

    /// Abonnement actif courant d'une sirène
    pub async fn abonnement_actif<C: ConnectionTrait>(
        conn: &C,
        sirene_id: i32,
    ) -> AppResult<Option<abonnement::Model>> {
        Ok(abonnement::Entity::find()
            .filter(abonnement::Column::SireneId.eq(sirene_id))
            .filter(abonnement::Column::Statut.eq(StatutAbonnement::Actif))
            .filter(abonnement::Column::DeletedAt.is_null())
            .one(conn)
            .await?)
    }

    /// Abonnement vivant (en_attente, actif ou suspendu) d'une sirène : au plus un
    pub async fn abonnement_vivant<C: ConnectionTrait>(
        conn: &C,
        sirene_id: i32,
    ) -> AppResult<Option<abonnement::Model>> {
        Ok(abonnement::Entity::find()
            .filter(abonnement::Column::SireneId.eq(sirene_id))
            .filter(abonnement::Column::Statut.is_in(StatutAbonnement::VIVANTS))
            .filter(abonnement::Column::DeletedAt.is_null())
            .one(conn)
            .await?)
    }

    pub async fn charger<C: ConnectionTrait>(
        conn: &C,
        abonnement_id: i32,
    ) -> AppResult<abonnement::Model> {
        abonnement::Entity::find_by_id(abonnement_id)
            .filter(abonnement::Column::DeletedAt.is_null())
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Subscription {} not found", abonnement_id)))
    }

    async fn verrouiller_sirene<C: ConnectionTrait>(conn: &C, sirene_id: i32) -> AppResult<sirene::Model> {
        let mut query = sirene::Entity::find_by_id(sirene_id).filter(sirene::Column::DeletedAt.is_null());
        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }

        query
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Sirene {} not found", sirene_id)))
    }

    async fn verifier_aucun_abonnement_vivant<C: ConnectionTrait>(conn: &C, sirene_id: i32) -> AppResult<()> {
        match Self::abonnement_vivant(conn, sirene_id).await? {
            Some(existant) => Err(AppError::validation(format!(
                "Sirene {} already has a live subscription ({} is {:?})",
                sirene_id, existant.id, existant.statut
            ))),
            None => Ok(()),
        }
    }

    async fn a_paiement_valide<C: ConnectionTrait>(conn: &C, abonnement_id: i32) -> AppResult<bool> {
        let count = paiement::Entity::find()
            .filter(paiement::Column::AbonnementId.eq(abonnement_id))
            .filter(paiement::Column::Statut.eq(StatutPaiement::Valide))
            .count(conn)
            .await?;
        Ok(count > 0)
    }

    async fn changer_statut<C: ConnectionTrait>(
        conn: &C,
        abonnement: abonnement::Model,
        statut: StatutAbonnement,
    ) -> AppResult<abonnement::Model> {
        if !abonnement.statut.peut_passer_a(statut) {
            return Err(AppError::validation(format!(
                "Transition {:?} -> {:?} is not allowed for subscription {}",
                abonnement.statut, statut, abonnement.id
            )));
        }

        let mut active: abonnement::ActiveModel = abonnement.into();
        active.statut = Set(statut);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(conn).await?)
    }

    /// Recalcule le statut sirène ; n'écrit que si la valeur change
    async fn synchroniser_statut_sirene<C: ConnectionTrait>(
        conn: &C,
        sirene: &sirene::Model,
        statut: StatutAbonnement,
    ) -> AppResult<()> {
        let Some(cible) = statut.statut_sirene_induit(sirene.statut) else {
            return Ok(());
        };
        if cible == sirene.statut {
            return Ok(());
        }

        let mut active: sirene::ActiveModel = sirene.clone().into();
        active.statut = Set(cible);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(conn).await?;

        tracing::info!(sirene_id = sirene.id, from = ?sirene.statut, to = ?cible, "sirene status updated");
        Ok(())
    }
}
