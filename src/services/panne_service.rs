// ============================================================================
// SERVICE : PANNES
// ============================================================================
//
// Description:
//   Déclaration d'une panne par une école (ou un admin), validation par un
//   admin (création de l'ordre de mission), résolution et clôture.
//
// Cycle:
//   en_attente -> validee -> en_cours -> resolue -> cloturee
//
// Points d'attention:
//   - Une école ne déclare que sur une sirène qu'elle loue (abonnement vivant)
//   - La validation passe la sirène en_panne ; la résolution la remet en
//     reserve si un abonnement vivant la tient, sinon en_stock
//
// ============================================================================

use chrono::Utc;
use sea_orm::*;

use crate::error::{AppError, AppResult};
use crate::models::account::Scope;
use crate::models::dto::{DeclarePanneRequest, ValidatePanneRequest};
use crate::models::ordre_mission::{self, StatutOrdreMission};
use crate::models::panne::{self, StatutPanne};
use crate::models::sirene::{self, StatutSirene};
use crate::services::abonnement_service::AbonnementService;

pub struct PanneService;

impl PanneService {
    pub async fn declarer(
        db: &DatabaseConnection,
        scope: &Scope,
        request: DeclarePanneRequest,
    ) -> AppResult<panne::Model> {
        let ecole_id = match scope {
            Scope::Ecole(id) => *id,
            Scope::Admin => request
                .ecole_id
                .ok_or_else(|| AppError::validation("ecole_id is required"))?,
            Scope::Technicien(_) => {
                return Err(AppError::Forbidden("Technicians cannot declare faults".to_string()));
            }
        };

        let sirene = sirene::Entity::find_by_id(request.sirene_id)
            .filter(sirene::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Sirene {} not found", request.sirene_id)))?;

        // Une école ne déclare que sur une sirène qu'elle loue
        if let Scope::Ecole(id) = scope {
            let loue = AbonnementService::abonnement_vivant(db, sirene.id)
                .await?
                .is_some_and(|abonnement| abonnement.ecole_id == *id);
            if !loue {
                return Err(AppError::Forbidden(format!(
                    "Sirene {} is not subscribed by school {}",
                    sirene.id, id
                )));
            }
        }

        let panne = panne::ActiveModel {
            sirene_id: Set(sirene.id),
            ecole_id: Set(ecole_id),
            site_id: Set(request.site_id.or(sirene.site_id)),
            description: Set(request.description),
            priorite: Set(request.priorite),
            statut: Set(StatutPanne::EnAttente),
            date_declaration: Set(Utc::now().naive_utc()),
            valide_par: Set(None),
            date_validation: Set(None),
            date_resolution: Set(None),
            date_cloture: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(panne_id = panne.id, sirene_id = sirene.id, ecole_id, priorite = ?panne.priorite, "fault declared");
        Ok(panne)
    }

    /// Validation admin : la panne passe validee et un ordre de mission est ouvert
    pub async fn valider(
        db: &DatabaseConnection,
        admin_id: i32,
        panne_id: i32,
        request: ValidatePanneRequest,
    ) -> AppResult<(panne::Model, ordre_mission::Model)> {
        if let (Some(debut), Some(fin)) = (request.date_debut_candidature, request.date_fin_candidature) {
            if debut > fin {
                return Err(AppError::validation("Candidacy window ends before it starts"));
            }
        }

        let txn = db.begin().await?;

        let panne = Self::charger(&txn, panne_id).await?;
        if panne.statut != StatutPanne::EnAttente {
            return Err(AppError::validation(format!(
                "Fault {} is already {:?}",
                panne_id, panne.statut
            )));
        }

        let now = Utc::now().naive_utc();
        let sirene_id = panne.sirene_id;

        let mut active: panne::ActiveModel = panne.into();
        active.statut = Set(StatutPanne::Validee);
        active.valide_par = Set(Some(admin_id));
        active.date_validation = Set(Some(now));
        let panne = active.update(&txn).await?;

        let ordre = ordre_mission::ActiveModel {
            panne_id: Set(panne.id),
            description: Set(request.description),
            date_debut_candidature: Set(request.date_debut_candidature),
            date_fin_candidature: Set(request.date_fin_candidature),
            nombre_techniciens_requis: Set(request.nombre_techniciens_requis),
            nombre_techniciens_acceptes: Set(0),
            candidature_cloturee: Set(false),
            date_cloture_candidature: Set(None),
            cloture_par: Set(None),
            statut: Set(StatutOrdreMission::EnAttente),
            valide_par: Set(admin_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        Self::changer_statut_sirene(&txn, sirene_id, StatutSirene::EnPanne).await?;

        txn.commit().await?;

        tracing::info!(panne_id, ordre_mission_id = ordre.id, admin_id, "fault validated");
        Ok((panne, ordre))
    }

    /// validee -> en_cours, au démarrage de la première intervention
    pub async fn demarrer<C: ConnectionTrait>(conn: &C, panne_id: i32) -> AppResult<()> {
        let panne = Self::charger(conn, panne_id).await?;
        if panne.statut != StatutPanne::Validee {
            return Ok(());
        }

        let mut active: panne::ActiveModel = panne.into();
        active.statut = Set(StatutPanne::EnCours);
        active.update(conn).await?;

        tracing::info!(panne_id, "fault repair started");
        Ok(())
    }

    /// en_cours -> resolue, sur validation d'un rapport
    pub async fn resoudre<C: ConnectionTrait>(conn: &C, panne_id: i32) -> AppResult<()> {
        let panne = Self::charger(conn, panne_id).await?;
        if panne.statut != StatutPanne::EnCours {
            tracing::warn!(panne_id, statut = ?panne.statut, "validated report on a fault that is not in progress");
            return Ok(());
        }

        let sirene_id = panne.sirene_id;
        let mut active: panne::ActiveModel = panne.into();
        active.statut = Set(StatutPanne::Resolue);
        active.date_resolution = Set(Some(Utc::now().naive_utc()));
        active.update(conn).await?;

        let statut = if AbonnementService::abonnement_vivant(conn, sirene_id).await?.is_some() {
            StatutSirene::Reserve
        } else {
            StatutSirene::EnStock
        };
        Self::changer_statut_sirene(conn, sirene_id, statut).await?;

        tracing::info!(panne_id, "fault resolved");
        Ok(())
    }

    /// resolue -> cloturee (admin)
    pub async fn cloturer(db: &DatabaseConnection, panne_id: i32) -> AppResult<panne::Model> {
        let panne = Self::charger(db, panne_id).await?;
        if panne.statut != StatutPanne::Resolue {
            return Err(AppError::validation(format!(
                "Only a resolved fault can be closed (fault {} is {:?})",
                panne_id, panne.statut
            )));
        }

        let mut active: panne::ActiveModel = panne.into();
        active.statut = Set(StatutPanne::Cloturee);
        active.date_cloture = Set(Some(Utc::now().naive_utc()));
        let panne = active.update(db).await?;

        tracing::info!(panne_id, "fault closed");
        Ok(panne)
    }

    pub async fn obtenir(db: &DatabaseConnection, scope: &Scope, panne_id: i32) -> AppResult<panne::Model> {
        let panne = Self::charger(db, panne_id).await?;
        match scope {
            Scope::Ecole(id) if *id != panne.ecole_id => {
                Err(AppError::not_found(format!("Fault {} not found", panne_id)))
            }
            _ => Ok(panne),
        }
    }

    /// Techniciens : pannes validées ou en cours seulement
    pub async fn lister(db: &DatabaseConnection, scope: &Scope) -> AppResult<Vec<panne::Model>> {
        let mut query = panne::Entity::find().order_by_desc(panne::Column::DateDeclaration);

        match scope {
            Scope::Admin => {}
            Scope::Ecole(ecole_id) => {
                query = query.filter(panne::Column::EcoleId.eq(*ecole_id));
            }
            Scope::Technicien(_) => {
                query = query.filter(panne::Column::Statut.is_in([StatutPanne::Validee, StatutPanne::EnCours]));
            }
        }

        Ok(query.all(db).await?)
    }

    pub async fn charger<C: ConnectionTrait>(conn: &C, panne_id: i32) -> AppResult<panne::Model> {
        panne::Entity::find_by_id(panne_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Fault {} not found", panne_id)))
    }

    async fn changer_statut_sirene<C: ConnectionTrait>(conn: &C, sirene_id: i32, statut: StatutSirene) -> AppResult<()> {
        let sirene = sirene::Entity::find_by_id(sirene_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Sirene {} not found", sirene_id)))?;
        if sirene.statut == statut {
            return Ok(());
        }

        let precedent = sirene.statut;
        let mut active: sirene::ActiveModel = sirene.into();
        active.statut = Set(statut);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(conn).await?;

        tracing::info!(sirene_id, from = ?precedent, to = ?statut, "sirene status updated");
        Ok(())
    }
}
