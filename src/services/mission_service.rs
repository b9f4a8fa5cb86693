// ============================================================================
// SERVICE : ORDRES DE MISSION ET CANDIDATURES
// ============================================================================
//
// Description:
//   Candidatures des techniciens sur un ordre de mission, acceptation par
//   un admin (création de l'intervention), refus, retrait, suspension et
//   clôture manuelle des candidatures.
//
// Points d'attention:
//   - Acceptation : compteur, statut de l'ordre, clôture automatique au
//     quota et intervention créés dans la même transaction
//   - Clôture automatique : cloture_par reste NULL (réouverture possible),
//     clôture manuelle : cloture_par = admin (jamais rouverte)
//   - Une seule candidature non retirée par technicien et par ordre
//     (index unique partiel en dernier recours)
//
// ============================================================================

use chrono::Utc;
use sea_orm::*;

use crate::error::{AppError, AppResult};
use crate::models::account::Scope;
use crate::models::dto::CandidatureRequest;
use crate::models::intervention::{self, StatutIntervention};
use crate::models::mission_technicien::{self, StatutCandidature};
use crate::models::ordre_mission::{self, StatutOrdreMission};

pub struct MissionService;

impl MissionService {
    pub async fn soumettre(
        db: &DatabaseConnection,
        technicien_id: i32,
        ordre_mission_id: i32,
        request: CandidatureRequest,
    ) -> AppResult<mission_technicien::Model> {
        let ordre = Self::charger_ordre(db, ordre_mission_id).await?;
        let now = Utc::now().naive_utc();

        if !ordre.candidature_ouverte(now) {
            return Err(AppError::validation(format!(
                "Candidacies are closed for mission order {}",
                ordre_mission_id
            )));
        }

        let existante = mission_technicien::Entity::find()
            .filter(mission_technicien::Column::OrdreMissionId.eq(ordre_mission_id))
            .filter(mission_technicien::Column::TechnicienId.eq(technicien_id))
            .filter(mission_technicien::Column::Statut.is_in([StatutCandidature::Soumise, StatutCandidature::Acceptee]))
            .one(db)
            .await?;
        if existante.is_some() {
            return Err(AppError::validation(format!(
                "Technician {} already applied to mission order {}",
                technicien_id, ordre_mission_id
            )));
        }

        let candidature = mission_technicien::ActiveModel {
            ordre_mission_id: Set(ordre_mission_id),
            technicien_id: Set(technicien_id),
            statut: Set(StatutCandidature::Soumise),
            motivation: Set(request.motivation),
            suspendue: Set(false),
            date_candidature: Set(now),
            date_reponse: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(candidature_id = candidature.id, ordre_mission_id, technicien_id, "candidacy submitted");
        Ok(candidature)
    }

    /// Acceptation admin : une place doit être libre
    pub async fn accepter(
        db: &DatabaseConnection,
        candidature_id: i32,
    ) -> AppResult<(mission_technicien::Model, intervention::Model)> {
        let txn = db.begin().await?;

        let candidature = Self::charger_candidature(&txn, candidature_id).await?;
        if candidature.statut != StatutCandidature::Soumise {
            return Err(AppError::validation(format!(
                "Candidacy {} is already {:?}",
                candidature_id, candidature.statut
            )));
        }

        let ordre = Self::verrouiller_ordre(&txn, candidature.ordre_mission_id).await?;
        if !ordre.peut_accepter_technicien() {
            return Err(AppError::validation(format!(
                "Mission order {} has no slot left ({}/{} accepted, closed: {})",
                ordre.id, ordre.nombre_techniciens_acceptes, ordre.nombre_techniciens_requis, ordre.candidature_cloturee
            )));
        }

        let now = Utc::now().naive_utc();

        let mut active: mission_technicien::ActiveModel = candidature.into();
        active.statut = Set(StatutCandidature::Acceptee);
        active.date_reponse = Set(Some(now));
        let candidature = active.update(&txn).await?;

        let acceptes = ordre.nombre_techniciens_acceptes + 1;
        let quota_atteint = acceptes >= ordre.nombre_techniciens_requis;
        let panne_id = ordre.panne_id;
        let ordre_statut = ordre.statut;

        let mut active: ordre_mission::ActiveModel = ordre.into();
        active.nombre_techniciens_acceptes = Set(acceptes);
        if ordre_statut == StatutOrdreMission::EnAttente {
            active.statut = Set(StatutOrdreMission::EnCours);
        }
        if quota_atteint {
            active.candidature_cloturee = Set(true);
            active.date_cloture_candidature = Set(Some(now));
            active.cloture_par = Set(None);
        }
        let ordre = active.update(&txn).await?;

        let intervention = intervention::ActiveModel {
            panne_id: Set(panne_id),
            ordre_mission_id: Set(ordre.id),
            mission_technicien_id: Set(candidature.id),
            technicien_id: Set(candidature.technicien_id),
            statut: Set(StatutIntervention::Assignee),
            date_assignation: Set(now),
            date_debut: Set(None),
            date_fin: Set(None),
            observations: Set(None),
            technicien_retire: Set(false),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        tracing::info!(
            candidature_id,
            ordre_mission_id = ordre.id,
            intervention_id = intervention.id,
            acceptes = ordre.nombre_techniciens_acceptes,
            cloturee = ordre.candidature_cloturee,
            "candidacy accepted"
        );
        Ok((candidature, intervention))
    }

    pub async fn refuser(db: &DatabaseConnection, candidature_id: i32) -> AppResult<mission_technicien::Model> {
        let candidature = Self::charger_candidature(db, candidature_id).await?;
        if candidature.statut != StatutCandidature::Soumise {
            return Err(AppError::validation(format!(
                "Only a pending candidacy can be refused (candidacy {} is {:?})",
                candidature_id, candidature.statut
            )));
        }

        let mut active: mission_technicien::ActiveModel = candidature.into();
        active.statut = Set(StatutCandidature::Refusee);
        active.date_reponse = Set(Some(Utc::now().naive_utc()));
        let candidature = active.update(db).await?;

        tracing::info!(candidature_id, "candidacy refused");
        Ok(candidature)
    }

    /// Retrait par le technicien d'une candidature encore en attente
    pub async fn retirer_candidature(
        db: &DatabaseConnection,
        technicien_id: i32,
        candidature_id: i32,
    ) -> AppResult<mission_technicien::Model> {
        let candidature = Self::charger_candidature(db, candidature_id).await?;
        if candidature.technicien_id != technicien_id {
            return Err(AppError::Forbidden(format!(
                "Candidacy {} belongs to another technician",
                candidature_id
            )));
        }
        if candidature.statut != StatutCandidature::Soumise {
            return Err(AppError::validation(format!(
                "Only a pending candidacy can be withdrawn (candidacy {} is {:?})",
                candidature_id, candidature.statut
            )));
        }

        let mut active: mission_technicien::ActiveModel = candidature.into();
        active.statut = Set(StatutCandidature::Retiree);
        active.date_reponse = Set(Some(Utc::now().naive_utc()));
        let candidature = active.update(db).await?;

        tracing::info!(candidature_id, technicien_id, "candidacy withdrawn");
        Ok(candidature)
    }

    /// Suspension admin d'un technicien accepté
    pub async fn suspendre(
        db: &DatabaseConnection,
        candidature_id: i32,
        suspendue: bool,
    ) -> AppResult<mission_technicien::Model> {
        let candidature = Self::charger_candidature(db, candidature_id).await?;
        if candidature.statut != StatutCandidature::Acceptee {
            return Err(AppError::validation(format!(
                "Only an accepted candidacy can be suspended (candidacy {} is {:?})",
                candidature_id, candidature.statut
            )));
        }

        let mut active: mission_technicien::ActiveModel = candidature.into();
        active.suspendue = Set(suspendue);
        let candidature = active.update(db).await?;

        tracing::info!(candidature_id, suspendue, "candidacy suspension changed");
        Ok(candidature)
    }

    /// Clôture manuelle : désactive la réouverture automatique
    pub async fn cloturer_candidatures(
        db: &DatabaseConnection,
        admin_id: i32,
        ordre_mission_id: i32,
    ) -> AppResult<ordre_mission::Model> {
        let ordre = Self::charger_ordre(db, ordre_mission_id).await?;
        if ordre.candidature_cloturee && ordre.cloture_par.is_some() {
            return Err(AppError::validation(format!(
                "Candidacies of mission order {} are already closed",
                ordre_mission_id
            )));
        }

        let mut active: ordre_mission::ActiveModel = ordre.into();
        active.candidature_cloturee = Set(true);
        active.cloture_par = Set(Some(admin_id));
        active.date_cloture_candidature = Set(Some(Utc::now().naive_utc()));
        let ordre = active.update(db).await?;

        tracing::info!(ordre_mission_id, admin_id, "candidacies closed manually");
        Ok(ordre)
    }

    pub async fn lister_ordres(db: &DatabaseConnection, scope: &Scope) -> AppResult<Vec<ordre_mission::Model>> {
        let mut query = ordre_mission::Entity::find().order_by_desc(ordre_mission::Column::CreatedAt);

        match scope {
            Scope::Admin => {}
            Scope::Technicien(_) => {
                query = query.filter(ordre_mission::Column::Statut.ne(StatutOrdreMission::Termine));
            }
            Scope::Ecole(_) => {
                return Err(AppError::Forbidden("Schools cannot browse mission orders".to_string()));
            }
        }

        Ok(query.all(db).await?)
    }

    /// Admin : toutes les candidatures ; technicien : les siennes
    pub async fn lister_candidatures(
        db: &DatabaseConnection,
        scope: &Scope,
        ordre_mission_id: i32,
    ) -> AppResult<Vec<mission_technicien::Model>> {
        let mut query = mission_technicien::Entity::find()
            .filter(mission_technicien::Column::OrdreMissionId.eq(ordre_mission_id))
            .order_by_asc(mission_technicien::Column::DateCandidature);

        match scope {
            Scope::Admin => {}
            Scope::Technicien(id) => {
                query = query.filter(mission_technicien::Column::TechnicienId.eq(*id));
            }
            Scope::Ecole(_) => {
                return Err(AppError::Forbidden("Schools cannot browse candidacies".to_string()));
            }
        }

        Ok(query.all(db).await?)
    }

    pub async fn charger_ordre<C: ConnectionTrait>(conn: &C, ordre_mission_id: i32) -> AppResult<ordre_mission::Model> {
        ordre_mission::Entity::find_by_id(ordre_mission_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Mission order {} not found", ordre_mission_id)))
    }

    /// Sur PostgreSQL, FOR UPDATE sérialise les mises à jour du compteur
    pub async fn verrouiller_ordre<C: ConnectionTrait>(conn: &C, ordre_mission_id: i32) -> AppResult<ordre_mission::Model> {
        let mut query = ordre_mission::Entity::find_by_id(ordre_mission_id);
        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }

        query
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Mission order {} not found", ordre_mission_id)))
    }

    pub async fn charger_candidature<C: ConnectionTrait>(
        conn: &C,
        candidature_id: i32,
    ) -> AppResult<mission_technicien::Model> {
        mission_technicien::Entity::find_by_id(candidature_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Candidacy {} not found", candidature_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    #[tokio::test]
    async fn test_one_candidacy_per_technician() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-C1", 2).await;

        let candidature = MissionService::soumettre(&db, 7, ordre.id, CandidatureRequest::default())
            .await
            .unwrap();
        assert_eq!(candidature.statut, StatutCandidature::Soumise);

        let err = MissionService::soumettre(&db, 7, ordre.id, CandidatureRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Après retrait, le technicien peut candidater de nouveau
        MissionService::retirer_candidature(&db, 7, candidature.id).await.unwrap();
        MissionService::soumettre(&db, 7, ordre.id, CandidatureRequest::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_withdraw_someone_else_candidacy() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-C2", 1).await;
        let candidature = MissionService::soumettre(&db, 7, ordre.id, CandidatureRequest::default())
            .await
            .unwrap();

        let err = MissionService::retirer_candidature(&db, 8, candidature.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_quota_closes_candidacies() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-C3", 2).await;

        let (_, intervention) = technicien_accepte(&db, ordre.id, 7).await;
        assert_eq!(intervention.statut, StatutIntervention::Assignee);

        let apres_un = MissionService::charger_ordre(&db, ordre.id).await.unwrap();
        assert_eq!(apres_un.statut, StatutOrdreMission::EnCours);
        assert_eq!(apres_un.nombre_techniciens_acceptes, 1);
        assert!(!apres_un.candidature_cloturee);

        technicien_accepte(&db, ordre.id, 8).await;
        let plein = MissionService::charger_ordre(&db, ordre.id).await.unwrap();
        assert_eq!(plein.nombre_techniciens_acceptes, 2);
        assert!(plein.candidature_cloturee);
        assert_eq!(plein.cloture_par, None);

        let err = MissionService::soumettre(&db, 9, ordre.id, CandidatureRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_accept_without_slot() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-C4", 1).await;
        let premiere = MissionService::soumettre(&db, 7, ordre.id, CandidatureRequest::default())
            .await
            .unwrap();
        let seconde = MissionService::soumettre(&db, 8, ordre.id, CandidatureRequest::default())
            .await
            .unwrap();

        MissionService::accepter(&db, premiere.id).await.unwrap();
        let err = MissionService::accepter(&db, seconde.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let candidature = MissionService::charger_candidature(&db, seconde.id).await.unwrap();
        assert_eq!(candidature.statut, StatutCandidature::Soumise);
        let interventions = intervention::Entity::find().count(&db).await.unwrap();
        assert_eq!(interventions, 1);
    }

    #[tokio::test]
    async fn test_manual_close() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-C5", 3).await;

        let ordre = MissionService::cloturer_candidatures(&db, ADMIN_ID, ordre.id).await.unwrap();
        assert!(ordre.candidature_cloturee);
        assert_eq!(ordre.cloture_par, Some(ADMIN_ID));
        assert!(!ordre.doit_rouvrir());

        assert!(MissionService::cloturer_candidatures(&db, ADMIN_ID, ordre.id).await.is_err());
    }

    #[tokio::test]
    async fn test_suspend_only_accepted() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-C6", 1).await;
        let candidature = MissionService::soumettre(&db, 7, ordre.id, CandidatureRequest::default())
            .await
            .unwrap();

        assert!(MissionService::suspendre(&db, candidature.id, true).await.is_err());

        MissionService::accepter(&db, candidature.id).await.unwrap();
        let suspendue = MissionService::suspendre(&db, candidature.id, true).await.unwrap();
        assert!(suspendue.suspendue);
    }
}
