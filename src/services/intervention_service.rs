// ============================================================================
// SERVICE : INTERVENTIONS, RAPPORTS ET AVIS
// ============================================================================
//
// Description:
//   Travail d'un technicien accepté : acceptation, démarrage, fin, retrait
//   après intervention, rapport (individuel ou collectif), évaluation
//   admin et avis de l'école.
//
// Cycle d'une intervention:
//   assignee -> acceptee -> en_cours -> terminee
//   assignee | acceptee -> annulee (admin)
//
// Points d'attention:
//   - Un technicien suspendu ne peut pas démarrer
//   - Retrait d'un technicien (intervention terminée) : le compteur de
//     l'ordre baisse et les candidatures se rouvrent si la clôture était
//     automatique, dans la même transaction
//   - Rapport validé => panne resolue
//
// ============================================================================

use chrono::Utc;
use sea_orm::*;

use crate::error::{AppError, AppResult};
use crate::models::account::Scope;
use crate::models::avis;
use crate::models::dto::{AvisRequest, DecisionRapport, EvaluationRapportRequest, RapportRequest};
use crate::models::intervention::{self, StatutIntervention};
use crate::models::ordre_mission;
use crate::models::rapport_intervention::{self, StatutRapport};
use crate::services::mission_service::MissionService;
use crate::services::panne_service::PanneService;

pub struct InterventionService;

impl InterventionService {
    pub async fn accepter(
        db: &DatabaseConnection,
        technicien_id: i32,
        intervention_id: i32,
    ) -> AppResult<intervention::Model> {
        let intervention = Self::charger_pour(db, technicien_id, intervention_id).await?;
        if intervention.statut != StatutIntervention::Assignee {
            return Err(AppError::validation(format!(
                "Intervention {} cannot be accepted from status {:?}",
                intervention_id, intervention.statut
            )));
        }

        let intervention = Self::changer_statut(db, intervention, StatutIntervention::Acceptee).await?;
        tracing::info!(intervention_id, technicien_id, "intervention accepted");
        Ok(intervention)
    }

    pub async fn demarrer(
        db: &DatabaseConnection,
        technicien_id: i32,
        intervention_id: i32,
    ) -> AppResult<intervention::Model> {
        let txn = db.begin().await?;

        let intervention = Self::charger_pour(&txn, technicien_id, intervention_id).await?;
        if !matches!(intervention.statut, StatutIntervention::Assignee | StatutIntervention::Acceptee) {
            return Err(AppError::validation(format!(
                "Intervention {} cannot be started from status {:?}",
                intervention_id, intervention.statut
            )));
        }

        let candidature = MissionService::charger_candidature(&txn, intervention.mission_technicien_id).await?;
        if candidature.suspendue {
            return Err(AppError::precondition(format!(
                "Technician {} is suspended on this mission",
                technicien_id
            )));
        }

        let panne_id = intervention.panne_id;
        let mut active: intervention::ActiveModel = intervention.into();
        active.statut = Set(StatutIntervention::EnCours);
        active.date_debut = Set(Some(Utc::now().naive_utc()));
        let intervention = active.update(&txn).await?;

        PanneService::demarrer(&txn, panne_id).await?;

        txn.commit().await?;

        tracing::info!(intervention_id, technicien_id, panne_id, "intervention started");
        Ok(intervention)
    }

    pub async fn terminer(
        db: &DatabaseConnection,
        technicien_id: i32,
        intervention_id: i32,
        observations: Option<String>,
    ) -> AppResult<intervention::Model> {
        let intervention = Self::charger_pour(db, technicien_id, intervention_id).await?;
        if intervention.statut != StatutIntervention::EnCours {
            return Err(AppError::validation(format!(
                "Intervention {} is not in progress ({:?})",
                intervention_id, intervention.statut
            )));
        }

        let mut active: intervention::ActiveModel = intervention.into();
        active.statut = Set(StatutIntervention::Terminee);
        active.date_fin = Set(Some(Utc::now().naive_utc()));
        if observations.is_some() {
            active.observations = Set(observations);
        }
        let intervention = active.update(db).await?;

        tracing::info!(intervention_id, technicien_id, "intervention finished");
        Ok(intervention)
    }

    /// Retire le technicien d'une intervention terminée et libère sa place
    pub async fn retirer_technicien(
        db: &DatabaseConnection,
        intervention_id: i32,
    ) -> AppResult<ordre_mission::Model> {
        let txn = db.begin().await?;

        let intervention = Self::charger(&txn, intervention_id).await?;
        if intervention.statut != StatutIntervention::Terminee {
            return Err(AppError::validation(format!(
                "A technician can only be withdrawn from a finished intervention ({} is {:?})",
                intervention_id, intervention.statut
            )));
        }
        if intervention.technicien_retire {
            return Err(AppError::validation(format!(
                "Technician already withdrawn from intervention {}",
                intervention_id
            )));
        }

        let ordre_mission_id = intervention.ordre_mission_id;
        let mut active: intervention::ActiveModel = intervention.into();
        active.technicien_retire = Set(true);
        active.update(&txn).await?;

        let (ordre, rouvrir) = Self::liberer_place(&txn, ordre_mission_id).await?;

        txn.commit().await?;

        tracing::info!(
            intervention_id,
            ordre_mission_id = ordre.id,
            acceptes = ordre.nombre_techniciens_acceptes,
            rouverte = rouvrir,
            "technician withdrawn"
        );
        Ok(ordre)
    }

    /// Annulation admin d'une intervention pas encore démarrée.
    /// La place du technicien sur l'ordre est libérée comme pour un retrait.
    pub async fn annuler(
        db: &DatabaseConnection,
        intervention_id: i32,
    ) -> AppResult<intervention::Model> {
        let txn = db.begin().await?;

        let intervention = Self::charger(&txn, intervention_id).await?;
        if !matches!(intervention.statut, StatutIntervention::Assignee | StatutIntervention::Acceptee) {
            return Err(AppError::validation(format!(
                "Intervention {} cannot be cancelled from status {:?}",
                intervention_id, intervention.statut
            )));
        }

        let ordre_mission_id = intervention.ordre_mission_id;
        let mut active: intervention::ActiveModel = intervention.into();
        active.statut = Set(StatutIntervention::Annulee);
        active.technicien_retire = Set(true);
        active.date_fin = Set(Some(Utc::now().naive_utc()));
        let intervention = active.update(&txn).await?;

        let (ordre, rouvrir) = Self::liberer_place(&txn, ordre_mission_id).await?;

        txn.commit().await?;

        tracing::info!(
            intervention_id,
            ordre_mission_id,
            acceptes = ordre.nombre_techniciens_acceptes,
            rouverte = rouvrir,
            "intervention cancelled"
        );
        Ok(intervention)
    }

    pub async fn soumettre_rapport(
        db: &DatabaseConnection,
        technicien_id: i32,
        intervention_id: i32,
        request: RapportRequest,
    ) -> AppResult<rapport_intervention::Model> {
        let intervention = Self::charger_pour(db, technicien_id, intervention_id).await?;
        if intervention.statut != StatutIntervention::Terminee {
            return Err(AppError::validation(format!(
                "Intervention {} must be finished before reporting",
                intervention_id
            )));
        }

        let auteur = if request.collectif { None } else { Some(technicien_id) };

        let mut existant = rapport_intervention::Entity::find()
            .filter(rapport_intervention::Column::InterventionId.eq(intervention_id))
            .filter(rapport_intervention::Column::Statut.ne(StatutRapport::Rejete));
        existant = match auteur {
            Some(id) => existant.filter(rapport_intervention::Column::TechnicienId.eq(id)),
            None => existant.filter(rapport_intervention::Column::TechnicienId.is_null()),
        };
        if existant.one(db).await?.is_some() {
            return Err(AppError::validation(format!(
                "A report is already pending or validated for intervention {}",
                intervention_id
            )));
        }

        let rapport = rapport_intervention::ActiveModel {
            intervention_id: Set(intervention_id),
            technicien_id: Set(auteur),
            contenu: Set(request.contenu),
            diagnostic: Set(request.diagnostic),
            statut: Set(StatutRapport::Brouillon),
            note_admin: Set(None),
            commentaire_admin: Set(None),
            date_soumission: Set(Utc::now().naive_utc()),
            date_evaluation: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(rapport_id = rapport.id, intervention_id, collectif = rapport.est_collectif(), "report submitted");
        Ok(rapport)
    }

    /// brouillon -> valide | rejete ; un rapport validé résout la panne
    pub async fn evaluer_rapport(
        db: &DatabaseConnection,
        rapport_id: i32,
        request: EvaluationRapportRequest,
    ) -> AppResult<rapport_intervention::Model> {
        let txn = db.begin().await?;

        let rapport = rapport_intervention::Entity::find_by_id(rapport_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Report {} not found", rapport_id)))?;
        if rapport.statut != StatutRapport::Brouillon {
            return Err(AppError::validation(format!(
                "Report {} was already evaluated ({:?})",
                rapport_id, rapport.statut
            )));
        }

        let intervention = Self::charger(&txn, rapport.intervention_id).await?;

        let statut = match request.decision {
            DecisionRapport::Valide => StatutRapport::Valide,
            DecisionRapport::Rejete => StatutRapport::Rejete,
        };

        let mut active: rapport_intervention::ActiveModel = rapport.into();
        active.statut = Set(statut);
        active.note_admin = Set(request.note);
        active.commentaire_admin = Set(request.commentaire);
        active.date_evaluation = Set(Some(Utc::now().naive_utc()));
        let rapport = active.update(&txn).await?;

        if statut == StatutRapport::Valide {
            PanneService::resoudre(&txn, intervention.panne_id).await?;
        }

        txn.commit().await?;

        tracing::info!(rapport_id, statut = ?rapport.statut, note = ?rapport.note_admin, "report evaluated");
        Ok(rapport)
    }

    /// Avis de l'école sur une intervention terminée, une seule fois
    pub async fn noter(
        db: &DatabaseConnection,
        ecole_id: i32,
        intervention_id: i32,
        request: AvisRequest,
    ) -> AppResult<avis::Model> {
        if !(1..=5).contains(&request.note) {
            return Err(AppError::validation("Rating must be between 1 and 5"));
        }

        let intervention = Self::charger(db, intervention_id).await?;
        let panne = PanneService::charger(db, intervention.panne_id).await?;
        if panne.ecole_id != ecole_id {
            return Err(AppError::Forbidden(format!(
                "Intervention {} does not concern school {}",
                intervention_id, ecole_id
            )));
        }
        if intervention.statut != StatutIntervention::Terminee {
            return Err(AppError::validation(format!(
                "Intervention {} is not finished yet",
                intervention_id
            )));
        }

        let deja_note = avis::Entity::find()
            .filter(avis::Column::InterventionId.eq(intervention_id))
            .filter(avis::Column::EcoleId.eq(ecole_id))
            .one(db)
            .await?;
        if deja_note.is_some() {
            return Err(AppError::validation(format!(
                "Intervention {} was already rated",
                intervention_id
            )));
        }

        let avis = avis::ActiveModel {
            intervention_id: Set(intervention_id),
            ecole_id: Set(ecole_id),
            note: Set(request.note),
            commentaire: Set(request.commentaire),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(avis_id = avis.id, intervention_id, note = avis.note, "intervention rated");
        Ok(avis)
    }

    pub async fn lister(db: &DatabaseConnection, scope: &Scope) -> AppResult<Vec<intervention::Model>> {
        let mut query = intervention::Entity::find().order_by_desc(intervention::Column::DateAssignation);

        match scope {
            Scope::Admin => {}
            Scope::Technicien(id) => {
                query = query.filter(intervention::Column::TechnicienId.eq(*id));
            }
            Scope::Ecole(_) => {
                return Err(AppError::Forbidden("Schools cannot list interventions".to_string()));
            }
        }

        Ok(query.all(db).await?)
    }

    pub async fn rapports(db: &DatabaseConnection, intervention_id: i32) -> AppResult<Vec<rapport_intervention::Model>> {
        Ok(rapport_intervention::Entity::find()
            .filter(rapport_intervention::Column::InterventionId.eq(intervention_id))
            .order_by_asc(rapport_intervention::Column::DateSoumission)
            .all(db)
            .await?)
    }

    async fn charger<C: ConnectionTrait>(conn: &C, intervention_id: i32) -> AppResult<intervention::Model> {
        intervention::Entity::find_by_id(intervention_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Intervention {} not found", intervention_id)))
    }

    /// Charge une intervention du technicien ; celles des autres sont invisibles
    async fn charger_pour<C: ConnectionTrait>(
        conn: &C,
        technicien_id: i32,
        intervention_id: i32,
    ) -> AppResult<intervention::Model> {
        let intervention = Self::charger(conn, intervention_id).await?;
        if intervention.technicien_id != technicien_id {
            return Err(AppError::not_found(format!("Intervention {} not found", intervention_id)));
        }
        Ok(intervention)
    }

    /// Décrémente le compteur de l'ordre et rouvre les candidatures si la
    /// clôture était automatique
    async fn liberer_place<C: ConnectionTrait>(
        conn: &C,
        ordre_mission_id: i32,
    ) -> AppResult<(ordre_mission::Model, bool)> {
        let ordre = MissionService::verrouiller_ordre(conn, ordre_mission_id).await?;

        let mut ordre_maj = ordre.clone();
        ordre_maj.nombre_techniciens_acceptes = (ordre.nombre_techniciens_acceptes - 1).max(0);
        let rouvrir = ordre_maj.doit_rouvrir();

        let mut active: ordre_mission::ActiveModel = ordre.into();
        active.nombre_techniciens_acceptes = Set(ordre_maj.nombre_techniciens_acceptes);
        if rouvrir {
            active.candidature_cloturee = Set(false);
            active.date_cloture_candidature = Set(None);
        }
        Ok((active.update(conn).await?, rouvrir))
    }

    async fn changer_statut<C: ConnectionTrait>(
        conn: &C,
        intervention: intervention::Model,
        statut: StatutIntervention,
    ) -> AppResult<intervention::Model> {
        let mut active: intervention::ActiveModel = intervention.into();
        active.statut = Set(statut);
        Ok(active.update(conn).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::panne::StatutPanne;
    use crate::models::sirene::{self, StatutSirene};
    use crate::services::test_support::*;

    fn rapport(collectif: bool) -> RapportRequest {
        RapportRequest {
            contenu: "Module audio remplacé".to_string(),
            diagnostic: Some("Haut-parleur grillé".to_string()),
            collectif,
        }
    }

    async fn intervention_terminee(db: &DatabaseConnection, ordre_id: i32, technicien_id: i32) -> intervention::Model {
        let (_, intervention) = technicien_accepte(db, ordre_id, technicien_id).await;
        InterventionService::accepter(db, technicien_id, intervention.id).await.unwrap();
        InterventionService::demarrer(db, technicien_id, intervention.id).await.unwrap();
        InterventionService::terminer(db, technicien_id, intervention.id, Some("RAS".to_string()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_withdrawal_reopens_auto_closed_candidacies() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-I1", 2).await;

        let premiere = intervention_terminee(&db, ordre.id, 7).await;
        technicien_accepte(&db, ordre.id, 8).await;
        assert!(MissionService::charger_ordre(&db, ordre.id).await.unwrap().candidature_cloturee);

        let ordre = InterventionService::retirer_technicien(&db, premiere.id).await.unwrap();
        assert_eq!(ordre.nombre_techniciens_acceptes, 1);
        assert!(!ordre.candidature_cloturee);

        // Un seul retrait par intervention
        assert!(InterventionService::retirer_technicien(&db, premiere.id).await.is_err());
    }

    #[tokio::test]
    async fn test_withdrawal_keeps_manual_close() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-I2", 2).await;
        let intervention = intervention_terminee(&db, ordre.id, 7).await;
        MissionService::cloturer_candidatures(&db, ADMIN_ID, ordre.id).await.unwrap();

        let ordre = InterventionService::retirer_technicien(&db, intervention.id).await.unwrap();
        assert_eq!(ordre.nombre_techniciens_acceptes, 0);
        assert!(ordre.candidature_cloturee);
    }

    #[tokio::test]
    async fn test_withdrawal_requires_finished_intervention() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-I3", 1).await;
        let (_, intervention) = technicien_accepte(&db, ordre.id, 7).await;

        let err = InterventionService::retirer_technicien(&db, intervention.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_suspended_technician_cannot_start() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-I4", 1).await;
        let (candidature, intervention) = technicien_accepte(&db, ordre.id, 7).await;
        MissionService::suspendre(&db, candidature.id, true).await.unwrap();

        let err = InterventionService::demarrer(&db, 7, intervention.id).await.unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_validated_report_resolves_fault() {
        let db = crate::db::test_connection().await;
        let (panne, ordre) = ordre_valide(&db, "SRN-I5", 1).await;
        let intervention = intervention_terminee(&db, ordre.id, 7).await;
        assert_eq!(PanneService::charger(&db, panne.id).await.unwrap().statut, StatutPanne::EnCours);

        let rapport = InterventionService::soumettre_rapport(&db, 7, intervention.id, rapport(false))
            .await
            .unwrap();
        assert_eq!(rapport.technicien_id, Some(7));
        assert!(InterventionService::soumettre_rapport(&db, 7, intervention.id, self::rapport(false))
            .await
            .is_err());

        let evaluation = EvaluationRapportRequest {
            decision: DecisionRapport::Valide,
            note: Some(4),
            commentaire: None,
        };
        let rapport = InterventionService::evaluer_rapport(&db, rapport.id, evaluation).await.unwrap();
        assert_eq!(rapport.statut, StatutRapport::Valide);
        assert_eq!(rapport.note_admin, Some(4));

        let panne = PanneService::charger(&db, panne.id).await.unwrap();
        assert_eq!(panne.statut, StatutPanne::Resolue);
        // L'abonnement de l'école tient toujours la sirène
        let sirene = sirene::Entity::find_by_id(panne.sirene_id).one(&db).await.unwrap().unwrap();
        assert_eq!(sirene.statut, StatutSirene::Reserve);

        let panne = PanneService::cloturer(&db, panne.id).await.unwrap();
        assert_eq!(panne.statut, StatutPanne::Cloturee);
    }

    #[tokio::test]
    async fn test_collective_report() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-I6", 1).await;
        let intervention = intervention_terminee(&db, ordre.id, 7).await;

        let rapport = InterventionService::soumettre_rapport(&db, 7, intervention.id, rapport(true))
            .await
            .unwrap();
        assert!(rapport.est_collectif());
    }

    #[tokio::test]
    async fn test_rating_once_per_school() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-I7", 1).await;
        let intervention = intervention_terminee(&db, ordre.id, 7).await;
        let avis = AvisRequest {
            note: 5,
            commentaire: Some("Rapide".to_string()),
        };

        let err = InterventionService::noter(&db, ECOLE_ID + 1, intervention.id, avis.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        InterventionService::noter(&db, ECOLE_ID, intervention.id, avis.clone()).await.unwrap();
        let err = InterventionService::noter(&db, ECOLE_ID, intervention.id, avis).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_admin_cancel_frees_the_slot() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-I9", 1).await;
        let (_, intervention) = technicien_accepte(&db, ordre.id, 7).await;
        assert!(MissionService::charger_ordre(&db, ordre.id).await.unwrap().candidature_cloturee);

        let annulee = InterventionService::annuler(&db, intervention.id).await.unwrap();
        assert_eq!(annulee.statut, StatutIntervention::Annulee);
        assert!(annulee.technicien_retire);

        let ordre = MissionService::charger_ordre(&db, ordre.id).await.unwrap();
        assert_eq!(ordre.nombre_techniciens_acceptes, 0);
        assert!(!ordre.candidature_cloturee);

        // Ni redémarrage ni seconde annulation
        assert!(InterventionService::demarrer(&db, 7, intervention.id).await.is_err());
        let err = InterventionService::annuler(&db, intervention.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_started_intervention_cannot_be_cancelled() {
        let db = crate::db::test_connection().await;
        let (_, ordre) = ordre_valide(&db, "SRN-I10", 1).await;
        let (_, intervention) = technicien_accepte(&db, ordre.id, 7).await;
        InterventionService::demarrer(&db, 7, intervention.id).await.unwrap();

        let err = InterventionService::annuler(&db, intervention.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(MissionService::charger_ordre(&db, ordre.id).await.unwrap().nombre_techniciens_acceptes, 1);
    }
}
