// ============================================================================
// SERVICE : PROGRAMMATIONS
// ============================================================================
//
// Description:
//   Création, modification et régénération des plannings de sonnerie,
//   calcul du planning effectif d'une date et service du planning courant
//   au boîtier.
//
// Points d'attention:
//   - Toute modification régénère la chaîne chiffrée (version + 1, nouveau
//     nonce) dans la même transaction : jamais de chaîne périmée
//   - Un abonnement actif sur la sirène est requis pour écrire
//   - Fenêtre de validité incluse dans celle de l'abonnement lié
//
// ============================================================================

use chrono::{NaiveDate, Utc};
use sea_orm::*;

use crate::error::{AppError, AppResult};
use crate::models::abonnement::{self, StatutAbonnement};
use crate::models::account::Scope;
use crate::models::dto::{CreateProgrammationRequest, UpdateProgrammationRequest};
use crate::models::programmation::{self, ExceptionFerie, HoraireSonnerie};
use crate::models::sirene;
use crate::services::abonnement_service::AbonnementService;
use crate::services::calendrier_service::CalendrierService;
use crate::services::programmation::encodeur::{self, ChargeUtile};
use crate::services::programmation::horaires::{jours_actifs, valider_horaires};
use crate::services::programmation::planning::Planning;
use crate::utils::crypto::SireneCipher;

pub struct ProgrammationService;

/// Sirène et école/site pour lesquels une programmation est écrite
#[derive(Debug, Clone, Copy)]
struct Locataire {
    sirene_id: i32,
    ecole_id: i32,
    site_id: i32,
}

impl Locataire {
    fn de(programmation: &programmation::Model) -> Self {
        Self {
            sirene_id: programmation.sirene_id,
            ecole_id: programmation.ecole_id,
            site_id: programmation.site_id,
        }
    }
}

impl ProgrammationService {
    pub async fn creer(
        db: &DatabaseConnection,
        cipher: &SireneCipher,
        scope: &Scope,
        request: CreateProgrammationRequest,
    ) -> AppResult<programmation::Model> {
        Self::verifier_ecriture(scope, request.ecole_id)?;
        valider_horaires(&request.horaires)?;
        Self::verifier_fenetre(request.date_debut, request.date_fin)?;

        let txn = db.begin().await?;

        sirene::Entity::find_by_id(request.sirene_id)
            .filter(sirene::Column::DeletedAt.is_null())
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Sirene {} not found", request.sirene_id)))?;

        Self::verifier_abonnement(
            &txn,
            Locataire {
                sirene_id: request.sirene_id,
                ecole_id: request.ecole_id,
                site_id: request.site_id,
            },
            request.abonnement_id,
            request.date_debut,
            request.date_fin,
        )
        .await?;
        Self::verifier_calendrier(&txn, request.calendrier_id, &request.jours_feries_exceptions).await?;

        let now = Utc::now().naive_utc();
        let brouillon = programmation::ActiveModel {
            nom: Set(request.nom),
            sirene_id: Set(request.sirene_id),
            site_id: Set(request.site_id),
            ecole_id: Set(request.ecole_id),
            abonnement_id: Set(request.abonnement_id),
            calendrier_id: Set(request.calendrier_id),
            horaires: Set(serde_json::to_string(&request.horaires)?),
            jours_feries_inclus: Set(request.jours_feries_inclus),
            jours_feries_exceptions: Set(serde_json::to_string(&request.jours_feries_exceptions)?),
            date_debut: Set(request.date_debut),
            date_fin: Set(request.date_fin),
            actif: Set(true),
            chaine_programmee: Set(String::new()),
            chaine_cryptee: Set(String::new()),
            version: Set(0),
            date_generation: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // L'identifiant fait partie de la charge utile : génération après insertion
        let programmation = Self::regenerer_avec(&txn, cipher, brouillon).await?;

        txn.commit().await?;

        tracing::info!(
            programmation_id = programmation.id,
            sirene_id = programmation.sirene_id,
            "programmation created"
        );
        Ok(programmation)
    }

    pub async fn modifier(
        db: &DatabaseConnection,
        cipher: &SireneCipher,
        scope: &Scope,
        programmation_id: i32,
        request: UpdateProgrammationRequest,
    ) -> AppResult<programmation::Model> {
        let txn = db.begin().await?;

        let actuelle = Self::charger(&txn, programmation_id).await?;
        Self::verifier_ecriture(scope, actuelle.ecole_id)?;

        let horaires = match request.horaires {
            Some(horaires) => horaires,
            None => actuelle.horaires()?,
        };
        let exceptions = match request.jours_feries_exceptions {
            Some(exceptions) => exceptions,
            None => actuelle.exceptions()?,
        };
        let date_debut = request.date_debut.unwrap_or(actuelle.date_debut);
        let date_fin = request.date_fin.unwrap_or(actuelle.date_fin);

        valider_horaires(&horaires)?;
        Self::verifier_fenetre(date_debut, date_fin)?;
        Self::verifier_abonnement(&txn, Locataire::de(&actuelle), actuelle.abonnement_id, date_debut, date_fin).await?;
        Self::verifier_calendrier(&txn, actuelle.calendrier_id, &exceptions).await?;

        let mut active: programmation::ActiveModel = actuelle.into();
        if let Some(nom) = request.nom {
            active.nom = Set(nom);
        }
        if let Some(inclus) = request.jours_feries_inclus {
            active.jours_feries_inclus = Set(inclus);
        }
        if let Some(actif) = request.actif {
            active.actif = Set(actif);
        }
        active.horaires = Set(serde_json::to_string(&horaires)?);
        active.jours_feries_exceptions = Set(serde_json::to_string(&exceptions)?);
        active.date_debut = Set(date_debut);
        active.date_fin = Set(date_fin);
        let modifiee = active.update(&txn).await?;

        let programmation = Self::regenerer_avec(&txn, cipher, modifiee).await?;

        txn.commit().await?;

        tracing::info!(programmation_id, version = programmation.version, "programmation updated");
        Ok(programmation)
    }

    /// Régénération explicite (nouveau nonce, version + 1)
    pub async fn regenerer(
        db: &DatabaseConnection,
        cipher: &SireneCipher,
        scope: &Scope,
        programmation_id: i32,
    ) -> AppResult<programmation::Model> {
        let txn = db.begin().await?;

        let actuelle = Self::charger(&txn, programmation_id).await?;
        Self::verifier_ecriture(scope, actuelle.ecole_id)?;
        Self::verifier_abonnement(
            &txn,
            Locataire::de(&actuelle),
            actuelle.abonnement_id,
            actuelle.date_debut,
            actuelle.date_fin,
        )
        .await?;

        let programmation = Self::regenerer_avec(&txn, cipher, actuelle).await?;
        txn.commit().await?;

        tracing::info!(programmation_id, version = programmation.version, "programmation regenerated");
        Ok(programmation)
    }

    /// Recompile résumé et chaîne chiffrée depuis l'état enregistré
    pub async fn regenerer_avec<C: ConnectionTrait>(
        conn: &C,
        cipher: &SireneCipher,
        programmation: programmation::Model,
    ) -> AppResult<programmation::Model> {
        let horaires = programmation.horaires()?;
        let exceptions = programmation.exceptions()?;
        let jours_semaine = jours_actifs(&horaires);
        let now = Utc::now().naive_utc();

        let chaine_programmee = encodeur::resume(
            &horaires,
            &jours_semaine,
            programmation.jours_feries_inclus,
            &exceptions,
            programmation.date_debut,
            programmation.date_fin,
        );

        let charge = ChargeUtile {
            programmation_id: programmation.id,
            sirene_id: programmation.sirene_id,
            ecole_id: programmation.ecole_id,
            site_id: programmation.site_id,
            nom: programmation.nom.clone(),
            horaires,
            jours_semaine,
            date_debut: programmation.date_debut,
            date_fin: programmation.date_fin,
            jours_feries_inclus: programmation.jours_feries_inclus,
            jours_feries_exceptions: exceptions,
            actif: programmation.actif,
            date_generation: encodeur::horodatage(now),
            nonce: encodeur::nouveau_nonce(),
        };
        let chaine_cryptee = charge.encoder(cipher)?;

        let version = programmation.version + 1;
        let mut active: programmation::ActiveModel = programmation.into();
        active.chaine_programmee = Set(chaine_programmee);
        active.chaine_cryptee = Set(chaine_cryptee);
        active.version = Set(version);
        active.date_generation = Set(now);
        active.updated_at = Set(now);

        Ok(active.update(conn).await?)
    }

    pub async fn obtenir(
        db: &DatabaseConnection,
        scope: &Scope,
        programmation_id: i32,
    ) -> AppResult<programmation::Model> {
        let programmation = Self::charger(db, programmation_id).await?;
        if !scope.covers_ecole(programmation.ecole_id) {
            return Err(AppError::not_found(format!("Programmation {} not found", programmation_id)));
        }
        Ok(programmation)
    }

    pub async fn lister(
        db: &DatabaseConnection,
        scope: &Scope,
        sirene_id: Option<i32>,
    ) -> AppResult<Vec<programmation::Model>> {
        let mut query = programmation::Entity::find()
            .filter(programmation::Column::DeletedAt.is_null())
            .order_by_desc(programmation::Column::DateGeneration);

        match scope {
            Scope::Admin => {}
            Scope::Ecole(ecole_id) => {
                query = query.filter(programmation::Column::EcoleId.eq(*ecole_id));
            }
            Scope::Technicien(_) => {
                return Err(AppError::Forbidden("Technicians cannot list programmations".to_string()));
            }
        }
        if let Some(sirene_id) = sirene_id {
            query = query.filter(programmation::Column::SireneId.eq(sirene_id));
        }

        Ok(query.all(db).await?)
    }

    pub async fn supprimer(db: &DatabaseConnection, scope: &Scope, programmation_id: i32) -> AppResult<()> {
        let programmation = Self::charger(db, programmation_id).await?;
        Self::verifier_ecriture(scope, programmation.ecole_id)?;

        let now = Utc::now().naive_utc();
        let mut active: programmation::ActiveModel = programmation.into();
        active.actif = Set(false);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(db).await?;

        tracing::info!(programmation_id, "programmation deleted");
        Ok(())
    }

    /// Sonneries effectives d'une date (fériés, exceptions et fenêtre appliqués)
    pub async fn planning(
        db: &DatabaseConnection,
        scope: &Scope,
        programmation_id: i32,
        date: NaiveDate,
    ) -> AppResult<Vec<HoraireSonnerie>> {
        let programmation = Self::obtenir(db, scope, programmation_id).await?;
        let horaires = programmation.horaires()?;
        let exceptions = programmation.exceptions()?;
        let feries =
            CalendrierService::charger_jours_feries(db, programmation.calendrier_id, Some(programmation.ecole_id))
                .await?;

        let planning = Planning {
            horaires: &horaires,
            jours_feries_inclus: programmation.jours_feries_inclus,
            exceptions: &exceptions,
            date_debut: programmation.date_debut,
            date_fin: programmation.date_fin,
            actif: programmation.actif,
        };

        Ok(planning.sonneries(date, &feries).into_iter().cloned().collect())
    }

    /// Programmation servie au boîtier : la plus récemment générée parmi
    /// les actives de l'école abonnée dont la fenêtre contient la date du jour
    pub async fn programmation_courante(
        db: &DatabaseConnection,
        abonnement: &abonnement::Model,
        today: NaiveDate,
    ) -> AppResult<programmation::Model> {
        let sirene_id = abonnement.sirene_id;
        programmation::Entity::find()
            .filter(programmation::Column::SireneId.eq(sirene_id))
            .filter(programmation::Column::EcoleId.eq(abonnement.ecole_id))
            .filter(programmation::Column::Actif.eq(true))
            .filter(programmation::Column::DeletedAt.is_null())
            .filter(programmation::Column::DateDebut.lte(today))
            .filter(programmation::Column::DateFin.gte(today))
            .order_by_desc(programmation::Column::DateGeneration)
            .order_by_desc(programmation::Column::Id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No active programmation for sirene {}", sirene_id)))
    }

    async fn charger<C: ConnectionTrait>(conn: &C, programmation_id: i32) -> AppResult<programmation::Model> {
        programmation::Entity::find_by_id(programmation_id)
            .filter(programmation::Column::DeletedAt.is_null())
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Programmation {} not found", programmation_id)))
    }

    fn verifier_ecriture(scope: &Scope, ecole_id: i32) -> AppResult<()> {
        if scope.covers_ecole(ecole_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Not allowed to manage programmations of school {}",
                ecole_id
            )))
        }
    }

    fn verifier_fenetre(date_debut: NaiveDate, date_fin: NaiveDate) -> AppResult<()> {
        if date_debut > date_fin {
            return Err(AppError::validation(format!(
                "date_debut ({}) must be before or equal to date_fin ({})",
                date_debut, date_fin
            )));
        }
        Ok(())
    }

    /// Abonnement actif requis sur la sirène, souscrit par la même école pour
    /// le même site ; s'il est lié explicitement, il doit couvrir la fenêtre.
    async fn verifier_abonnement<C: ConnectionTrait>(
        conn: &C,
        locataire: Locataire,
        abonnement_id: Option<i32>,
        date_debut: NaiveDate,
        date_fin: NaiveDate,
    ) -> AppResult<()> {
        let sirene_id = locataire.sirene_id;
        let abonnement = match abonnement_id {
            Some(id) => {
                let lie = AbonnementService::charger(conn, id).await?;
                if lie.sirene_id != sirene_id {
                    return Err(AppError::validation(format!(
                        "Subscription {} does not cover sirene {}",
                        id, sirene_id
                    )));
                }
                lie
            }
            None => AbonnementService::abonnement_actif(conn, sirene_id)
                .await?
                .ok_or_else(|| {
                    AppError::precondition(format!("Sirene {} has no active subscription", sirene_id))
                })?,
        };

        if abonnement.ecole_id != locataire.ecole_id {
            return Err(AppError::Forbidden(format!(
                "Sirene {} is not subscribed by school {}",
                sirene_id, locataire.ecole_id
            )));
        }
        if abonnement.site_id != locataire.site_id {
            return Err(AppError::validation(format!(
                "Subscription {} is for site {}, not site {}",
                abonnement.id, abonnement.site_id, locataire.site_id
            )));
        }

        if abonnement.statut != StatutAbonnement::Actif {
            return Err(AppError::precondition(format!(
                "Subscription {} is not active ({:?})",
                abonnement.id, abonnement.statut
            )));
        }

        if abonnement_id.is_some() {
            Self::verifier_inclusion(&abonnement, date_debut, date_fin)?;
        }
        Ok(())
    }

    fn verifier_inclusion(abonnement: &abonnement::Model, date_debut: NaiveDate, date_fin: NaiveDate) -> AppResult<()> {
        if date_debut < abonnement.date_debut || date_fin > abonnement.date_fin {
            return Err(AppError::validation(format!(
                "Programmation window {}..{} exceeds subscription {} window {}..{}",
                date_debut, date_fin, abonnement.id, abonnement.date_debut, abonnement.date_fin
            )));
        }
        Ok(())
    }

    /// Exceptions hors année scolaire : signalées, pas rejetées
    async fn verifier_calendrier<C: ConnectionTrait>(
        conn: &C,
        calendrier_id: Option<i32>,
        exceptions: &[ExceptionFerie],
    ) -> AppResult<()> {
        let Some(calendrier_id) = calendrier_id else {
            return Ok(());
        };
        let calendrier = CalendrierService::obtenir_calendrier(conn, calendrier_id).await?;

        for exception in exceptions.iter().filter(|e| !calendrier.contient(e.date)) {
            tracing::warn!(
                calendrier_id,
                date = %exception.date,
                "holiday exception outside the school year"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dto::CreateJourFerieRequest;
    use crate::models::programmation::ActionException;
    use crate::services::test_support::*;
    use chrono::{Datelike, Duration};

    fn horaire(heure: u8, minute: u8, jours: Vec<u8>) -> HoraireSonnerie {
        HoraireSonnerie {
            heure,
            minute,
            jours,
            duree_sonnerie: 5,
            description: None,
        }
    }

    fn demande(sirene_id: i32, abonnement: Option<&abonnement::Model>) -> CreateProgrammationRequest {
        let today = Utc::now().date_naive();
        CreateProgrammationRequest {
            nom: "Horaires de classe".to_string(),
            sirene_id,
            site_id: SITE_ID,
            ecole_id: ECOLE_ID,
            abonnement_id: abonnement.map(|a| a.id),
            calendrier_id: None,
            horaires: vec![horaire(7, 30, vec![1, 2, 3, 4, 5]), horaire(12, 0, vec![1])],
            jours_feries_inclus: false,
            jours_feries_exceptions: Vec::new(),
            date_debut: today,
            date_fin: today + Duration::days(60),
        }
    }

    fn prochain_lundi() -> NaiveDate {
        let today = Utc::now().date_naive();
        let decalage = 7 - today.weekday().num_days_from_monday() as i64;
        today + Duration::days(decalage)
    }

    #[tokio::test]
    async fn test_create_compiles_payload() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (abonnement, sirene) = abonnement_actif(&db, &cipher, "SRN-G1").await;

        let programmation = ProgrammationService::creer(&db, &cipher, &Scope::Ecole(ECOLE_ID), demande(sirene.id, Some(&abonnement)))
            .await
            .unwrap();

        assert_eq!(programmation.version, 1);
        assert!(programmation.chaine_programmee.starts_with("07:30 [Lun,Mar,Mer,Jeu,Ven] 5s | 12:00 [Lun] 5s"));
        assert!(programmation.chaine_programmee.contains("feries=exclus"));

        let charge = ChargeUtile::decoder(&cipher, &programmation.chaine_cryptee).unwrap();
        assert_eq!(charge.programmation_id, programmation.id);
        assert_eq!(charge.jours_semaine, vec![1, 2, 3, 4, 5]);
        assert_eq!(charge.nonce.len(), 16);
    }

    #[tokio::test]
    async fn test_create_requires_active_subscription() {
        let db = crate::db::test_connection().await;
        let sirene = creer_sirene(&db, "SRN-G2").await;
        creer_abonnement(&db, sirene.id).await;

        let err = ProgrammationService::creer(&db, &cipher(), &Scope::Admin, demande(sirene.id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_duplicate_ring_times_rejected() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (_, sirene) = abonnement_actif(&db, &cipher, "SRN-G3").await;

        let mut request = demande(sirene.id, None);
        request.horaires = vec![horaire(7, 30, vec![1, 2]), horaire(7, 30, vec![2, 1])];

        let err = ProgrammationService::creer(&db, &cipher, &Scope::Admin, request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(programmation::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_window_must_fit_subscription() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (abonnement, sirene) = abonnement_actif(&db, &cipher, "SRN-G4").await;

        let mut request = demande(sirene.id, Some(&abonnement));
        request.date_fin = abonnement.date_fin + Duration::days(1);

        let err = ProgrammationService::creer(&db, &cipher, &Scope::Admin, request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_other_school_cannot_create() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (_, sirene) = abonnement_actif(&db, &cipher, "SRN-G5").await;

        let err = ProgrammationService::creer(&db, &cipher, &Scope::Ecole(ECOLE_ID + 1), demande(sirene.id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_regeneration_changes_ciphertext() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (_, sirene) = abonnement_actif(&db, &cipher, "SRN-G6").await;
        let premiere = ProgrammationService::creer(&db, &cipher, &Scope::Admin, demande(sirene.id, None))
            .await
            .unwrap();

        let seconde = ProgrammationService::regenerer(&db, &cipher, &Scope::Admin, premiere.id)
            .await
            .unwrap();

        assert_eq!(seconde.version, 2);
        assert_ne!(seconde.chaine_cryptee, premiere.chaine_cryptee);
        assert_eq!(seconde.chaine_programmee, premiere.chaine_programmee);
    }

    #[tokio::test]
    async fn test_regeneration_requires_active_subscription() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (abonnement, sirene) = abonnement_actif(&db, &cipher, "SRN-G7").await;
        let programmation = ProgrammationService::creer(&db, &cipher, &Scope::Admin, demande(sirene.id, None))
            .await
            .unwrap();
        AbonnementService::suspendre(&db, abonnement.id).await.unwrap();

        let err = ProgrammationService::regenerer(&db, &cipher, &Scope::Admin, programmation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_holiday_exclusion_and_include_exception() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (_, sirene) = abonnement_actif(&db, &cipher, "SRN-G8").await;
        let lundi = prochain_lundi();

        let programmation = ProgrammationService::creer(&db, &cipher, &Scope::Admin, demande(sirene.id, None))
            .await
            .unwrap();
        assert_eq!(
            ProgrammationService::planning(&db, &Scope::Admin, programmation.id, lundi).await.unwrap().len(),
            2
        );

        CalendrierService::ajouter_jour_ferie(
            &db,
            CreateJourFerieRequest {
                calendrier_id: None,
                ecole_id: None,
                nom: "Férié national".to_string(),
                date: lundi,
                est_national: true,
                actif: true,
            },
        )
        .await
        .unwrap();

        let ferie = ProgrammationService::planning(&db, &Scope::Admin, programmation.id, lundi).await.unwrap();
        assert!(ferie.is_empty());

        let update = UpdateProgrammationRequest {
            jours_feries_exceptions: Some(vec![ExceptionFerie {
                date: lundi,
                action: ActionException::Include,
            }]),
            ..Default::default()
        };
        let modifiee = ProgrammationService::modifier(&db, &cipher, &Scope::Admin, programmation.id, update)
            .await
            .unwrap();
        assert_eq!(modifiee.version, 2);

        let reprise = ProgrammationService::planning(&db, &Scope::Admin, programmation.id, lundi).await.unwrap();
        assert_eq!(reprise.len(), 2);
        assert_eq!(reprise[0].heure, 7);
    }

    #[tokio::test]
    async fn test_current_programmation_served_to_sirene() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (abonnement, sirene) = abonnement_actif(&db, &cipher, "SRN-G9").await;
        let today = Utc::now().date_naive();

        assert!(ProgrammationService::programmation_courante(&db, &abonnement, today).await.is_err());

        let ancienne = ProgrammationService::creer(&db, &cipher, &Scope::Admin, demande(sirene.id, None))
            .await
            .unwrap();
        let recente = ProgrammationService::creer(&db, &cipher, &Scope::Admin, demande(sirene.id, None))
            .await
            .unwrap();

        let courante = ProgrammationService::programmation_courante(&db, &abonnement, today).await.unwrap();
        assert_eq!(courante.id, recente.id);

        let desactivation = UpdateProgrammationRequest {
            actif: Some(false),
            ..Default::default()
        };
        ProgrammationService::modifier(&db, &cipher, &Scope::Admin, recente.id, desactivation)
            .await
            .unwrap();

        let courante = ProgrammationService::programmation_courante(&db, &abonnement, today).await.unwrap();
        assert_eq!(courante.id, ancienne.id);
    }

    #[tokio::test]
    async fn test_school_cannot_program_a_sirene_it_does_not_rent() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (_, sirene) = abonnement_actif(&db, &cipher, "SRN-G10").await;
        let autre_ecole = ECOLE_ID + 1;

        let mut request = demande(sirene.id, None);
        request.ecole_id = autre_ecole;
        let err = ProgrammationService::creer(&db, &cipher, &Scope::Ecole(autre_ecole), request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let mut request = demande(sirene.id, None);
        request.site_id = SITE_ID + 1;
        let err = ProgrammationService::creer(&db, &cipher, &Scope::Admin, request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(programmation::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_previous_tenant_programmation_not_served() {
        let db = crate::db::test_connection().await;
        let cipher = cipher();
        let (abonnement, sirene) = abonnement_actif(&db, &cipher, "SRN-G11").await;
        let today = Utc::now().date_naive();

        let propre = ProgrammationService::creer(&db, &cipher, &Scope::Admin, demande(sirene.id, None))
            .await
            .unwrap();

        // Ligne laissée par un ancien locataire, plus récente
        let now = Utc::now().naive_utc() + Duration::seconds(5);
        let mut ancienne: programmation::ActiveModel = propre.clone().into();
        ancienne.id = NotSet;
        ancienne.ecole_id = Set(ECOLE_ID + 1);
        ancienne.date_generation = Set(now);
        ancienne.insert(&db).await.unwrap();

        let courante = ProgrammationService::programmation_courante(&db, &abonnement, today).await.unwrap();
        assert_eq!(courante.id, propre.id);
    }
}
