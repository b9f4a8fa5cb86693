use chrono::{NaiveDate, Utc};
use sea_orm::*;

use crate::error::{AppError, AppResult};
use crate::models::calendrier_scolaire;
use crate::models::dto::{CreateCalendrierRequest, CreateJourFerieRequest};
use crate::models::jour_ferie;
use crate::services::calendrier::jours_feries::JoursFeries;

pub struct CalendrierService;

impl CalendrierService {
    pub async fn creer_calendrier(
        db: &DatabaseConnection,
        request: CreateCalendrierRequest,
    ) -> AppResult<calendrier_scolaire::Model> {
        if request.date_rentree > request.date_fin_annee {
            return Err(AppError::validation("date_rentree must be before or equal to date_fin_annee"));
        }

        let dans_annee = |date: NaiveDate| request.date_rentree <= date && date <= request.date_fin_annee;

        for periode in &request.periodes_vacances {
            if periode.date_debut > periode.date_fin {
                return Err(AppError::validation(format!(
                    "Vacation period '{}' ends before it starts",
                    periode.nom
                )));
            }
            if !dans_annee(periode.date_debut) || !dans_annee(periode.date_fin) {
                return Err(AppError::validation(format!(
                    "Vacation period '{}' is outside the school year",
                    periode.nom
                )));
            }
        }

        for ferie in &request.jours_feries_defaut {
            if !dans_annee(ferie.date) {
                return Err(AppError::validation(format!(
                    "Default holiday '{}' ({}) is outside the school year",
                    ferie.nom, ferie.date
                )));
            }
        }

        let calendrier = calendrier_scolaire::ActiveModel {
            pays_id: Set(request.pays_id),
            annee_scolaire: Set(request.annee_scolaire),
            date_rentree: Set(request.date_rentree),
            date_fin_annee: Set(request.date_fin_annee),
            periodes_vacances: Set(serde_json::to_string(&request.periodes_vacances)?),
            jours_feries_defaut: Set(serde_json::to_string(&request.jours_feries_defaut)?),
            actif: Set(true),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(
            calendrier_id = calendrier.id,
            pays_id = calendrier.pays_id,
            annee = %calendrier.annee_scolaire,
            "school calendar created"
        );
        Ok(calendrier)
    }

    pub async fn obtenir_calendrier<C: ConnectionTrait>(
        conn: &C,
        calendrier_id: i32,
    ) -> AppResult<calendrier_scolaire::Model> {
        calendrier_scolaire::Entity::find_by_id(calendrier_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Calendar {} not found", calendrier_id)))
    }

    pub async fn lister_calendriers(
        db: &DatabaseConnection,
        pays_id: Option<i32>,
    ) -> AppResult<Vec<calendrier_scolaire::Model>> {
        let mut query = calendrier_scolaire::Entity::find().order_by_desc(calendrier_scolaire::Column::DateRentree);
        if let Some(pays_id) = pays_id {
            query = query.filter(calendrier_scolaire::Column::PaysId.eq(pays_id));
        }
        Ok(query.all(db).await?)
    }

    /// Ajoute un jour férié (national, de calendrier ou propre à une école)
    pub async fn ajouter_jour_ferie(
        db: &DatabaseConnection,
        request: CreateJourFerieRequest,
    ) -> AppResult<jour_ferie::Model> {
        if request.est_national && request.ecole_id.is_some() {
            return Err(AppError::validation("A national holiday cannot belong to a school"));
        }

        if let Some(calendrier_id) = request.calendrier_id {
            let calendrier = Self::obtenir_calendrier(db, calendrier_id).await?;
            if !calendrier.contient(request.date) {
                return Err(AppError::validation(format!(
                    "Holiday date {} is outside the school year {} ({}..{})",
                    request.date, calendrier.annee_scolaire, calendrier.date_rentree, calendrier.date_fin_annee
                )));
            }
        }

        let mut doublon = jour_ferie::Entity::find().filter(jour_ferie::Column::Date.eq(request.date));
        doublon = match request.calendrier_id {
            Some(id) => doublon.filter(jour_ferie::Column::CalendrierId.eq(id)),
            None => doublon.filter(jour_ferie::Column::CalendrierId.is_null()),
        };
        doublon = match request.ecole_id {
            Some(id) => doublon.filter(jour_ferie::Column::EcoleId.eq(id)),
            None => doublon.filter(jour_ferie::Column::EcoleId.is_null()),
        };
        if doublon.one(db).await?.is_some() {
            return Err(AppError::validation(format!(
                "A holiday already exists on {} for this calendar and school",
                request.date
            )));
        }

        let jour = jour_ferie::ActiveModel {
            calendrier_id: Set(request.calendrier_id),
            ecole_id: Set(request.ecole_id),
            nom: Set(request.nom),
            date: Set(request.date),
            est_national: Set(request.est_national),
            actif: Set(request.actif),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(jour_ferie_id = jour.id, date = %jour.date, ecole_id = ?jour.ecole_id, "holiday added");
        Ok(jour)
    }

    pub async fn lister_jours_feries(
        db: &DatabaseConnection,
        calendrier_id: Option<i32>,
        ecole_id: Option<i32>,
    ) -> AppResult<Vec<jour_ferie::Model>> {
        Ok(Self::requete_jours_feries(calendrier_id, ecole_id)
            .order_by_asc(jour_ferie::Column::Date)
            .all(db)
            .await?)
    }

    /// Résout l'ensemble des fériés applicables : lignes sans calendrier,
    /// lignes du calendrier, fériés par défaut du calendrier et vacances.
    pub async fn charger_jours_feries<C: ConnectionTrait>(
        conn: &C,
        calendrier_id: Option<i32>,
        ecole_id: Option<i32>,
    ) -> AppResult<JoursFeries> {
        let lignes = Self::requete_jours_feries(calendrier_id, ecole_id).all(conn).await?;
        let mut feries = JoursFeries::from_lignes(&lignes, ecole_id);

        if let Some(calendrier_id) = calendrier_id {
            let calendrier = Self::obtenir_calendrier(conn, calendrier_id).await?;
            for defaut in calendrier.jours_feries_defaut()? {
                feries.ajouter_defaut(defaut.date);
            }
            for periode in calendrier.periodes_vacances()? {
                feries.ajouter_vacances(periode);
            }
        }

        Ok(feries)
    }

    pub async fn est_ferie(
        db: &DatabaseConnection,
        date: NaiveDate,
        calendrier_id: Option<i32>,
        ecole_id: Option<i32>,
    ) -> AppResult<bool> {
        let feries = Self::charger_jours_feries(db, calendrier_id, ecole_id).await?;
        Ok(feries.est_ferie(date))
    }

    /// Jours de classe de l'année scolaire
    pub async fn compter_jours_ouvres(
        db: &DatabaseConnection,
        calendrier_id: i32,
        ecole_id: Option<i32>,
    ) -> AppResult<i64> {
        let calendrier = Self::obtenir_calendrier(db, calendrier_id).await?;
        let feries = Self::charger_jours_feries(db, Some(calendrier_id), ecole_id).await?;
        Ok(feries.jours_ouvres(calendrier.date_rentree, calendrier.date_fin_annee))
    }

    fn requete_jours_feries(calendrier_id: Option<i32>, ecole_id: Option<i32>) -> Select<jour_ferie::Entity> {
        let mut calendrier = Condition::any().add(jour_ferie::Column::CalendrierId.is_null());
        if let Some(id) = calendrier_id {
            calendrier = calendrier.add(jour_ferie::Column::CalendrierId.eq(id));
        }

        let mut ecole = Condition::any().add(jour_ferie::Column::EcoleId.is_null());
        if let Some(id) = ecole_id {
            ecole = ecole.add(jour_ferie::Column::EcoleId.eq(id));
        }

        jour_ferie::Entity::find()
            .filter(calendrier)
            .filter(ecole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calendrier_scolaire::{JourFerieDefaut, PeriodeVacances};
    use crate::services::test_support::*;

    fn calendrier_septembre() -> CreateCalendrierRequest {
        CreateCalendrierRequest {
            pays_id: 1,
            annee_scolaire: "2026-2027".to_string(),
            date_rentree: date(2026, 9, 1),
            date_fin_annee: date(2026, 9, 30),
            periodes_vacances: vec![PeriodeVacances {
                nom: "Congé de mi-septembre".to_string(),
                date_debut: date(2026, 9, 21),
                date_fin: date(2026, 9, 25),
            }],
            jours_feries_defaut: vec![JourFerieDefaut {
                nom: "Fête locale".to_string(),
                date: date(2026, 9, 16),
            }],
        }
    }

    fn ferie(calendrier_id: Option<i32>, ecole_id: Option<i32>, jour: NaiveDate, actif: bool) -> CreateJourFerieRequest {
        CreateJourFerieRequest {
            calendrier_id,
            ecole_id,
            nom: "Férié".to_string(),
            date: jour,
            est_national: ecole_id.is_none(),
            actif,
        }
    }

    #[tokio::test]
    async fn test_school_row_overrides_national_holiday() {
        let db = crate::db::test_connection().await;
        let lundi = date(2026, 9, 7);

        CalendrierService::ajouter_jour_ferie(&db, ferie(None, None, lundi, true)).await.unwrap();
        CalendrierService::ajouter_jour_ferie(&db, ferie(None, Some(ECOLE_ID), lundi, false))
            .await
            .unwrap();

        assert!(CalendrierService::est_ferie(&db, lundi, None, None).await.unwrap());
        assert!(CalendrierService::est_ferie(&db, lundi, None, Some(ECOLE_ID + 1)).await.unwrap());
        assert!(!CalendrierService::est_ferie(&db, lundi, None, Some(ECOLE_ID)).await.unwrap());
    }

    #[tokio::test]
    async fn test_holiday_creation_rules() {
        let db = crate::db::test_connection().await;
        let calendrier = CalendrierService::creer_calendrier(&db, calendrier_septembre()).await.unwrap();

        let mut national_ecole = ferie(None, Some(ECOLE_ID), date(2026, 9, 8), true);
        national_ecole.est_national = true;
        let err = CalendrierService::ajouter_jour_ferie(&db, national_ecole).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let hors_annee = ferie(Some(calendrier.id), None, date(2026, 10, 1), true);
        let err = CalendrierService::ajouter_jour_ferie(&db, hors_annee).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        CalendrierService::ajouter_jour_ferie(&db, ferie(Some(calendrier.id), None, date(2026, 9, 7), true))
            .await
            .unwrap();
        let err = CalendrierService::ajouter_jour_ferie(&db, ferie(Some(calendrier.id), None, date(2026, 9, 7), true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Même date, autre école : pas un doublon
        CalendrierService::ajouter_jour_ferie(&db, ferie(Some(calendrier.id), Some(ECOLE_ID), date(2026, 9, 7), false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_calendar_rejects_vacation_outside_year() {
        let db = crate::db::test_connection().await;
        let mut request = calendrier_septembre();
        request.periodes_vacances[0].date_fin = date(2026, 10, 2);

        assert!(CalendrierService::creer_calendrier(&db, request).await.is_err());
    }

    #[tokio::test]
    async fn test_count_school_days() {
        let db = crate::db::test_connection().await;
        let calendrier = CalendrierService::creer_calendrier(&db, calendrier_septembre()).await.unwrap();
        CalendrierService::ajouter_jour_ferie(&db, ferie(Some(calendrier.id), None, date(2026, 9, 7), true))
            .await
            .unwrap();
        CalendrierService::ajouter_jour_ferie(&db, ferie(Some(calendrier.id), Some(ECOLE_ID), date(2026, 9, 7), false))
            .await
            .unwrap();

        // 22 jours de semaine, moins le 7 (férié), le 16 (défaut) et 5 jours de vacances
        let national = CalendrierService::compter_jours_ouvres(&db, calendrier.id, None).await.unwrap();
        assert_eq!(national, 15);

        // L'école travaille le 7
        let ecole = CalendrierService::compter_jours_ouvres(&db, calendrier.id, Some(ECOLE_ID)).await.unwrap();
        assert_eq!(ecole, 16);
    }

    #[tokio::test]
    async fn test_default_holidays_are_resolved() {
        let db = crate::db::test_connection().await;
        let calendrier = CalendrierService::creer_calendrier(&db, calendrier_septembre()).await.unwrap();

        let feries = CalendrierService::charger_jours_feries(&db, Some(calendrier.id), None)
            .await
            .unwrap();
        assert!(feries.est_ferie(date(2026, 9, 16)));
        assert!(feries.est_en_vacances(date(2026, 9, 22)));
        assert!(!feries.est_ferie(date(2026, 9, 17)));
    }
}
