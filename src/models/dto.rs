// Requêtes et réponses de l'API
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::abonnement;
use super::calendrier_scolaire::{JourFerieDefaut, PeriodeVacances};
use super::panne::PrioritePanne;
use super::programmation::{self, ExceptionFerie, HoraireSonnerie};

// ----------------------------------------------------------------------------
// Abonnements
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAbonnementRequest {
    pub sirene_id: Option<i32>,
    pub ecole_id: i32,
    pub site_id: i32,
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
    #[validate(range(min = 0))]
    pub montant: i64,
    pub parent_abonnement_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct AbonnementResponse {
    #[serde(flatten)]
    pub abonnement: abonnement::Model,
    pub jours_restants: i64,
    pub valide: bool,
}

impl AbonnementResponse {
    pub fn new(abonnement: abonnement::Model, today: NaiveDate) -> Self {
        Self {
            jours_restants: abonnement.jours_restants(today),
            valide: abonnement.est_valide(today),
            abonnement,
        }
    }
}

// Notification de la passerelle (noms CinetPay acceptés en alias)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    #[serde(alias = "cpm_trans_id")]
    pub transaction_id: String,
    #[serde(alias = "cpm_result")]
    pub status: String,
}

// ----------------------------------------------------------------------------
// Programmations
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProgrammationRequest {
    #[validate(length(min = 1, max = 255))]
    pub nom: String,
    pub sirene_id: i32,
    pub site_id: i32,
    pub ecole_id: i32,
    pub abonnement_id: Option<i32>,
    pub calendrier_id: Option<i32>,
    pub horaires: Vec<HoraireSonnerie>,
    #[serde(default)]
    pub jours_feries_inclus: bool,
    #[serde(default)]
    pub jours_feries_exceptions: Vec<ExceptionFerie>,
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProgrammationRequest {
    #[validate(length(min = 1, max = 255))]
    pub nom: Option<String>,
    pub horaires: Option<Vec<HoraireSonnerie>>,
    pub jours_feries_inclus: Option<bool>,
    pub jours_feries_exceptions: Option<Vec<ExceptionFerie>>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub actif: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProgrammationResponse {
    pub id: i32,
    pub nom: String,
    pub sirene_id: i32,
    pub site_id: i32,
    pub ecole_id: i32,
    pub abonnement_id: Option<i32>,
    pub calendrier_id: Option<i32>,
    pub horaires: Vec<HoraireSonnerie>,
    pub jours_semaine: Vec<u8>, // dérivé à chaque lecture
    pub jours_feries_inclus: bool,
    pub jours_feries_exceptions: Vec<ExceptionFerie>,
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
    pub actif: bool,
    pub chaine_programmee: String,
    pub version: i32,
    pub date_generation: NaiveDateTime,
}

impl ProgrammationResponse {
    pub fn from_model(model: programmation::Model) -> Result<Self, serde_json::Error> {
        let horaires = model.horaires()?;
        let exceptions = model.exceptions()?;
        Ok(Self {
            jours_semaine: crate::services::programmation::horaires::jours_actifs(&horaires),
            id: model.id,
            nom: model.nom,
            sirene_id: model.sirene_id,
            site_id: model.site_id,
            ecole_id: model.ecole_id,
            abonnement_id: model.abonnement_id,
            calendrier_id: model.calendrier_id,
            horaires,
            jours_feries_inclus: model.jours_feries_inclus,
            jours_feries_exceptions: exceptions,
            date_debut: model.date_debut,
            date_fin: model.date_fin,
            actif: model.actif,
            chaine_programmee: model.chaine_programmee,
            version: model.version,
            date_generation: model.date_generation,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanningQuery {
    pub date: NaiveDate,
}

// Réponse au boîtier qui interroge sa programmation
#[derive(Debug, Serialize)]
pub struct SirenePollResponse {
    pub programmation_id: i32,
    pub chaine_cryptee: String,
    pub version: i32,
    pub date_generation: NaiveDateTime,
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
}

// ----------------------------------------------------------------------------
// Calendriers
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCalendrierRequest {
    pub pays_id: i32,
    #[validate(length(min = 1, max = 20))]
    pub annee_scolaire: String,
    pub date_rentree: NaiveDate,
    pub date_fin_annee: NaiveDate,
    #[serde(default)]
    pub periodes_vacances: Vec<PeriodeVacances>,
    #[serde(default)]
    pub jours_feries_defaut: Vec<JourFerieDefaut>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJourFerieRequest {
    pub calendrier_id: Option<i32>,
    pub ecole_id: Option<i32>,
    #[validate(length(min = 1, max = 255))]
    pub nom: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub est_national: bool,
    #[serde(default = "default_true")]
    pub actif: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct JourFerieQuery {
    pub date: NaiveDate,
    pub ecole_id: Option<i32>,
    pub calendrier_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct JoursOuvresQuery {
    pub ecole_id: Option<i32>,
}

// ----------------------------------------------------------------------------
// Maintenance
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeclarePanneRequest {
    pub sirene_id: i32,
    pub ecole_id: Option<i32>, // requis si déclarée par un admin
    pub site_id: Option<i32>,
    #[validate(length(min = 1))]
    pub description: String,
    pub priorite: PrioritePanne,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ValidatePanneRequest {
    #[validate(range(min = 1, max = 20))]
    pub nombre_techniciens_requis: i32,
    pub date_debut_candidature: Option<NaiveDateTime>,
    pub date_fin_candidature: Option<NaiveDateTime>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidatureRequest {
    pub motivation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuspensionRequest {
    pub suspendue: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TerminerInterventionRequest {
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RapportRequest {
    #[validate(length(min = 1))]
    pub contenu: String,
    pub diagnostic: Option<String>,
    #[serde(default)]
    pub collectif: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRapport {
    Valide,
    Rejete,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EvaluationRapportRequest {
    pub decision: DecisionRapport,
    #[validate(range(min = 1, max = 5))]
    pub note: Option<i32>,
    pub commentaire: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AvisRequest {
    #[validate(range(min = 1, max = 5))]
    pub note: i32,
    pub commentaire: Option<String>,
}
