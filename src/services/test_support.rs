// Fixtures partagées par les tests des services
use chrono::{Months, NaiveDate, Utc};
use sea_orm::*;

use crate::models::abonnement;
use crate::models::account::Scope;
use crate::models::dto::{CandidatureRequest, CreateAbonnementRequest, DeclarePanneRequest, ValidatePanneRequest};
use crate::models::panne::{self, PrioritePanne};
use crate::models::{intervention, mission_technicien, ordre_mission};
use crate::models::paiement::{self, StatutPaiement};
use crate::models::sirene::{self, StatutSirene};
use crate::services::abonnement_service::AbonnementService;
use crate::services::mission_service::MissionService;
use crate::services::panne_service::PanneService;
use crate::utils::crypto::SireneCipher;

pub const ECOLE_ID: i32 = 10;
pub const SITE_ID: i32 = 20;

pub fn cipher() -> SireneCipher {
    SireneCipher::new("test-sirene-secret")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn creer_sirene(db: &DatabaseConnection, numero_serie: &str) -> sirene::Model {
    let now = Utc::now().naive_utc();
    sirene::ActiveModel {
        numero_serie: Set(numero_serie.to_string()),
        modele: Set(Some("S-100".to_string())),
        statut: Set(StatutSirene::EnStock),
        site_id: Set(Some(SITE_ID)),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn marquer_en_panne(db: &DatabaseConnection, sirene_id: i32) {
    let sirene = sirene::Entity::find_by_id(sirene_id).one(db).await.unwrap().unwrap();
    let mut active: sirene::ActiveModel = sirene.into();
    active.statut = Set(StatutSirene::EnPanne);
    active.update(db).await.unwrap();
}

/// Demande couvrant un an à partir d'aujourd'hui
pub fn demande_abonnement(sirene_id: i32) -> CreateAbonnementRequest {
    let today = Utc::now().date_naive();
    CreateAbonnementRequest {
        sirene_id: Some(sirene_id),
        ecole_id: ECOLE_ID,
        site_id: SITE_ID,
        date_debut: today,
        date_fin: today.checked_add_months(Months::new(12)).unwrap(),
        montant: 50_000,
        parent_abonnement_id: None,
    }
}

pub async fn creer_abonnement(db: &DatabaseConnection, sirene_id: i32) -> abonnement::Model {
    AbonnementService::creer(db, demande_abonnement(sirene_id))
        .await
        .unwrap()
}

pub async fn valider_paiement(db: &DatabaseConnection, abonnement: &abonnement::Model) -> paiement::Model {
    let now = Utc::now().naive_utc();
    paiement::ActiveModel {
        abonnement_id: Set(abonnement.id),
        transaction_id: Set(format!("TX-{}", abonnement.id)),
        montant: Set(abonnement.montant),
        statut: Set(StatutPaiement::Valide),
        url_paiement: Set(None),
        date_paiement: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Sirène + abonnement payé et activé (un token émis)
pub async fn abonnement_actif(
    db: &DatabaseConnection,
    cipher: &SireneCipher,
    numero_serie: &str,
) -> (abonnement::Model, sirene::Model) {
    let sirene = creer_sirene(db, numero_serie).await;
    let abonnement = creer_abonnement(db, sirene.id).await;
    valider_paiement(db, &abonnement).await;

    let abonnement = AbonnementService::activer(db, cipher, abonnement.id)
        .await
        .unwrap();
    (abonnement, sirene)
}

pub const ADMIN_ID: i32 = 1;

pub fn validation(requis: i32) -> ValidatePanneRequest {
    ValidatePanneRequest {
        nombre_techniciens_requis: requis,
        date_debut_candidature: None,
        date_fin_candidature: None,
        description: Some("Remplacement du module audio".to_string()),
    }
}

/// Sirène louée par l'école, panne déclarée puis validée : ordre de mission ouvert
pub async fn ordre_valide(
    db: &DatabaseConnection,
    numero_serie: &str,
    requis: i32,
) -> (panne::Model, ordre_mission::Model) {
    let sirene = creer_sirene(db, numero_serie).await;
    creer_abonnement(db, sirene.id).await;
    let declaration = DeclarePanneRequest {
        sirene_id: sirene.id,
        ecole_id: None,
        site_id: None,
        description: "Sirène muette".to_string(),
        priorite: PrioritePanne::Moyenne,
    };
    let panne = PanneService::declarer(db, &Scope::Ecole(ECOLE_ID), declaration)
        .await
        .unwrap();
    PanneService::valider(db, ADMIN_ID, panne.id, validation(requis))
        .await
        .unwrap()
}

/// Candidature soumise puis acceptée : intervention assignée
pub async fn technicien_accepte(
    db: &DatabaseConnection,
    ordre_mission_id: i32,
    technicien_id: i32,
) -> (mission_technicien::Model, intervention::Model) {
    let candidature = MissionService::soumettre(db, technicien_id, ordre_mission_id, CandidatureRequest::default())
        .await
        .unwrap();
    MissionService::accepter(db, candidature.id).await.unwrap()
}
