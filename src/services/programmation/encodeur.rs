// ============================================================================
// ENCODEUR DE PROGRAMMATION
// ============================================================================
//
// Description:
//   Compile une programmation en :
//     1. un résumé lisible (chaine_programmee)
//     2. une charge utile JSON chiffrée (chaine_cryptee) lue par le boîtier
//
// Points d'attention:
//   - Même primitive de chiffrement que les tokens (SireneCipher)
//   - Un nonce aléatoire par génération : deux générations du même
//     planning ne donnent jamais le même texte chiffré
//
// ============================================================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::programmation::{ActionException, ExceptionFerie, HoraireSonnerie};
use crate::utils::crypto::{CryptoError, SireneCipher};

const JOURS: [&str; 7] = ["Dim", "Lun", "Mar", "Mer", "Jeu", "Ven", "Sam"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeUtile {
    pub programmation_id: i32,
    pub sirene_id: i32,
    pub ecole_id: i32,
    pub site_id: i32,
    pub nom: String,
    pub horaires: Vec<HoraireSonnerie>,
    pub jours_semaine: Vec<u8>,
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
    pub jours_feries_inclus: bool,
    pub jours_feries_exceptions: Vec<ExceptionFerie>,
    pub actif: bool,
    pub date_generation: i64,
    pub nonce: String,
}

impl ChargeUtile {
    pub fn encoder(&self, cipher: &SireneCipher) -> Result<String, EncodageError> {
        let json = serde_json::to_string(self)?;
        Ok(cipher.encrypt(&json)?)
    }

    pub fn decoder(cipher: &SireneCipher, chaine: &str) -> Result<Self, EncodageError> {
        let json = cipher.decrypt(chaine)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodageError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<EncodageError> for crate::error::AppError {
    fn from(err: EncodageError) -> Self {
        match err {
            EncodageError::Json(e) => e.into(),
            EncodageError::Crypto(e) => e.into(),
        }
    }
}

pub fn nouveau_nonce() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

fn noms_jours(jours: &[u8]) -> String {
    jours
        .iter()
        .filter_map(|j| JOURS.get(*j as usize).copied())
        .collect::<Vec<_>>()
        .join(",")
}

/// Résumé lisible, ex. `07:30 [Lun,Mar] 5s | 12:00 [Lun] 3s ; jours=Lun,Mar ; feries=exclus ; 2026-09-01..2027-06-30`
pub fn resume(
    horaires: &[HoraireSonnerie],
    jours_semaine: &[u8],
    jours_feries_inclus: bool,
    exceptions: &[ExceptionFerie],
    date_debut: NaiveDate,
    date_fin: NaiveDate,
) -> String {
    let lignes: Vec<String> = horaires
        .iter()
        .map(|h| {
            let mut jours = h.jours.clone();
            jours.sort_unstable();
            format!(
                "{:02}:{:02} [{}] {}s",
                h.heure,
                h.minute,
                noms_jours(&jours),
                h.duree_sonnerie
            )
        })
        .collect();

    let mut resume = format!(
        "{} ; jours={} ; feries={} ; {}..{}",
        lignes.join(" | "),
        noms_jours(jours_semaine),
        if jours_feries_inclus { "inclus" } else { "exclus" },
        date_debut,
        date_fin
    );

    if !exceptions.is_empty() {
        let exceptions: Vec<String> = exceptions
            .iter()
            .map(|e| {
                let signe = match e.action {
                    ActionException::Include => '+',
                    ActionException::Exclude => '-',
                };
                format!("{}{}", signe, e.date)
            })
            .collect();
        resume.push_str(&format!(" ; exceptions={}", exceptions.join(",")));
    }

    resume
}

pub fn horodatage(date_generation: NaiveDateTime) -> i64 {
    date_generation.and_utc().timestamp()
}
