// ============================================================================
// MODÈLE : PROGRAMMATIONS
// ============================================================================
//
// Description:
//   Planning de sonnerie d'une sirène : liste ordonnée d'horaires, prise en
//   compte des jours fériés et exceptions datées.
//
// Colonnes dérivées (régénérées à chaque modification):
//   - chaine_programmee : résumé lisible
//   - chaine_cryptee    : charge utile chiffrée lue par le boîtier
//
// Points d'attention:
//   - horaires et jours_feries_exceptions sont stockés en JSON texte
//   - Les jours de la semaine effectifs ne sont PAS stockés : ils sont
//     recalculés à chaque lecture (union des jours de chaque horaire)
//
// ============================================================================

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sea_orm::entity::prelude::*;

/// Une ligne de sonnerie : heure, jours (0 = dimanche .. 6 = samedi), durée
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoraireSonnerie {
    pub heure: u8,
    pub minute: u8,
    pub jours: Vec<u8>,
    pub duree_sonnerie: u8, // secondes, 1 à 30
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HoraireSonnerie {
    /// Signature de déduplication : HH:MM:jours triés
    pub fn signature(&self) -> String {
        let jours: BTreeSet<u8> = self.jours.iter().copied().collect();
        let jours: Vec<String> = jours.iter().map(|j| j.to_string()).collect();
        format!("{:02}:{:02}:{}", self.heure, self.minute, jours.join(","))
    }

    pub fn sonne_le(&self, jour: u8) -> bool {
        self.jours.contains(&jour)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionException {
    Include,
    Exclude,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionFerie {
    pub date: NaiveDate,
    pub action: ActionException,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "programmations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub nom: String,
    pub sirene_id: i32,
    pub site_id: i32,
    pub ecole_id: i32,
    pub abonnement_id: Option<i32>,
    pub calendrier_id: Option<i32>,
    #[sea_orm(column_type = "Text")]
    pub horaires: String,
    pub jours_feries_inclus: bool,
    #[sea_orm(column_type = "Text")]
    pub jours_feries_exceptions: String,
    pub date_debut: Date,
    pub date_fin: Date,
    pub actif: bool,
    #[sea_orm(column_type = "Text")]
    pub chaine_programmee: String,
    #[sea_orm(column_type = "Text")]
    pub chaine_cryptee: String,
    pub version: i32,
    pub date_generation: DateTime,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime>,
}

impl Model {
    pub fn horaires(&self) -> Result<Vec<HoraireSonnerie>, serde_json::Error> {
        serde_json::from_str(&self.horaires)
    }

    pub fn exceptions(&self) -> Result<Vec<ExceptionFerie>, serde_json::Error> {
        if self.jours_feries_exceptions.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.jours_feries_exceptions)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sirene::Entity",
        from = "Column::SireneId",
        to = "super::sirene::Column::Id"
    )]
    Sirene,
}

impl Related<super::sirene::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sirene.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_sorts_days() {
        let h = HoraireSonnerie {
            heure: 7,
            minute: 5,
            jours: vec![3, 1],
            duree_sonnerie: 5,
            description: None,
        };
        assert_eq!(h.signature(), "07:05:1,3");
        assert!(h.sonne_le(3));
        assert!(!h.sonne_le(2));
    }

    #[test]
    fn test_exception_json() {
        let e: ExceptionFerie =
            serde_json::from_str(r#"{"date":"2026-11-01","action":"include"}"#).unwrap();
        assert_eq!(e.action, ActionException::Include);
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2026, 11, 1).unwrap());
    }
}
