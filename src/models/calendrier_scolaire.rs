use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodeVacances {
    pub nom: String,
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
}

impl PeriodeVacances {
    pub fn contient(&self, date: NaiveDate) -> bool {
        self.date_debut <= date && date <= self.date_fin
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourFerieDefaut {
    pub nom: String,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "calendriers_scolaires")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub pays_id: i32,
    pub annee_scolaire: String, // "2026-2027"
    pub date_rentree: Date,
    pub date_fin_annee: Date,
    #[sea_orm(column_type = "Text")]
    pub periodes_vacances: String,   // JSON: [PeriodeVacances]
    #[sea_orm(column_type = "Text")]
    pub jours_feries_defaut: String, // JSON: [JourFerieDefaut]
    pub actif: bool,
    pub created_at: DateTime,
}

impl Model {
    pub fn contient(&self, date: NaiveDate) -> bool {
        self.date_rentree <= date && date <= self.date_fin_annee
    }

    pub fn periodes_vacances(&self) -> Result<Vec<PeriodeVacances>, serde_json::Error> {
        parse_liste(&self.periodes_vacances)
    }

    pub fn jours_feries_defaut(&self) -> Result<Vec<JourFerieDefaut>, serde_json::Error> {
        parse_liste(&self.jours_feries_defaut)
    }
}

fn parse_liste<T: serde::de::DeserializeOwned>(raw: &str) -> Result<Vec<T>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
