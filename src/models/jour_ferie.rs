use serde::{Deserialize, Serialize};
use sea_orm::entity::prelude::*;

// Jour férié. ecole_id = None => national (ou défini au niveau calendrier).
// Une ligne propre à une école fait foi sur la ligne nationale de même date,
// y compris pour la désactiver (actif = false).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jours_feries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub calendrier_id: Option<i32>,
    pub ecole_id: Option<i32>,
    pub nom: String,
    pub date: Date,
    pub est_national: bool,
    pub actif: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::calendrier_scolaire::Entity",
        from = "Column::CalendrierId",
        to = "super::calendrier_scolaire::Column::Id"
    )]
    CalendrierScolaire,
}

impl Related<super::calendrier_scolaire::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CalendrierScolaire.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
