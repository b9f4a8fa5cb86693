use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StatutRapport {
    #[sea_orm(string_value = "brouillon")]
    Brouillon,
    #[sea_orm(string_value = "valide")]
    Valide,
    #[sea_orm(string_value = "rejete")]
    Rejete,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rapports_intervention")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub intervention_id: i32,
    pub technicien_id: Option<i32>, // None = rapport collectif de l'équipe
    #[sea_orm(column_type = "Text")]
    pub contenu: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub diagnostic: Option<String>,
    pub statut: StatutRapport,
    pub note_admin: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub commentaire_admin: Option<String>,
    pub date_soumission: DateTime,
    pub date_evaluation: Option<DateTime>,
}

impl Model {
    pub fn est_collectif(&self) -> bool {
        self.technicien_id.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::intervention::Entity",
        from = "Column::InterventionId",
        to = "super::intervention::Column::Id"
    )]
    Intervention,
}

impl Related<super::intervention::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Intervention.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
