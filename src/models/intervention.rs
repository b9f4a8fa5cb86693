use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StatutIntervention {
    // Valeur des données existantes, jamais produite ici : une intervention
    // naît assignee à l'acceptation d'une candidature
    #[sea_orm(string_value = "planifiee")]
    Planifiee,
    #[sea_orm(string_value = "assignee")]
    Assignee,
    #[sea_orm(string_value = "acceptee")]
    Acceptee,
    #[sea_orm(string_value = "en_cours")]
    EnCours,
    #[sea_orm(string_value = "terminee")]
    Terminee,
    #[sea_orm(string_value = "annulee")]
    Annulee,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "interventions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub panne_id: i32,
    pub ordre_mission_id: i32,
    pub mission_technicien_id: i32,
    pub technicien_id: i32,
    pub statut: StatutIntervention,
    pub date_assignation: DateTime,
    pub date_debut: Option<DateTime>,
    pub date_fin: Option<DateTime>,
    #[sea_orm(column_type = "Text", nullable)]
    pub observations: Option<String>,
    // Technicien retiré après la fin de l'intervention
    pub technicien_retire: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ordre_mission::Entity",
        from = "Column::OrdreMissionId",
        to = "super::ordre_mission::Column::Id"
    )]
    OrdreMission,
}

impl Related<super::ordre_mission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrdreMission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
