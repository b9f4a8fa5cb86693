use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StatutCandidature {
    #[sea_orm(string_value = "soumise")]
    Soumise,
    #[sea_orm(string_value = "acceptee")]
    Acceptee,
    #[sea_orm(string_value = "refusee")]
    Refusee,
    #[sea_orm(string_value = "retiree")]
    Retiree,
}

// Candidature d'un technicien sur un ordre de mission
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "missions_techniciens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub ordre_mission_id: i32,
    pub technicien_id: i32,
    pub statut: StatutCandidature,
    #[sea_orm(column_type = "Text", nullable)]
    pub motivation: Option<String>,
    pub suspendue: bool,
    pub date_candidature: DateTime,
    pub date_reponse: Option<DateTime>,
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
