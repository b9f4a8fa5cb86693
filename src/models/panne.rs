use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StatutPanne {
    #[sea_orm(string_value = "en_attente")]
    EnAttente,
    #[sea_orm(string_value = "validee")]
    Validee,
    #[sea_orm(string_value = "en_cours")]
    EnCours,
    #[sea_orm(string_value = "resolue")]
    Resolue,
    #[sea_orm(string_value = "cloturee")]
    Cloturee,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PrioritePanne {
    #[sea_orm(string_value = "basse")]
    Basse,
    #[sea_orm(string_value = "moyenne")]
    Moyenne,
    #[sea_orm(string_value = "haute")]
    Haute,
    #[sea_orm(string_value = "urgente")]
    Urgente,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pannes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub sirene_id: i32,
    pub ecole_id: i32,
    pub site_id: Option<i32>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub priorite: PrioritePanne,
    pub statut: StatutPanne,
    pub date_declaration: DateTime,
    pub valide_par: Option<i32>,
    pub date_validation: Option<DateTime>,
    pub date_resolution: Option<DateTime>,
    pub date_cloture: Option<DateTime>,
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
