use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StatutSirene {
    #[sea_orm(string_value = "en_stock")]
    EnStock,
    #[sea_orm(string_value = "reserve")]
    Reserve,
    #[sea_orm(string_value = "installe")]
    Installe,
    #[sea_orm(string_value = "en_panne")]
    EnPanne,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sirenes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    // Unicité garantie par un index partiel (deleted_at IS NULL), voir schema.rs
    pub numero_serie: String,
    pub modele: Option<String>,
    pub statut: StatutSirene,
    pub site_id: Option<i32>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
