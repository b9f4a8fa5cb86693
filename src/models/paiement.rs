use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StatutPaiement {
    #[sea_orm(string_value = "en_attente")]
    EnAttente,
    #[sea_orm(string_value = "valide")]
    Valide,
    #[sea_orm(string_value = "echoue")]
    Echoue,
}

impl StatutPaiement {
    /// Statut renvoyé par la passerelle : ACCEPTED ou 00 => valide
    pub fn from_gateway(status: &str) -> Self {
        match status.trim() {
            "ACCEPTED" | "00" => StatutPaiement::Valide,
            _ => StatutPaiement::Echoue,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paiements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub abonnement_id: i32,
    #[sea_orm(unique)]
    pub transaction_id: String,
    pub montant: i64,
    pub statut: StatutPaiement,
    pub url_paiement: Option<String>,
    pub date_paiement: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::abonnement::Entity",
        from = "Column::AbonnementId",
        to = "super::abonnement::Column::Id"
    )]
    Abonnement,
}

impl Related<super::abonnement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Abonnement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
