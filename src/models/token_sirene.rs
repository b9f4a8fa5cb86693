// ============================================================================
// MODÈLE : TOKENS SIRÈNE
// ============================================================================
//
// Colonnes de la table tokens_sirene:
//   - token_crypte : chaîne chiffrée remise au boîtier
//   - token_hash   : SHA-256 de token_crypte (recherche sans déchiffrement)
//   - date_debut / date_expiration : fenêtre de validité
//   - actif        : un seul token actif par abonnement (index partiel)
//   - sirene_id    : copie de l'abonnement, pour l'audit côté boîtier
//
// Workflow:
//   1. L'abonnement passe à actif (paiement validé)
//   2. Les tokens précédents passent à actif = false
//   3. Un nouveau token est généré dans la même transaction
//   4. Le boîtier présente le token dans le header X-Sirene-Token
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tokens_sirene")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub abonnement_id: i32,

    pub sirene_id: i32,

    #[sea_orm(column_type = "Text")]
    pub token_crypte: String,

    // Index non unique : le chiffrement est déterministe, une régénération
    // sur la même fenêtre redonne le même hash
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub date_debut: DateTime,

    pub date_expiration: DateTime,

    pub actif: bool,

    pub date_generation: DateTime,
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
