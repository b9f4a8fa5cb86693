// ============================================================================
// MODÈLE : ORDRES DE MISSION
// ============================================================================
//
// Description:
//   Appel à candidatures de techniciens, créé à la validation d'une panne.
//
// Fenêtre de candidature ouverte si:
//   - candidature_cloturee = false
//   - nombre_techniciens_acceptes < nombre_techniciens_requis
//   - now dans [date_debut_candidature, date_fin_candidature] (bornes optionnelles)
//
// Points d'attention:
//   - cloture_par = None : clôture automatique (quota atteint), réouvrable
//   - cloture_par = Some(admin) : clôture manuelle, jamais rouverte seule
//
// ============================================================================

use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StatutOrdreMission {
    #[sea_orm(string_value = "en_attente")]
    EnAttente,
    #[sea_orm(string_value = "en_cours")]
    EnCours,
    #[sea_orm(string_value = "termine")]
    Termine,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ordres_mission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub panne_id: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub date_debut_candidature: Option<DateTime>,
    pub date_fin_candidature: Option<DateTime>,
    pub nombre_techniciens_requis: i32,
    pub nombre_techniciens_acceptes: i32,
    pub candidature_cloturee: bool,
    pub date_cloture_candidature: Option<DateTime>,
    pub cloture_par: Option<i32>,
    pub statut: StatutOrdreMission,
    pub valide_par: i32,
    pub created_at: DateTime,
}

impl Model {
    pub fn quota_atteint(&self) -> bool {
        self.nombre_techniciens_acceptes >= self.nombre_techniciens_requis
    }

    pub fn peut_accepter_technicien(&self) -> bool {
        !self.candidature_cloturee && !self.quota_atteint()
    }

    pub fn candidature_ouverte(&self, now: NaiveDateTime) -> bool {
        self.peut_accepter_technicien()
            && self.date_debut_candidature.is_none_or(|debut| now >= debut)
            && self.date_fin_candidature.is_none_or(|fin| now <= fin)
    }

    /// Rouvrable seulement après une clôture automatique
    pub fn doit_rouvrir(&self) -> bool {
        self.candidature_cloturee && self.cloture_par.is_none() && !self.quota_atteint()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::panne::Entity",
        from = "Column::PanneId",
        to = "super::panne::Column::Id"
    )]
    Panne,
}

impl Related<super::panne::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Panne.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn ordre(requis: i32, acceptes: i32) -> Model {
        Model {
            id: 1,
            panne_id: 1,
            description: None,
            date_debut_candidature: Some(at(8)),
            date_fin_candidature: Some(at(18)),
            nombre_techniciens_requis: requis,
            nombre_techniciens_acceptes: acceptes,
            candidature_cloturee: false,
            date_cloture_candidature: None,
            cloture_par: None,
            statut: StatutOrdreMission::EnAttente,
            valide_par: 1,
            created_at: at(7),
        }
    }

    #[test]
    fn test_candidature_window() {
        let o = ordre(2, 0);
        assert!(!o.candidature_ouverte(at(7)));
        assert!(o.candidature_ouverte(at(12)));
        assert!(!o.candidature_ouverte(at(19)));

        let mut sans_bornes = ordre(2, 0);
        sans_bornes.date_debut_candidature = None;
        sans_bornes.date_fin_candidature = None;
        assert!(sans_bornes.candidature_ouverte(at(23)));
    }

    #[test]
    fn test_quota() {
        assert!(ordre(2, 1).peut_accepter_technicien());
        assert!(!ordre(2, 2).peut_accepter_technicien());
        assert!(!ordre(2, 2).candidature_ouverte(at(12)));
    }

    #[test]
    fn test_doit_rouvrir() {
        let mut auto = ordre(2, 1);
        auto.candidature_cloturee = true;
        assert!(auto.doit_rouvrir());

        let mut manuelle = auto.clone();
        manuelle.cloture_par = Some(9);
        assert!(!manuelle.doit_rouvrir());

        let mut pleine = ordre(2, 2);
        pleine.candidature_cloturee = true;
        assert!(!pleine.doit_rouvrir());
    }
}
