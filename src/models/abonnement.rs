// ============================================================================
// MODÈLE : ABONNEMENTS
// ============================================================================
//
// Description:
//   Droit commercial limité dans le temps liant une sirène à une école.
//
// Cycle de vie:
//   en_attente -> actif <-> suspendu -> expire | annule
//   en_attente -> annule
//   expire et annule sont terminaux.
//
// Points d'attention:
//   - Au plus un abonnement "vivant" (en_attente, actif, suspendu) par
//     sirène. Vérifié par le service ET par un index unique partiel.
//   - parent_abonnement_id forme la chaîne des renouvellements.
//   - Jamais supprimé physiquement (deleted_at).
//
// ============================================================================

use chrono::{Months, NaiveDate};
use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

use super::sirene::StatutSirene;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StatutAbonnement {
    #[sea_orm(string_value = "en_attente")]
    EnAttente,
    #[sea_orm(string_value = "actif")]
    Actif,
    #[sea_orm(string_value = "suspendu")]
    Suspendu,
    #[sea_orm(string_value = "expire")]
    Expire,
    #[sea_orm(string_value = "annule")]
    Annule,
}

impl StatutAbonnement {
    /// Statuts qui occupent la sirène
    pub const VIVANTS: [StatutAbonnement; 3] = [
        StatutAbonnement::EnAttente,
        StatutAbonnement::Actif,
        StatutAbonnement::Suspendu,
    ];

    pub fn est_terminal(self) -> bool {
        matches!(self, StatutAbonnement::Expire | StatutAbonnement::Annule)
    }

    pub fn peut_passer_a(self, cible: StatutAbonnement) -> bool {
        use StatutAbonnement::*;
        matches!(
            (self, cible),
            (EnAttente, Actif)
                | (EnAttente, Annule)
                | (Actif, Suspendu)
                | (Actif, Expire)
                | (Actif, Annule)
                | (Suspendu, Actif)
                | (Suspendu, Expire)
                | (Suspendu, Annule)
        )
    }

    /// Statut sirène induit par ce statut d'abonnement.
    /// None = la sirène garde son statut actuel.
    pub fn statut_sirene_induit(self, actuel: StatutSirene) -> Option<StatutSirene> {
        match self {
            StatutAbonnement::Actif | StatutAbonnement::EnAttente => Some(StatutSirene::Reserve),
            StatutAbonnement::Suspendu => None,
            StatutAbonnement::Expire | StatutAbonnement::Annule => {
                if actuel == StatutSirene::EnPanne {
                    None
                } else {
                    Some(StatutSirene::EnStock)
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "abonnements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub sirene_id: i32,
    pub ecole_id: i32,
    pub site_id: i32,
    pub parent_abonnement_id: Option<i32>,
    pub date_debut: Date,
    pub date_fin: Date,
    pub montant: i64, // FCFA, pas de sous-unité
    pub statut: StatutAbonnement,
    // Statut de la sirène capturé à la dernière activation
    pub sirene_statut_precedent: Option<StatutSirene>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime>,
}

impl Model {
    /// Un abonnement peut servir de base à un renouvellement s'il n'est ni
    /// en cours, ni une demande initiale encore en attente.
    pub fn can_be_renewed(&self) -> bool {
        match self.statut {
            StatutAbonnement::Actif | StatutAbonnement::Suspendu => false,
            StatutAbonnement::EnAttente => self.parent_abonnement_id.is_some(),
            StatutAbonnement::Expire | StatutAbonnement::Annule => true,
        }
    }

    /// Jours restants jusqu'à date_fin, jamais négatif
    pub fn jours_restants(&self, today: NaiveDate) -> i64 {
        (self.date_fin - today).num_days().max(0)
    }

    pub fn est_valide(&self, today: NaiveDate) -> bool {
        self.statut == StatutAbonnement::Actif && self.date_debut <= today && today <= self.date_fin
    }

    /// Fenêtre du renouvellement : lendemain de date_fin, pour un an
    pub fn periode_renouvellement(&self) -> Option<(NaiveDate, NaiveDate)> {
        let debut = self.date_fin.succ_opt()?;
        let fin = debut.checked_add_months(Months::new(12))?;
        Some((debut, fin))
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn abonnement(statut: StatutAbonnement, parent: Option<i32>) -> Model {
        let now = chrono::Utc::now().naive_utc();
        Model {
            id: 1,
            sirene_id: 1,
            ecole_id: 1,
            site_id: 1,
            parent_abonnement_id: parent,
            date_debut: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            date_fin: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            montant: 50_000,
            statut,
            sirene_statut_precedent: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_transitions() {
        use StatutAbonnement::*;
        assert!(EnAttente.peut_passer_a(Actif));
        assert!(EnAttente.peut_passer_a(Annule));
        assert!(!EnAttente.peut_passer_a(Suspendu));
        assert!(Actif.peut_passer_a(Suspendu));
        assert!(Suspendu.peut_passer_a(Actif));
        for cible in [EnAttente, Actif, Suspendu, Expire, Annule] {
            assert!(!Expire.peut_passer_a(cible));
            assert!(!Annule.peut_passer_a(cible));
        }
    }

    #[test]
    fn test_can_be_renewed() {
        use StatutAbonnement::*;
        assert!(!abonnement(Actif, None).can_be_renewed());
        assert!(!abonnement(Suspendu, Some(3)).can_be_renewed());
        assert!(!abonnement(EnAttente, None).can_be_renewed());
        assert!(abonnement(EnAttente, Some(3)).can_be_renewed());
        assert!(abonnement(Expire, None).can_be_renewed());
        assert!(abonnement(Annule, None).can_be_renewed());
    }

    #[test]
    fn test_statut_sirene_induit() {
        use StatutAbonnement::*;
        assert_eq!(Actif.statut_sirene_induit(StatutSirene::EnStock), Some(StatutSirene::Reserve));
        assert_eq!(EnAttente.statut_sirene_induit(StatutSirene::Installe), Some(StatutSirene::Reserve));
        assert_eq!(Suspendu.statut_sirene_induit(StatutSirene::Reserve), None);
        assert_eq!(Expire.statut_sirene_induit(StatutSirene::Reserve), Some(StatutSirene::EnStock));
        assert_eq!(Annule.statut_sirene_induit(StatutSirene::EnPanne), None);
    }

    #[test]
    fn test_jours_restants_floor_at_zero() {
        let a = abonnement(StatutAbonnement::Actif, None);
        assert_eq!(a.jours_restants(NaiveDate::from_ymd_opt(2026, 12, 21).unwrap()), 10);
        assert_eq!(a.jours_restants(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()), 0);
        assert_eq!(a.jours_restants(NaiveDate::from_ymd_opt(2027, 3, 1).unwrap()), 0);
    }

    #[test]
    fn test_est_valide() {
        let jour = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert!(abonnement(StatutAbonnement::Actif, None).est_valide(jour));
        assert!(!abonnement(StatutAbonnement::Suspendu, None).est_valide(jour));
        assert!(!abonnement(StatutAbonnement::Actif, None).est_valide(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()));
    }

    #[test]
    fn test_periode_renouvellement() {
        let a = abonnement(StatutAbonnement::Expire, None);
        let (debut, fin) = a.periode_renouvellement().unwrap();
        assert_eq!(debut, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
        assert_eq!(fin, NaiveDate::from_ymd_opt(2028, 1, 1).unwrap());
    }
}
