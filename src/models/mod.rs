// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table avec SeaORM.
//
// Liste des modules:
//   - account : Compte authentifié (AccountRef) et portée des requêtes (Scope)
//   - dto : Requêtes et réponses de l'API
//   - health : Health check API
//   - sirene : Boîtiers physiques (numéro de série, statut)
//   - abonnement : Abonnements sirène/école et leur cycle de vie
//   - paiement : Paiements (passerelle CinetPay)
//   - token_sirene : Tokens chiffrés présentés par les boîtiers
//   - programmation : Plannings de sonnerie
//   - calendrier_scolaire : Années scolaires, vacances, fériés par défaut
//   - jour_ferie : Jours fériés nationaux ou propres à une école
//   - panne, ordre_mission, mission_technicien, intervention,
//     rapport_intervention, avis : chaîne de maintenance
//
// Points d'attention:
//   - Les statuts sont des DeriveActiveEnum stockés en texte
//   - Suppression logique (deleted_at) pour sirènes, abonnements, programmations
//
// ============================================================================

pub mod account;
pub mod dto;
pub mod health;
pub mod sirene;
pub mod abonnement;
pub mod paiement;
pub mod token_sirene;
pub mod programmation;
pub mod calendrier_scolaire;
pub mod jour_ferie;
pub mod panne;
pub mod ordre_mission;
pub mod mission_technicien;
pub mod intervention;
pub mod rapport_intervention;
pub mod avis;
