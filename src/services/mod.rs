// ============================================================================
// SERVICES - MODULE PRINCIPAL
// ============================================================================
//
// Liste des modules:
//   - abonnement_service : cycle de vie des abonnements
//   - token_service : émission et vérification des tokens boîtier
//   - paiement_service, payment_gateway : paiements CinetPay
//   - programmation_service : plannings de sonnerie (+ moteur dans programmation/)
//   - calendrier_service : calendriers scolaires et jours fériés (+ calendrier/)
//   - panne_service, mission_service, intervention_service : maintenance
//
// ============================================================================

pub mod abonnement_service;
pub mod calendrier;
pub mod calendrier_service;
pub mod intervention_service;
pub mod mission_service;
pub mod paiement_service;
pub mod panne_service;
pub mod payment_gateway;
pub mod programmation;
pub mod programmation_service;
pub mod token_service;

#[cfg(test)]
pub mod test_support;
