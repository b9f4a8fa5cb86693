use std::collections::{BTreeSet, HashSet};

use crate::error::AppError;
use crate::models::programmation::HoraireSonnerie;

pub const DUREE_MIN: u8 = 1;
pub const DUREE_MAX: u8 = 30;

/// Valide une liste d'horaires avant enregistrement.
/// Les doublons (même HH:MM et mêmes jours) sont rejetés, jamais fusionnés.
pub fn valider_horaires(horaires: &[HoraireSonnerie]) -> Result<(), AppError> {
    if horaires.is_empty() {
        return Err(AppError::validation("A programmation needs at least one ring time"));
    }

    let mut signatures = HashSet::new();

    for (index, horaire) in horaires.iter().enumerate() {
        let position = index + 1;

        if horaire.heure > 23 {
            return Err(AppError::validation(format!(
                "Ring time #{}: hour {} is out of range (0-23)",
                position, horaire.heure
            )));
        }
        if horaire.minute > 59 {
            return Err(AppError::validation(format!(
                "Ring time #{}: minute {} is out of range (0-59)",
                position, horaire.minute
            )));
        }
        if !(DUREE_MIN..=DUREE_MAX).contains(&horaire.duree_sonnerie) {
            return Err(AppError::validation(format!(
                "Ring time #{}: duration {}s is out of range ({}-{}s)",
                position, horaire.duree_sonnerie, DUREE_MIN, DUREE_MAX
            )));
        }
        if horaire.jours.is_empty() {
            return Err(AppError::validation(format!(
                "Ring time #{} ({:02}:{:02}) has no weekday",
                position, horaire.heure, horaire.minute
            )));
        }
        if let Some(jour) = horaire.jours.iter().find(|j| **j > 6) {
            return Err(AppError::validation(format!(
                "Ring time #{}: weekday {} is out of range (0-6)",
                position, jour
            )));
        }
        let distincts: HashSet<u8> = horaire.jours.iter().copied().collect();
        if distincts.len() != horaire.jours.len() {
            return Err(AppError::validation(format!(
                "Ring time #{} ({:02}:{:02}) lists the same weekday twice",
                position, horaire.heure, horaire.minute
            )));
        }

        if !signatures.insert(horaire.signature()) {
            return Err(AppError::validation(format!(
                "Duplicate ring time {:02}:{:02} for the same weekdays (entry #{})",
                horaire.heure, horaire.minute, position
            )));
        }
    }

    Ok(())
}

/// Jours effectifs : union triée des jours de chaque horaire
pub fn jours_actifs(horaires: &[HoraireSonnerie]) -> Vec<u8> {
    let jours: BTreeSet<u8> = horaires
        .iter()
        .flat_map(|h| h.jours.iter().copied())
        .collect();
    jours.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horaire(heure: u8, minute: u8, jours: &[u8]) -> HoraireSonnerie {
        HoraireSonnerie {
            heure,
            minute,
            jours: jours.to_vec(),
            duree_sonnerie: 5,
            description: None,
        }
    }

    #[test]
    fn test_jours_actifs_union() {
        let horaires = vec![horaire(8, 0, &[1, 3]), horaire(12, 0, &[1, 2])];
        assert_eq!(jours_actifs(&horaires), vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let horaires = vec![horaire(8, 0, &[1, 3]), horaire(8, 0, &[3, 1])];
        let err = valider_horaires(&horaires).unwrap_err();
        assert!(err.to_string().contains("Duplicate ring time 08:00"));
    }

    #[test]
    fn test_same_time_other_days_accepted() {
        let horaires = vec![horaire(8, 0, &[1, 3]), horaire(8, 0, &[2])];
        assert!(valider_horaires(&horaires).is_ok());
    }

    #[test]
    fn test_invalid_entries() {
        assert!(valider_horaires(&[]).is_err());
        assert!(valider_horaires(&[horaire(24, 0, &[1])]).is_err());
        assert!(valider_horaires(&[horaire(8, 60, &[1])]).is_err());
        assert!(valider_horaires(&[horaire(8, 0, &[])]).is_err());
        assert!(valider_horaires(&[horaire(8, 0, &[7])]).is_err());
        assert!(valider_horaires(&[horaire(8, 0, &[1, 1])]).is_err());

        let mut trop_long = horaire(8, 0, &[1]);
        trop_long.duree_sonnerie = 31;
        assert!(valider_horaires(&[trop_long]).is_err());

        let mut nulle = horaire(8, 0, &[1]);
        nulle.duree_sonnerie = 0;
        assert!(valider_horaires(&[nulle]).is_err());
    }
}
