use chrono::{Datelike, NaiveDate};

use crate::models::programmation::{ActionException, ExceptionFerie, HoraireSonnerie};
use crate::services::calendrier::jours_feries::JoursFeries;

use super::horaires::jours_actifs;

/// Vue d'une programmation suffisante pour calculer ce qui sonne un jour donné
#[derive(Debug, Clone)]
pub struct Planning<'a> {
    pub horaires: &'a [HoraireSonnerie],
    pub jours_feries_inclus: bool,
    pub exceptions: &'a [ExceptionFerie],
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
    pub actif: bool,
}

impl<'a> Planning<'a> {
    fn exception(&self, date: NaiveDate, action: ActionException) -> bool {
        self.exceptions
            .iter()
            .any(|e| e.date == date && e.action == action)
    }

    /// Sonneries effectives pour une date, dans l'ordre des horaires
    pub fn sonneries(&self, date: NaiveDate, feries: &JoursFeries) -> Vec<&'a HoraireSonnerie> {
        if !self.actif || date < self.date_debut || date > self.date_fin {
            return Vec::new();
        }

        // 0 = dimanche
        let jour = date.weekday().num_days_from_sunday() as u8;
        if !jours_actifs(self.horaires).contains(&jour) {
            return Vec::new();
        }

        if feries.est_ferie(date)
            && !self.jours_feries_inclus
            && !self.exception(date, ActionException::Include)
        {
            return Vec::new();
        }

        if self.exception(date, ActionException::Exclude) {
            return Vec::new();
        }

        self.horaires.iter().filter(|h| h.sonne_le(jour)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn horaire(heure: u8, jours: &[u8]) -> HoraireSonnerie {
        HoraireSonnerie {
            heure,
            minute: 0,
            jours: jours.to_vec(),
            duree_sonnerie: 5,
            description: None,
        }
    }

    fn planning<'a>(horaires: &'a [HoraireSonnerie], exceptions: &'a [ExceptionFerie]) -> Planning<'a> {
        Planning {
            horaires,
            jours_feries_inclus: false,
            exceptions,
            date_debut: date(2026, 9, 1),
            date_fin: date(2027, 6, 30),
            actif: true,
        }
    }

    #[test]
    fn test_rings_on_matching_weekday() {
        let horaires = vec![horaire(8, &[1, 3]), horaire(12, &[1, 2])];
        let p = planning(&horaires, &[]);
        let feries = JoursFeries::new();

        // Lundi 5 octobre 2026
        assert_eq!(p.sonneries(date(2026, 10, 5), &feries).len(), 2);
        // Mardi
        let mardi = p.sonneries(date(2026, 10, 6), &feries);
        assert_eq!(mardi.len(), 1);
        assert_eq!(mardi[0].heure, 12);
        // Dimanche
        assert!(p.sonneries(date(2026, 10, 4), &feries).is_empty());
    }

    #[test]
    fn test_holiday_exclusion_and_include_exception() {
        let horaires = vec![horaire(8, &[1])];
        let lundi_ferie = date(2026, 11, 2);
        let mut feries = JoursFeries::new();
        feries.ajouter_national(lundi_ferie, true);

        let p = planning(&horaires, &[]);
        assert!(p.sonneries(lundi_ferie, &feries).is_empty());

        let exceptions = vec![ExceptionFerie {
            date: lundi_ferie,
            action: ActionException::Include,
        }];
        let p = planning(&horaires, &exceptions);
        assert_eq!(p.sonneries(lundi_ferie, &feries).len(), 1);
    }

    #[test]
    fn test_holidays_included_flag() {
        let horaires = vec![horaire(8, &[1])];
        let lundi_ferie = date(2026, 11, 2);
        let mut feries = JoursFeries::new();
        feries.ajouter_national(lundi_ferie, true);

        let mut p = planning(&horaires, &[]);
        p.jours_feries_inclus = true;
        assert_eq!(p.sonneries(lundi_ferie, &feries).len(), 1);
    }

    #[test]
    fn test_exclude_exception() {
        let horaires = vec![horaire(8, &[1])];
        let exceptions = vec![ExceptionFerie {
            date: date(2026, 10, 5),
            action: ActionException::Exclude,
        }];
        let p = planning(&horaires, &exceptions);
        let feries = JoursFeries::new();
        assert!(p.sonneries(date(2026, 10, 5), &feries).is_empty());
        assert_eq!(p.sonneries(date(2026, 10, 12), &feries).len(), 1);
    }

    #[test]
    fn test_outside_window_or_inactive() {
        let horaires = vec![horaire(8, &[1])];
        let mut p = planning(&horaires, &[]);
        let feries = JoursFeries::new();
        // Lundi 6 juillet 2026, avant date_debut
        assert!(p.sonneries(date(2026, 7, 6), &feries).is_empty());

        p.actif = false;
        assert!(p.sonneries(date(2026, 10, 5), &feries).is_empty());
    }
}
