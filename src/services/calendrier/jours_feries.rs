use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::calendrier_scolaire::PeriodeVacances;
use crate::models::jour_ferie;

/// Jours fériés résolus pour une école (ou au niveau national).
///
/// Une ligne propre à l'école fait foi sur la ligne nationale de même date :
/// une ligne école inactive supprime un férié national.
#[derive(Debug, Clone, Default)]
pub struct JoursFeries {
    nationaux: HashMap<NaiveDate, bool>,
    ecole: HashMap<NaiveDate, bool>,
    vacances: Vec<PeriodeVacances>,
}

impl JoursFeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construit l'ensemble depuis les lignes jours_feries.
    /// Les lignes d'autres écoles sont ignorées.
    pub fn from_lignes(lignes: &[jour_ferie::Model], ecole_id: Option<i32>) -> Self {
        let mut feries = Self::new();
        for ligne in lignes {
            match ligne.ecole_id {
                None => feries.ajouter_national(ligne.date, ligne.actif),
                Some(id) if Some(id) == ecole_id => feries.ajouter_ecole(ligne.date, ligne.actif),
                Some(_) => {}
            }
        }
        feries
    }

    pub fn ajouter_national(&mut self, date: NaiveDate, actif: bool) {
        let entree = self.nationaux.entry(date).or_insert(false);
        *entree = *entree || actif;
    }

    /// Férié par défaut d'un calendrier : ne remplace pas une ligne existante
    pub fn ajouter_defaut(&mut self, date: NaiveDate) {
        self.nationaux.entry(date).or_insert(true);
    }

    pub fn ajouter_ecole(&mut self, date: NaiveDate, actif: bool) {
        self.ecole.insert(date, actif);
    }

    pub fn ajouter_vacances(&mut self, periode: PeriodeVacances) {
        self.vacances.push(periode);
    }

    pub fn est_ferie(&self, date: NaiveDate) -> bool {
        if let Some(actif) = self.ecole.get(&date) {
            return *actif;
        }
        self.nationaux.get(&date).copied().unwrap_or(false)
    }

    pub fn est_en_vacances(&self, date: NaiveDate) -> bool {
        self.vacances.iter().any(|p| p.contient(date))
    }

    /// Jours de classe entre deux dates incluses : hors week-ends, fériés et vacances
    pub fn jours_ouvres(&self, debut: NaiveDate, fin: NaiveDate) -> i64 {
        debut
            .iter_days()
            .take_while(|d| *d <= fin)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .filter(|d| !self.est_ferie(*d))
            .filter(|d| !self.est_en_vacances(*d))
            .count() as i64
    }
}
