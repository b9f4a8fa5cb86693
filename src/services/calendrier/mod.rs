pub mod jours_feries;
