pub mod encodeur;
pub mod horaires;
pub mod planning;
