// Compte authentifié et portée des requêtes
//
// Le type de compte est résolu une seule fois à la frontière HTTP. Les
// services reçoivent ensuite un Scope explicite, jamais d'état ambiant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AccountRef {
    Ecole(i32),
    Technicien(i32),
    Admin(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Ecole(i32),
    Technicien(i32),
    Admin,
}

impl From<AccountRef> for Scope {
    fn from(account: AccountRef) -> Self {
        match account {
            AccountRef::Ecole(id) => Scope::Ecole(id),
            AccountRef::Technicien(id) => Scope::Technicien(id),
            AccountRef::Admin(_) => Scope::Admin,
        }
    }
}

impl Scope {
    /// Vrai si la portée autorise l'accès aux données de cette école
    pub fn covers_ecole(&self, ecole_id: i32) -> bool {
        match self {
            Scope::Admin => true,
            Scope::Ecole(id) => *id == ecole_id,
            Scope::Technicien(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_account() {
        assert_eq!(Scope::from(AccountRef::Ecole(3)), Scope::Ecole(3));
        assert_eq!(Scope::from(AccountRef::Admin(1)), Scope::Admin);
        assert!(Scope::Admin.covers_ecole(9));
        assert!(Scope::Ecole(3).covers_ecole(3));
        assert!(!Scope::Ecole(3).covers_ecole(4));
        assert!(!Scope::Technicien(3).covers_ecole(3));
    }

    #[test]
    fn test_account_ref_serialization() {
        let json = serde_json::to_string(&AccountRef::Technicien(7)).unwrap();
        assert_eq!(json, r#"{"type":"technicien","id":7}"#);
        let back: AccountRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AccountRef::Technicien(7));
    }
}
