use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
#[cfg(test)]
use chrono::{Duration, Utc};
#[cfg(test)]
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::account::AccountRef;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,        // user_id
    pub account: AccountRef,
    pub exp: i64,        // expiration timestamp
}

/// Clé HS256 construite une fois depuis JWT_SECRET.
/// Les JWT sont émis par le service d'identité, ce backend ne fait que les vérifier.
#[derive(Clone)]
pub struct JwtKeys {
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Vérifie la signature et l'expiration, renvoie les claims
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
    }
}

/// Émission d'un JWT signé avec le même secret, pour les tests d'extracteurs
#[cfg(test)]
pub fn issue(secret: &str, user_id: i32, account: AccountRef, ttl: Duration) -> String {
    let claims = Claims {
        sub: user_id,
        account,
        exp: (Utc::now() + ttl).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("Failed to sign test token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let token = issue("test-secret", 123, AccountRef::Ecole(45), Duration::hours(1));
        let claims = JwtKeys::new("test-secret").verify(&token).unwrap();

        assert_eq!(claims.sub, 123);
        assert_eq!(claims.account, AccountRef::Ecole(45));
    }

    #[test]
    fn test_wrong_secret_and_expired() {
        let token = issue("a", 1, AccountRef::Admin(1), Duration::hours(1));
        assert!(matches!(JwtKeys::new("b").verify(&token), Err(AppError::Authentication(_))));

        let keys = JwtKeys::new("a");
        let expired = issue("a", 1, AccountRef::Admin(1), Duration::hours(-2));
        assert!(keys.verify(&expired).is_err());
        assert!(keys.verify("invalid.token.here").is_err());
    }
}
