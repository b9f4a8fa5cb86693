use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures::future::{Ready, ready};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::account::{AccountRef, Scope};
use crate::utils::jwt::JwtKeys;

/// Compte authentifié par JWT (école, technicien ou admin).
/// Utilisé comme extracteur dans les routes protégées.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthAccount {
    pub user_id: i32,
    pub account: AccountRef,
}

impl AuthAccount {
    pub fn scope(&self) -> Scope {
        Scope::from(self.account)
    }

    pub fn admin_id(&self) -> Result<i32, AppError> {
        match self.account {
            AccountRef::Admin(id) => Ok(id),
            _ => Err(AppError::Forbidden("Administrator account required".to_string())),
        }
    }

    pub fn technicien_id(&self) -> Result<i32, AppError> {
        match self.account {
            AccountRef::Technicien(id) => Ok(id),
            _ => Err(AppError::Forbidden("Technician account required".to_string())),
        }
    }

    pub fn ecole_id(&self) -> Result<i32, AppError> {
        match self.account {
            AccountRef::Ecole(id) => Ok(id),
            _ => Err(AppError::Forbidden("School account required".to_string())),
        }
    }
}

impl FromRequest for AuthAccount {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extraire(req))
    }
}

fn extraire(req: &HttpRequest) -> Result<AuthAccount, AppError> {
    // 1. Header Authorization
    let auth_str = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Authentication("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Authentication("Invalid Authorization header".to_string()))?;

    // 2. Format "Bearer <token>"
    let token = auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Authentication("Invalid Authorization format (expected: Bearer <token>)".to_string())
    })?;

    // 3. Vérification du JWT
    let keys = req
        .app_data::<web::Data<JwtKeys>>()
        .ok_or_else(|| AppError::Configuration("JWT keys not registered".to_string()))?;
    let claims = keys.verify(token)?;

    Ok(AuthAccount {
        user_id: claims.sub,
        account: claims.account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::Duration;

    use crate::utils::jwt;

    fn requete() -> TestRequest {
        TestRequest::default().app_data(web::Data::new(JwtKeys::new("secret")))
    }

    #[test]
    fn test_extract_account_from_bearer() {
        let token = jwt::issue("secret", 5, AccountRef::Technicien(12), Duration::hours(1));
        let req = requete()
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();

        let account = extraire(&req).unwrap();
        assert_eq!(account.user_id, 5);
        assert_eq!(account.scope(), Scope::Technicien(12));
        assert_eq!(account.technicien_id().unwrap(), 12);
        assert!(account.admin_id().is_err());
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let req = requete().to_http_request();
        assert!(matches!(extraire(&req), Err(AppError::Authentication(_))));

        let req = requete()
            .insert_header(("Authorization", "Token abc"))
            .to_http_request();
        assert!(matches!(extraire(&req), Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_token_signed_with_other_secret() {
        let token = jwt::issue("autre", 1, AccountRef::Admin(1), Duration::hours(1));
        let req = requete()
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();
        assert!(matches!(extraire(&req), Err(AppError::Authentication(_))));
    }
}
