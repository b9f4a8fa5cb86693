pub mod auth;
pub mod device_auth;

pub use auth::AuthAccount;
pub use device_auth::SireneAuth;
