// connexion BD

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::AppConfig;

pub async fn establish_connection(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options.sqlx_logging(false);

    Database::connect(options).await
}

/// Base SQLite en mémoire avec le schéma complet, pour les tests de services
#[cfg(test)]
pub async fn test_connection() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    crate::schema::create_schema(&db)
        .await
        .expect("Failed to create schema");
    db
}
