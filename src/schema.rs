// ============================================================================
// SCHÉMA
// ============================================================================
//
// Description:
//   Création des tables à partir des entités SeaORM, puis des index qui
//   portent les invariants de concurrence. Idempotent (IF NOT EXISTS).
//
// Index partiels:
//   - une seule sirène non supprimée par numéro de série
//   - un seul abonnement vivant (en_attente, actif, suspendu) par sirène :
//     de deux activations concurrentes, la perdante reçoit une violation
//     d'unicité, remontée en AppError::Conflict
//   - un seul token actif par abonnement
//   - pas deux jours fériés sur le même triplet (calendrier, date, école)
//
// Points d'attention:
//   - Syntaxe commune PostgreSQL / SQLite (index partiels et d'expression)
//   - L'ordre de création respecte les clés étrangères
//
// ============================================================================

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};

use crate::models::{
    abonnement, avis, calendrier_scolaire, intervention, jour_ferie, mission_technicien,
    ordre_mission, paiement, panne, programmation, rapport_intervention, sirene, token_sirene,
};

const INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_sirenes_numero_serie \
     ON sirenes (numero_serie) WHERE deleted_at IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_abonnements_sirene_vivant \
     ON abonnements (sirene_id) \
     WHERE statut IN ('en_attente', 'actif', 'suspendu') AND deleted_at IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_tokens_sirene_actif \
     ON tokens_sirene (abonnement_id) WHERE actif",
    "CREATE INDEX IF NOT EXISTS ix_tokens_sirene_hash ON tokens_sirene (token_hash)",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_jours_feries_triplet \
     ON jours_feries (COALESCE(calendrier_id, 0), \"date\", COALESCE(ecole_id, 0))",
    "CREATE INDEX IF NOT EXISTS ix_programmations_sirene \
     ON programmations (sirene_id) WHERE deleted_at IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_missions_candidature_active \
     ON missions_techniciens (ordre_mission_id, technicien_id) \
     WHERE statut IN ('soumise', 'acceptee')",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_avis_intervention_ecole \
     ON avis (intervention_id, ecole_id)",
];

pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, sirene::Entity).await?;
    create_table(db, &schema, abonnement::Entity).await?;
    create_table(db, &schema, paiement::Entity).await?;
    create_table(db, &schema, token_sirene::Entity).await?;
    create_table(db, &schema, calendrier_scolaire::Entity).await?;
    create_table(db, &schema, jour_ferie::Entity).await?;
    create_table(db, &schema, programmation::Entity).await?;
    create_table(db, &schema, panne::Entity).await?;
    create_table(db, &schema, ordre_mission::Entity).await?;
    create_table(db, &schema, mission_technicien::Entity).await?;
    create_table(db, &schema, intervention::Entity).await?;
    create_table(db, &schema, rapport_intervention::Entity).await?;
    create_table(db, &schema, avis::Entity).await?;

    for sql in INDEXES {
        db.execute_unprepared(sql).await?;
    }

    tracing::info!("database schema ready");
    Ok(())
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(db.get_database_backend().build(&statement)).await?;
    Ok(())
}
