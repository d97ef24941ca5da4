use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::PgPool;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const BOOTSTRAP: &str = "CREATE SCHEMA IF NOT EXISTS lbb;
CREATE TABLE IF NOT EXISTS lbb.schema_migrations (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);";

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "office table",
        sql: r#"
CREATE TABLE IF NOT EXISTS lbb.offices (
    siret TEXT PRIMARY KEY CHECK (siret ~ '^[0-9]{14}$'),
    naf TEXT NOT NULL,
    company_name TEXT NOT NULL DEFAULT '',
    office_name TEXT NOT NULL DEFAULT '',
    street_number TEXT NOT NULL DEFAULT '',
    street_name TEXT NOT NULL DEFAULT '',
    city_code TEXT NOT NULL,
    zipcode TEXT NOT NULL,
    email TEXT NOT NULL DEFAULT '',
    tel TEXT NOT NULL DEFAULT '',
    website TEXT NOT NULL DEFAULT '',
    social_network TEXT NOT NULL DEFAULT '',
    contact_mode TEXT NOT NULL DEFAULT '',
    headcount TEXT NOT NULL DEFAULT '',
    score DOUBLE PRECISION NOT NULL DEFAULT 0
        CHECK (score >= 0 AND score <= 100),
    score_alternance DOUBLE PRECISION NOT NULL DEFAULT 0
        CHECK (score_alternance >= 0 AND score_alternance <= 100),
    lat DOUBLE PRECISION NOT NULL,
    lon DOUBLE PRECISION NOT NULL,
    has_multi_geolocations BOOLEAN NOT NULL DEFAULT FALSE,
    updated_by_run TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_offices_naf ON lbb.offices(naf);
"#,
    },
    Migration {
        id: 2,
        description: "admin and third-party office overrides",
        sql: r#"
CREATE TABLE IF NOT EXISTS lbb.office_admin_updates (
    id BIGSERIAL PRIMARY KEY,
    sirets TEXT[] NOT NULL CHECK (cardinality(sirets) > 0),
    score DOUBLE PRECISION CHECK (score IS NULL OR (score >= 0 AND score <= 100)),
    score_alternance DOUBLE PRECISION
        CHECK (score_alternance IS NULL OR (score_alternance >= 0 AND score_alternance <= 100)),
    new_email TEXT,
    new_phone TEXT,
    new_website TEXT,
    social_network TEXT,
    contact_mode TEXT,
    remove_email BOOLEAN NOT NULL DEFAULT FALSE,
    remove_phone BOOLEAN NOT NULL DEFAULT FALSE,
    remove_website BOOLEAN NOT NULL DEFAULT FALSE,
    reason TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS lbb.office_third_party_updates (
    id BIGSERIAL PRIMARY KEY,
    sirets TEXT[] NOT NULL CHECK (cardinality(sirets) > 0),
    score DOUBLE PRECISION CHECK (score IS NULL OR (score >= 0 AND score <= 100)),
    score_alternance DOUBLE PRECISION
        CHECK (score_alternance IS NULL OR (score_alternance >= 0 AND score_alternance <= 100)),
    new_email TEXT,
    new_phone TEXT,
    new_website TEXT,
    social_network TEXT,
    contact_mode TEXT,
    remove_email BOOLEAN NOT NULL DEFAULT FALSE,
    remove_phone BOOLEAN NOT NULL DEFAULT FALSE,
    remove_website BOOLEAN NOT NULL DEFAULT FALSE,
    partner TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_office_admin_updates_sirets
    ON lbb.office_admin_updates USING GIN (sirets);
CREATE INDEX IF NOT EXISTS idx_office_third_party_updates_sirets
    ON lbb.office_third_party_updates USING GIN (sirets);
"#,
    },
    Migration {
        id: 3,
        description: "history of emails removed on request",
        sql: r#"
CREATE TABLE IF NOT EXISTS lbb.history_blacklist (
    id BIGSERIAL PRIMARY KEY,
    email VARCHAR(191) NOT NULL DEFAULT '',
    datetime_removal TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_blacklist_email ON lbb.history_blacklist(email);
"#,
    },
];

/// Applies pending migrations in order, each in its own transaction.
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client.batch_execute(BOOTSTRAP).await?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM lbb.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO lbb.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}
