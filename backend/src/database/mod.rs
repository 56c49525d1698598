//! Module for database connection setup and schema.
//!
//! This module is responsible for initializing the PostgreSQL connection
//! pool and creating the tables the directory needs. Queries live in
//! [`queries`], row mappings in [`models`].

pub mod models;
pub mod queries;

pub use queries::PgDirectory;

use crate::config::AppConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'active')),
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_idx ON users (lower(email))",
    r#"
    CREATE TABLE IF NOT EXISTS activation_tokens (
        token_hash TEXT PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        expires_at TIMESTAMPTZ NOT NULL,
        consumed_at TIMESTAMPTZ,
        delivered_at TIMESTAMPTZ
    )
    "#,
    "ALTER TABLE activation_tokens ADD COLUMN IF NOT EXISTS delivered_at TIMESTAMPTZ",
    "CREATE INDEX IF NOT EXISTS activation_tokens_user_id_idx ON activation_tokens (user_id)",
];

/// Open the pool described by the `DB_*` settings.
pub async fn connect(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.outbound_timeout())
        .connect(&config.database_url())
        .await
}

/// Create tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("database schema ready");
    Ok(())
}
