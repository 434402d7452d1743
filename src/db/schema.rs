use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

/// Idempotent table bootstrap, run once at startup. A fresh database is
/// usable immediately; an existing one is left alone.
#[instrument(skip(pool))]
pub async fn migrate(pool: &PgPool) -> SqlxResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS punter (
            id BIGSERIAL PRIMARY KEY,
            chat_id BIGINT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            points BIGINT NOT NULL DEFAULT 0 CHECK (points >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fixture (
            id BIGSERIAL PRIMARY KEY,
            home TEXT NOT NULL,
            away TEXT NOT NULL,
            kicks_off_at TIMESTAMPTZ NOT NULL,
            final_score TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prediction (
            id BIGSERIAL PRIMARY KEY,
            punter_id BIGINT NOT NULL REFERENCES punter(id),
            fixture_id BIGINT NOT NULL REFERENCES fixture(id),
            predicted TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (punter_id, fixture_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("schema ready");

    Ok(())
}
