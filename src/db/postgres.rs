use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::db::models::fixture::{Fixture, FixtureId};
use crate::db::models::leaderboard::Standing;
use crate::db::models::prediction::{PredictionId, PredictionView};
use crate::db::models::punter::{ChatId, Punter, PunterId, Registration};
use crate::db::models::score::{PointsTable, Score};
use crate::db::repository::{
    Awarded, PredictionInsert, RepoError, RepoResult, Repository, SettleReport, Settlement,
};

/// Postgres-backed store. Scores travel as `"H-A"` text and are parsed on the
/// way out; a stored value that no longer parses surfaces as
/// [`RepoError::Corrupt`] and aborts the surrounding transaction.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FixtureRow {
    id: FixtureId,
    home: String,
    away: String,
    kicks_off_at: DateTime<Utc>,
    final_score: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FixtureRow> for Fixture {
    type Error = RepoError;

    fn try_from(row: FixtureRow) -> Result<Self, Self::Error> {
        let final_score = row
            .final_score
            .map(|raw| {
                raw.parse::<Score>().map_err(|e| {
                    RepoError::Corrupt(format!("fixture {}: stored result {raw:?}: {e}", row.id))
                })
            })
            .transpose()?;

        Ok(Fixture {
            id: row.id,
            home: row.home,
            away: row.away,
            kicks_off_at: row.kicks_off_at,
            final_score,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PredictionViewRow {
    fixture_id: FixtureId,
    home: String,
    away: String,
    kicks_off_at: DateTime<Utc>,
    predicted: String,
    final_score: Option<String>,
}

impl TryFrom<PredictionViewRow> for PredictionView {
    type Error = RepoError;

    fn try_from(row: PredictionViewRow) -> Result<Self, Self::Error> {
        let predicted = row.predicted.parse::<Score>().map_err(|e| {
            RepoError::Corrupt(format!(
                "fixture {}: stored prediction {:?}: {e}",
                row.fixture_id, row.predicted
            ))
        })?;

        let final_score = row
            .final_score
            .map(|raw| {
                raw.parse::<Score>().map_err(|e| {
                    RepoError::Corrupt(format!(
                        "fixture {}: stored result {raw:?}: {e}",
                        row.fixture_id
                    ))
                })
            })
            .transpose()?;

        Ok(PredictionView {
            fixture_id: row.fixture_id,
            home: row.home,
            away: row.away,
            kicks_off_at: row.kicks_off_at,
            predicted,
            final_score,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AwardRow {
    punter_id: PunterId,
    name: String,
    predicted: String,
}

const FIXTURE_FIELDS: &str = "id, home, away, kicks_off_at, final_score, created_at";

#[async_trait]
impl Repository for PgRepository {
    #[instrument(skip(self, chat_id, name), fields(chat = chat_id.0))]
    async fn ensure_punter(&self, chat_id: ChatId, name: &str) -> RepoResult<Registration> {
        let inserted = sqlx::query_as::<_, Punter>(
            r#"
            INSERT INTO punter (chat_id, name)
            VALUES ($1, $2)
            ON CONFLICT (chat_id)
            DO NOTHING
            RETURNING id, chat_id, name, points, created_at
            "#,
        )
        .bind(chat_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(punter) => {
                tracing::debug!(punter = punter.id.0, "registered new punter");
                Ok(Registration::Created(punter))
            }
            None => {
                let existing = self.punter_by_chat_id(chat_id).await?.ok_or_else(|| {
                    RepoError::Corrupt(format!("punter row vanished for chat {chat_id}"))
                })?;
                Ok(Registration::Existing(existing))
            }
        }
    }

    #[instrument(skip(self))]
    async fn punter_by_chat_id(&self, chat_id: ChatId) -> RepoResult<Option<Punter>> {
        let punter = sqlx::query_as::<_, Punter>(
            "SELECT id, chat_id, name, points, created_at FROM punter WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(punter)
    }

    #[instrument(skip(self))]
    async fn create_fixture(
        &self,
        home: &str,
        away: &str,
        kicks_off_at: DateTime<Utc>,
    ) -> RepoResult<Fixture> {
        let row = sqlx::query_as::<_, FixtureRow>(&format!(
            r#"
            INSERT INTO fixture (home, away, kicks_off_at)
            VALUES ($1, $2, $3)
            RETURNING {FIXTURE_FIELDS}
            "#,
        ))
        .bind(home)
        .bind(away)
        .bind(kicks_off_at)
        .fetch_one(&self.pool)
        .await?;

        Fixture::try_from(row)
    }

    #[instrument(skip(self))]
    async fn fixture_by_id(&self, id: FixtureId) -> RepoResult<Option<Fixture>> {
        let row = sqlx::query_as::<_, FixtureRow>(&format!(
            "SELECT {FIXTURE_FIELDS} FROM fixture WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Fixture::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn open_fixtures_for(&self, chat_id: ChatId) -> RepoResult<Vec<Fixture>> {
        let rows = sqlx::query_as::<_, FixtureRow>(
            r#"
            SELECT f.id, f.home, f.away, f.kicks_off_at, f.final_score, f.created_at
            FROM fixture f
            WHERE f.final_score IS NULL
            AND NOT EXISTS (
                SELECT 1 FROM prediction p
                JOIN punter u ON u.id = p.punter_id
                WHERE p.fixture_id = f.id
                AND u.chat_id = $1
            )
            ORDER BY f.kicks_off_at ASC, f.id ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Fixture::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn unscored_fixtures(&self) -> RepoResult<Vec<Fixture>> {
        let rows = sqlx::query_as::<_, FixtureRow>(&format!(
            r#"
            SELECT {FIXTURE_FIELDS} FROM fixture
            WHERE final_score IS NULL
            ORDER BY kicks_off_at ASC, id ASC
            "#,
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Fixture::try_from).collect()
    }

    #[instrument(skip(self, chat_id, fixture_id, predicted), fields(chat = chat_id.0, fixture = fixture_id.0))]
    async fn insert_prediction(
        &self,
        chat_id: ChatId,
        fixture_id: FixtureId,
        predicted: Score,
    ) -> RepoResult<PredictionInsert> {
        let mut tx = self.pool.begin().await?;

        // The share lock orders this check against a racing settlement's FOR
        // UPDATE; once the settler commits, the re-read sees its final score
        // and the insert is refused rather than landing unscored.
        let settled = sqlx::query_scalar::<_, bool>(
            "SELECT final_score IS NOT NULL FROM fixture WHERE id = $1 FOR SHARE",
        )
        .bind(fixture_id)
        .fetch_optional(&mut *tx)
        .await?;

        match settled {
            None => return Ok(PredictionInsert::NoSuchFixture),
            Some(true) => return Ok(PredictionInsert::FixtureSettled),
            Some(false) => {}
        }

        let punter_id =
            sqlx::query_scalar::<_, PunterId>("SELECT id FROM punter WHERE chat_id = $1")
                .bind(chat_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(punter_id) = punter_id else {
            return Ok(PredictionInsert::UnknownPunter);
        };

        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM prediction WHERE punter_id = $1 AND fixture_id = $2)",
        )
        .bind(punter_id)
        .bind(fixture_id)
        .fetch_one(&mut *tx)
        .await?;

        if taken {
            return Ok(PredictionInsert::Duplicate);
        }

        // The unique index is the real gate; the pre-check above only keeps
        // the common duplicate path off the conflict machinery.
        let id = sqlx::query_scalar::<_, PredictionId>(
            r#"
            INSERT INTO prediction (punter_id, fixture_id, predicted)
            VALUES ($1, $2, $3)
            ON CONFLICT (punter_id, fixture_id)
            DO NOTHING
            RETURNING id
            "#,
        )
        .bind(punter_id)
        .bind(fixture_id)
        .bind(predicted.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = id else {
            return Ok(PredictionInsert::Duplicate);
        };

        tx.commit().await?;
        tracing::debug!(prediction = id.0, "prediction recorded");

        Ok(PredictionInsert::Inserted(id))
    }

    #[instrument(skip(self))]
    async fn predictions_for(&self, chat_id: ChatId) -> RepoResult<Vec<PredictionView>> {
        let rows = sqlx::query_as::<_, PredictionViewRow>(
            r#"
            SELECT p.fixture_id, f.home, f.away, f.kicks_off_at, p.predicted, f.final_score
            FROM prediction p
            JOIN fixture f ON f.id = p.fixture_id
            JOIN punter u ON u.id = p.punter_id
            WHERE u.chat_id = $1
            ORDER BY f.kicks_off_at ASC, p.fixture_id ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PredictionView::try_from).collect()
    }

    #[instrument(skip(self, fixture_id, table), fields(fixture = fixture_id.0))]
    async fn settle_fixture(
        &self,
        fixture_id: FixtureId,
        final_score: Score,
        table: PointsTable,
    ) -> RepoResult<Settlement> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, FixtureRow>(&format!(
            "SELECT {FIXTURE_FIELDS} FROM fixture WHERE id = $1 FOR UPDATE",
        ))
        .bind(fixture_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(Settlement::NoSuchFixture);
        };

        if row.final_score.is_some() {
            return Ok(Settlement::AlreadySettled);
        }

        sqlx::query("UPDATE fixture SET final_score = $2 WHERE id = $1")
            .bind(fixture_id)
            .bind(final_score.to_string())
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, AwardRow>(
            r#"
            SELECT p.punter_id, u.name, p.predicted
            FROM prediction p
            JOIN punter u ON u.id = p.punter_id
            WHERE p.fixture_id = $1
            ORDER BY p.punter_id ASC
            "#,
        )
        .bind(fixture_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut awarded = Vec::with_capacity(rows.len());
        for entry in rows {
            let predicted = entry.predicted.parse::<Score>().map_err(|e| {
                RepoError::Corrupt(format!(
                    "fixture {fixture_id}: stored prediction {:?}: {e}",
                    entry.predicted
                ))
            })?;
            let points = table.award(predicted, final_score);

            if points > 0 {
                sqlx::query("UPDATE punter SET points = points + $2 WHERE id = $1")
                    .bind(entry.punter_id)
                    .bind(points)
                    .execute(&mut *tx)
                    .await?;
            }

            awarded.push(Awarded {
                punter_id: entry.punter_id,
                name: entry.name,
                predicted,
                points,
            });
        }

        tx.commit().await?;
        tracing::debug!(scored = awarded.len(), "fixture settled");

        Ok(Settlement::Settled(SettleReport {
            fixture_id,
            final_score,
            awarded,
        }))
    }

    #[instrument(skip(self))]
    async fn standings(&self, limit: i64) -> RepoResult<Vec<Standing>> {
        let rows = sqlx::query_as::<_, Standing>(
            r#"
            SELECT
                ROW_NUMBER() OVER (ORDER BY points DESC, id ASC) AS rank,
                name,
                points
            FROM punter
            ORDER BY points DESC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
