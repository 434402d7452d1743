use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::db::models::fixture::{Fixture, FixtureId};
use crate::db::models::score::{PointsTable, Score};
use crate::db::repository::{Repository, SettleReport, Settlement};
use crate::engine::{EngineError, EngineResult, ValidationErr};

/// Settles fixtures. Entering a result is admin-only and happens at most
/// once per fixture; the store applies the result and every point award as
/// one unit.
#[derive(Debug)]
pub struct ScoringEngine<R> {
    repo: Arc<R>,
    table: PointsTable,
}

impl<R> Clone for ScoringEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            table: self.table,
        }
    }
}

impl<R: Repository> ScoringEngine<R> {
    pub fn new(repo: Arc<R>, table: PointsTable) -> Self {
        Self { repo, table }
    }

    pub fn table(&self) -> PointsTable {
        self.table
    }

    /// Stores the final score and awards points to all predictions on the
    /// fixture. Refuses a second result outright; corrections are not a
    /// thing here.
    #[instrument(skip(self, fixture_id, score_text), fields(fixture = fixture_id.0))]
    pub async fn enter_result(
        &self,
        fixture_id: FixtureId,
        score_text: &str,
        requester_is_admin: bool,
    ) -> EngineResult<SettleReport> {
        if !requester_is_admin {
            return Err(EngineError::Forbidden);
        }

        let final_score: Score = score_text.parse()?;

        match self
            .repo
            .settle_fixture(fixture_id, final_score, self.table)
            .await?
        {
            Settlement::Settled(report) => {
                tracing::info!(
                    scored = report.scored(),
                    earners = report.earners(),
                    "fixture settled"
                );
                Ok(report)
            }
            Settlement::AlreadySettled => Err(EngineError::ResultAlreadyEntered),
            Settlement::NoSuchFixture => Err(EngineError::UnknownFixture),
        }
    }

    #[instrument(skip(self, home, away))]
    pub async fn create_fixture(
        &self,
        home: &str,
        away: &str,
        kicks_off_at: DateTime<Utc>,
        requester_is_admin: bool,
    ) -> EngineResult<Fixture> {
        if !requester_is_admin {
            return Err(EngineError::Forbidden);
        }

        let home = home.trim();
        let away = away.trim();
        if home.is_empty() || away.is_empty() {
            return Err(EngineError::Validation(ValidationErr::BlankTeam));
        }

        Ok(self.repo.create_fixture(home, away, kicks_off_at).await?)
    }
}
