use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::fixture::{Fixture, FixtureId};
use crate::db::models::leaderboard::Standing;
use crate::db::models::prediction::{PredictionId, PredictionView};
use crate::db::models::punter::{ChatId, Punter, PunterId, Registration};
use crate::db::models::score::{PointsTable, Score};

pub type RepoResult<T> = core::result::Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database failure: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// Outcome of attempting to record a prediction. The uniqueness check and the
/// insert happen in the same transaction, so `Duplicate` is authoritative no
/// matter how many submissions race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionInsert {
    Inserted(PredictionId),
    Duplicate,
    NoSuchFixture,
    FixtureSettled,
    UnknownPunter,
}

/// One punter's share of a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Awarded {
    pub punter_id: PunterId,
    pub name: String,
    pub predicted: Score,
    pub points: i64,
}

/// What a successful settlement did. `awarded` covers every prediction on the
/// fixture, zero-point entries included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleReport {
    pub fixture_id: FixtureId,
    pub final_score: Score,
    pub awarded: Vec<Awarded>,
}

impl SettleReport {
    /// Number of predictions scored.
    pub fn scored(&self) -> usize {
        self.awarded.len()
    }

    /// Number of predictions that earned points.
    pub fn earners(&self) -> usize {
        self.awarded.iter().filter(|a| a.points > 0).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Settled(SettleReport),
    AlreadySettled,
    NoSuchFixture,
}

/// Storage surface for the prediction game. Backed by Postgres in production
/// and by an in-memory store in tests; both uphold the same transactional
/// guarantees (no partial predictions, no partially scored fixtures).
#[async_trait]
pub trait Repository: Send + Sync {
    /// Registers the chat if unseen, otherwise returns the existing punter
    /// untouched. Never overwrites a name.
    async fn ensure_punter(&self, chat_id: ChatId, name: &str) -> RepoResult<Registration>;

    async fn punter_by_chat_id(&self, chat_id: ChatId) -> RepoResult<Option<Punter>>;

    async fn create_fixture(
        &self,
        home: &str,
        away: &str,
        kicks_off_at: DateTime<Utc>,
    ) -> RepoResult<Fixture>;

    async fn fixture_by_id(&self, id: FixtureId) -> RepoResult<Option<Fixture>>;

    /// Fixtures still open to this punter: no final score yet and no
    /// prediction of theirs on record.
    async fn open_fixtures_for(&self, chat_id: ChatId) -> RepoResult<Vec<Fixture>>;

    /// Fixtures awaiting a result, oldest kickoff first.
    async fn unscored_fixtures(&self) -> RepoResult<Vec<Fixture>>;

    /// Records a prediction in a single transaction: fixture must exist and
    /// be unsettled, punter must be registered, and the `(punter, fixture)`
    /// pair must be unseen.
    async fn insert_prediction(
        &self,
        chat_id: ChatId,
        fixture_id: FixtureId,
        predicted: Score,
    ) -> RepoResult<PredictionInsert>;

    async fn predictions_for(&self, chat_id: ChatId) -> RepoResult<Vec<PredictionView>>;

    /// Stores the final score and awards points to every prediction on the
    /// fixture in one transaction. A second call for the same fixture returns
    /// `AlreadySettled` and changes nothing.
    async fn settle_fixture(
        &self,
        fixture_id: FixtureId,
        final_score: Score,
        table: PointsTable,
    ) -> RepoResult<Settlement>;

    /// Leaderboard rows, ranked by the store: points descending, ties broken
    /// by registration order.
    async fn standings(&self, limit: i64) -> RepoResult<Vec<Standing>>;
}
