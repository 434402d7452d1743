use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::instrument;

pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod schema;

pub mod prelude {
    pub use crate::db::Db;
    pub use crate::db::models::fixture::{Fixture, FixtureId};
    pub use crate::db::models::leaderboard::Standing;
    pub use crate::db::models::prediction::{Prediction, PredictionId, PredictionView};
    pub use crate::db::models::punter::{ChatId, Punter, PunterId, Registration};
    pub use crate::db::models::score::{Outcome, ParseScoreError, PointsTable, Score};
    pub use crate::db::repository::{
        Awarded, PredictionInsert, RepoError, RepoResult, Repository, SettleReport, Settlement,
    };

    pub use crate::db::memory::MemoryRepository;
    pub use crate::db::postgres::PgRepository;
}

pub type PgResult<T> = core::result::Result<T, PgErr>;

#[derive(Debug, Error)]
pub enum PgErr {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection handle passed down from the runner; nothing in here reads
/// the environment or holds global state.
pub struct Db {
    pool: PgPool,
}

impl Db {
    #[instrument(skip(url))]
    pub async fn connect(url: &str) -> PgResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
