use std::sync::Arc;

use tracing::instrument;

use crate::db::models::leaderboard::Standing;
use crate::db::repository::Repository;
use crate::engine::EngineResult;

/// Read-only ranking over punter points. Ordering lives in the store so two
/// calls never disagree: points descending, ties by registration order.
#[derive(Debug)]
pub struct LeaderboardView<R> {
    repo: Arc<R>,
    default_size: i64,
}

impl<R> Clone for LeaderboardView<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            default_size: self.default_size,
        }
    }
}

impl<R: Repository> LeaderboardView<R> {
    pub fn new(repo: Arc<R>, default_size: i64) -> Self {
        Self { repo, default_size }
    }

    #[instrument(skip(self))]
    pub async fn top(&self, n: Option<i64>) -> EngineResult<Vec<Standing>> {
        let limit = n.unwrap_or(self.default_size);

        Ok(self.repo.standings(limit).await?)
    }
}
