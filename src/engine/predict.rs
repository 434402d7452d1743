use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::db::models::fixture::{Fixture, FixtureId};
use crate::db::models::prediction::PredictionId;
use crate::db::models::punter::ChatId;
use crate::db::models::score::Score;
use crate::db::repository::{PredictionInsert, Repository};
use crate::engine::deadline::DeadlinePolicy;
use crate::engine::{EngineError, EngineResult};

/// Accepts predictions while the weekly window is open. All storage checks
/// run inside a single repository transaction, so two racing submissions for
/// the same `(chat, fixture)` pair cannot both land.
#[derive(Debug)]
pub struct PredictionEngine<R> {
    repo: Arc<R>,
    policy: DeadlinePolicy,
}

impl<R> Clone for PredictionEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            policy: self.policy,
        }
    }
}

impl<R: Repository> PredictionEngine<R> {
    pub fn new(repo: Arc<R>, policy: DeadlinePolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> &DeadlinePolicy {
        &self.policy
    }

    /// Records one prediction. Grammar is checked before anything else, then
    /// the window, then fixture and registration state inside the store.
    #[instrument(skip(self, chat_id, fixture_id, score_text), fields(chat = chat_id.0, fixture = fixture_id.0))]
    pub async fn submit(
        &self,
        chat_id: ChatId,
        fixture_id: FixtureId,
        score_text: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<PredictionId> {
        let predicted: Score = score_text.parse()?;

        if self.policy.is_past(now) {
            let deadline = self.policy.cycle_deadline(now);
            tracing::debug!(%deadline, "submission after cutoff");
            return Err(EngineError::DeadlineExceeded(deadline));
        }

        match self
            .repo
            .insert_prediction(chat_id, fixture_id, predicted)
            .await?
        {
            PredictionInsert::Inserted(id) => Ok(id),
            PredictionInsert::Duplicate => Err(EngineError::AlreadyPredicted),
            PredictionInsert::NoSuchFixture | PredictionInsert::FixtureSettled => {
                Err(EngineError::UnknownFixture)
            }
            PredictionInsert::UnknownPunter => Err(EngineError::UnknownUser),
        }
    }

    /// Fixtures this chat can still predict, soonest kickoff first. Empty
    /// once the window is closed; callers that need to tell "nothing left"
    /// from "too late" check [`policy()`](Self::policy) themselves.
    #[instrument(skip(self, chat_id), fields(chat = chat_id.0))]
    pub async fn open_fixtures(
        &self,
        chat_id: ChatId,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Fixture>> {
        if self.policy.is_past(now) {
            return Ok(Vec::new());
        }

        Ok(self.repo.open_fixtures_for(chat_id).await?)
    }
}

#[cfg(test)]
mod test {
    use chrono::{NaiveTime, TimeZone, Weekday};

    use super::*;
    use crate::db::memory::MemoryRepository;
    use crate::db::models::score::PointsTable;

    fn engine(repo: Arc<MemoryRepository>) -> PredictionEngine<MemoryRepository> {
        PredictionEngine::new(
            repo,
            DeadlinePolicy::new(Weekday::Fri, NaiveTime::from_hms_opt(20, 0, 0).unwrap()),
        )
    }

    // a Wednesday morning, comfortably inside the window
    fn midweek() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 19, 10, 0, 0).unwrap()
    }

    fn kickoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 22, 15, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn submit_rejects_bad_grammar_before_anything_else() {
        let repo = Arc::new(MemoryRepository::new());
        let engine = engine(repo);

        let err = engine
            .submit(ChatId(1), FixtureId(1), "2:1", midweek())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn submit_happy_path_then_duplicate() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        let fixture = repo.create_fixture("Reds", "Blues", kickoff()).await.unwrap();
        let engine = engine(repo);

        engine
            .submit(ChatId(1), fixture.id, "2-1", midweek())
            .await
            .unwrap();

        let err = engine
            .submit(ChatId(1), fixture.id, "3-0", midweek())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyPredicted));
    }

    #[tokio::test]
    async fn submit_after_cutoff_reports_the_deadline() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        let fixture = repo.create_fixture("Reds", "Blues", kickoff()).await.unwrap();
        let engine = engine(repo);

        // Friday 21:00, an hour past the cutoff
        let late = Utc.with_ymd_and_hms(2026, 8, 21, 21, 0, 0).unwrap();
        let err = engine
            .submit(ChatId(1), fixture.id, "2-1", late)
            .await
            .unwrap_err();

        match err {
            EngineError::DeadlineExceeded(at) => {
                assert_eq!(at, Utc.with_ymd_and_hms(2026, 8, 21, 20, 0, 0).unwrap());
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_against_missing_or_settled_fixture() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        let fixture = repo.create_fixture("Reds", "Blues", kickoff()).await.unwrap();
        repo.settle_fixture(fixture.id, "1-0".parse().unwrap(), PointsTable::default())
            .await
            .unwrap();
        let engine = engine(repo);

        let err = engine
            .submit(ChatId(1), FixtureId(999), "2-1", midweek())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownFixture));

        let err = engine
            .submit(ChatId(1), fixture.id, "2-1", midweek())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownFixture));
    }

    #[tokio::test]
    async fn submit_requires_registration() {
        let repo = Arc::new(MemoryRepository::new());
        let fixture = repo.create_fixture("Reds", "Blues", kickoff()).await.unwrap();
        let engine = engine(repo);

        let err = engine
            .submit(ChatId(7), fixture.id, "2-1", midweek())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownUser));
    }

    #[tokio::test]
    async fn open_fixtures_hides_predicted_and_settled() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        let a = repo.create_fixture("Reds", "Blues", kickoff()).await.unwrap();
        let b = repo
            .create_fixture("Greens", "Golds", kickoff() + chrono::Duration::hours(2))
            .await
            .unwrap();
        let c = repo
            .create_fixture("Pinks", "Greys", kickoff() + chrono::Duration::hours(4))
            .await
            .unwrap();
        repo.settle_fixture(c.id, "0-0".parse().unwrap(), PointsTable::default())
            .await
            .unwrap();
        let engine = engine(repo);

        engine.submit(ChatId(1), a.id, "1-0", midweek()).await.unwrap();

        let open = engine.open_fixtures(ChatId(1), midweek()).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, b.id);
    }

    #[tokio::test]
    async fn open_fixtures_is_empty_after_cutoff() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        repo.create_fixture("Reds", "Blues", kickoff()).await.unwrap();
        let engine = engine(repo);

        let late = Utc.with_ymd_and_hms(2026, 8, 21, 21, 0, 0).unwrap();
        assert!(engine.open_fixtures(ChatId(1), late).await.unwrap().is_empty());
        assert!(engine.policy().is_past(late));
    }
}
