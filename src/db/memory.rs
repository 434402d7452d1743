use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::models::fixture::{Fixture, FixtureId};
use crate::db::models::leaderboard::Standing;
use crate::db::models::prediction::{Prediction, PredictionId, PredictionView};
use crate::db::models::punter::{ChatId, Punter, PunterId, Registration};
use crate::db::models::score::{PointsTable, Score};
use crate::db::repository::{
    Awarded, PredictionInsert, RepoError, RepoResult, Repository, SettleReport, Settlement,
};

#[derive(Debug, Clone, Default)]
struct State {
    punters: Vec<Punter>,
    fixtures: Vec<Fixture>,
    predictions: Vec<Prediction>,
    next_punter: i64,
    next_fixture: i64,
    next_prediction: i64,
}

impl State {
    fn next_punter_id(&mut self) -> PunterId {
        self.next_punter += 1;
        PunterId(self.next_punter)
    }

    fn next_fixture_id(&mut self) -> FixtureId {
        self.next_fixture += 1;
        FixtureId(self.next_fixture)
    }

    fn next_prediction_id(&mut self) -> PredictionId {
        self.next_prediction += 1;
        PredictionId(self.next_prediction)
    }

    fn punter_id_for(&self, chat_id: ChatId) -> Option<PunterId> {
        self.punters.iter().find(|u| u.chat_id == chat_id).map(|u| u.id)
    }
}

/// In-memory store with the same outcome semantics as [`PgRepository`].
/// Settlement works on a draft copy of the whole state and swaps it in only
/// on success, mirroring the rollback behavior of a real transaction.
///
/// [`PgRepository`]: crate::db::postgres::PgRepository
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
    fail_once: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot fault: the next repository call fails with
    /// [`RepoError::Unavailable`] and leaves the stored state untouched.
    pub fn fail_next(&self) {
        self.fail_once.store(true, Ordering::SeqCst);
    }

    fn trip(&self) -> RepoResult<()> {
        if self.fail_once.swap(false, Ordering::SeqCst) {
            return Err(RepoError::Unavailable("injected fault".into()));
        }

        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ensure_punter(&self, chat_id: ChatId, name: &str) -> RepoResult<Registration> {
        self.trip()?;
        let mut state = self.state.lock().await;

        if let Some(existing) = state.punters.iter().find(|u| u.chat_id == chat_id) {
            return Ok(Registration::Existing(existing.clone()));
        }

        let punter = Punter {
            id: state.next_punter_id(),
            chat_id,
            name: name.to_string(),
            points: 0,
            created_at: Utc::now(),
        };
        state.punters.push(punter.clone());

        Ok(Registration::Created(punter))
    }

    async fn punter_by_chat_id(&self, chat_id: ChatId) -> RepoResult<Option<Punter>> {
        self.trip()?;
        let state = self.state.lock().await;

        Ok(state.punters.iter().find(|u| u.chat_id == chat_id).cloned())
    }

    async fn create_fixture(
        &self,
        home: &str,
        away: &str,
        kicks_off_at: DateTime<Utc>,
    ) -> RepoResult<Fixture> {
        self.trip()?;
        let mut state = self.state.lock().await;

        let fixture = Fixture {
            id: state.next_fixture_id(),
            home: home.to_string(),
            away: away.to_string(),
            kicks_off_at,
            final_score: None,
            created_at: Utc::now(),
        };
        state.fixtures.push(fixture.clone());

        Ok(fixture)
    }

    async fn fixture_by_id(&self, id: FixtureId) -> RepoResult<Option<Fixture>> {
        self.trip()?;
        let state = self.state.lock().await;

        Ok(state.fixtures.iter().find(|f| f.id == id).cloned())
    }

    async fn open_fixtures_for(&self, chat_id: ChatId) -> RepoResult<Vec<Fixture>> {
        self.trip()?;
        let state = self.state.lock().await;
        let punter_id = state.punter_id_for(chat_id);

        let mut open: Vec<Fixture> = state
            .fixtures
            .iter()
            .filter(|f| !f.has_result())
            .filter(|f| {
                !punter_id.is_some_and(|pid| {
                    state
                        .predictions
                        .iter()
                        .any(|p| p.punter_id == pid && p.fixture_id == f.id)
                })
            })
            .cloned()
            .collect();
        open.sort_by(|a, b| a.kicks_off_at.cmp(&b.kicks_off_at).then(a.id.0.cmp(&b.id.0)));

        Ok(open)
    }

    async fn unscored_fixtures(&self) -> RepoResult<Vec<Fixture>> {
        self.trip()?;
        let state = self.state.lock().await;

        let mut open: Vec<Fixture> = state
            .fixtures
            .iter()
            .filter(|f| !f.has_result())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.kicks_off_at.cmp(&b.kicks_off_at).then(a.id.0.cmp(&b.id.0)));

        Ok(open)
    }

    async fn insert_prediction(
        &self,
        chat_id: ChatId,
        fixture_id: FixtureId,
        predicted: Score,
    ) -> RepoResult<PredictionInsert> {
        self.trip()?;
        let mut state = self.state.lock().await;

        let Some(fixture) = state.fixtures.iter().find(|f| f.id == fixture_id) else {
            return Ok(PredictionInsert::NoSuchFixture);
        };
        if fixture.has_result() {
            return Ok(PredictionInsert::FixtureSettled);
        }

        let Some(punter_id) = state.punter_id_for(chat_id) else {
            return Ok(PredictionInsert::UnknownPunter);
        };

        if state
            .predictions
            .iter()
            .any(|p| p.punter_id == punter_id && p.fixture_id == fixture_id)
        {
            return Ok(PredictionInsert::Duplicate);
        }

        let id = state.next_prediction_id();
        state.predictions.push(Prediction {
            id,
            punter_id,
            fixture_id,
            predicted,
            created_at: Utc::now(),
        });

        Ok(PredictionInsert::Inserted(id))
    }

    async fn predictions_for(&self, chat_id: ChatId) -> RepoResult<Vec<PredictionView>> {
        self.trip()?;
        let state = self.state.lock().await;

        let Some(punter_id) = state.punter_id_for(chat_id) else {
            return Ok(Vec::new());
        };

        let mut views = Vec::new();
        for pick in state.predictions.iter().filter(|p| p.punter_id == punter_id) {
            let fixture = state
                .fixtures
                .iter()
                .find(|f| f.id == pick.fixture_id)
                .ok_or_else(|| {
                    RepoError::Corrupt(format!(
                        "prediction {} references missing fixture {}",
                        pick.id, pick.fixture_id
                    ))
                })?;

            views.push(PredictionView {
                fixture_id: fixture.id,
                home: fixture.home.clone(),
                away: fixture.away.clone(),
                kicks_off_at: fixture.kicks_off_at,
                predicted: pick.predicted,
                final_score: fixture.final_score,
            });
        }
        views.sort_by(|a, b| {
            a.kicks_off_at
                .cmp(&b.kicks_off_at)
                .then(a.fixture_id.0.cmp(&b.fixture_id.0))
        });

        Ok(views)
    }

    async fn settle_fixture(
        &self,
        fixture_id: FixtureId,
        final_score: Score,
        table: PointsTable,
    ) -> RepoResult<Settlement> {
        let mut state = self.state.lock().await;

        let Some(pos) = state.fixtures.iter().position(|f| f.id == fixture_id) else {
            return Ok(Settlement::NoSuchFixture);
        };
        if state.fixtures[pos].has_result() {
            return Ok(Settlement::AlreadySettled);
        }

        // All mutation happens on the draft; the live state only changes at
        // the swap below.
        let mut draft = state.clone();
        draft.fixtures[pos].final_score = Some(final_score);

        self.trip()?;

        let picks: Vec<Prediction> = draft
            .predictions
            .iter()
            .filter(|p| p.fixture_id == fixture_id)
            .cloned()
            .collect();

        let mut awarded = Vec::with_capacity(picks.len());
        for pick in picks {
            let punter = draft
                .punters
                .iter_mut()
                .find(|u| u.id == pick.punter_id)
                .ok_or_else(|| {
                    RepoError::Corrupt(format!(
                        "prediction {} references missing punter {}",
                        pick.id, pick.punter_id
                    ))
                })?;

            let points = table.award(pick.predicted, final_score);
            if points > 0 {
                punter.points += points;
            }

            awarded.push(Awarded {
                punter_id: punter.id,
                name: punter.name.clone(),
                predicted: pick.predicted,
                points,
            });
        }
        awarded.sort_by_key(|a| a.punter_id.0);

        *state = draft;

        Ok(Settlement::Settled(SettleReport {
            fixture_id,
            final_score,
            awarded,
        }))
    }

    async fn standings(&self, limit: i64) -> RepoResult<Vec<Standing>> {
        self.trip()?;
        let state = self.state.lock().await;

        let mut ranked: Vec<&Punter> = state.punters.iter().collect();
        ranked.sort_by(|a, b| b.points.cmp(&a.points).then(a.id.0.cmp(&b.id.0)));

        Ok(ranked
            .into_iter()
            .take(limit.max(0) as usize)
            .enumerate()
            .map(|(i, u)| Standing {
                rank: i as i64 + 1,
                name: u.name.clone(),
                points: u.points,
            })
            .collect())
    }
}
