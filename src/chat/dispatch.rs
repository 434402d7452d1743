use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::NaiveDateTime;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::chat::commands::{Command, keyboard};
use crate::chat::session::Session;
use crate::chat::{Inbound, Reply};
use crate::constants::{KICKOFF_FORMAT, MAX_NAME_CHARS};
use crate::db::models::fixture::{Fixture, FixtureId};
use crate::db::models::punter::{ChatId, Punter, Registration};
use crate::db::repository::Repository;
use crate::engine::leaderboard::LeaderboardView;
use crate::engine::predict::PredictionEngine;
use crate::engine::scoring::ScoringEngine;
use crate::engine::{EngineError, EngineResult};

/// Routes tagged commands to the engines and keeps per-chat conversation
/// state. This is the only place that knows both the button labels and the
/// engine surface; the transport below it just ferries text.
pub struct Dispatcher<R> {
    repo: Arc<R>,
    predict: PredictionEngine<R>,
    scoring: ScoringEngine<R>,
    board: LeaderboardView<R>,
    sessions: Mutex<HashMap<ChatId, Session>>,
    admin_chat_id: ChatId,
}

impl<R: Repository> Dispatcher<R> {
    pub fn new(
        repo: Arc<R>,
        predict: PredictionEngine<R>,
        scoring: ScoringEngine<R>,
        board: LeaderboardView<R>,
        admin_chat_id: ChatId,
    ) -> Self {
        Self {
            repo,
            predict,
            scoring,
            board,
            sessions: Mutex::new(HashMap::new()),
            admin_chat_id,
        }
    }

    #[instrument(skip(self, inbound), fields(chat = inbound.chat_id.0))]
    pub async fn handle(&self, inbound: Inbound) -> Reply {
        let command = Command::parse(&inbound.text);
        let is_admin = self.is_admin(inbound.chat_id);

        // Button presses abandon any in-flight dialogue, so nobody gets
        // stuck mid-conversation.
        if !command.is_text() {
            self.clear_session(inbound.chat_id).await;
        }

        let result = match command {
            Command::Start => self.on_start(&inbound, is_admin).await,
            Command::Profile => self.on_profile(&inbound).await,
            Command::Predict => self.on_predict(&inbound).await,
            Command::MyPredictions => self.on_my_predictions(&inbound).await,
            Command::Leaderboard => self.on_leaderboard().await,
            Command::NewFixture => self.on_new_fixture(&inbound, is_admin).await,
            Command::EnterResult => self.on_enter_result(&inbound, is_admin).await,
            Command::Text(text) => self.on_text(&inbound, &text).await,
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = ?e, "dispatch failed");
                } else {
                    tracing::debug!(error = ?e, "request refused");
                }
                Reply::text(user_message(&e))
            }
        }
    }

    fn is_admin(&self, chat_id: ChatId) -> bool {
        chat_id == self.admin_chat_id
    }

    async fn take_session(&self, chat_id: ChatId) -> Session {
        self.sessions.lock().await.remove(&chat_id).unwrap_or_default()
    }

    async fn set_session(&self, chat_id: ChatId, session: Session) {
        self.sessions.lock().await.insert(chat_id, session);
    }

    async fn clear_session(&self, chat_id: ChatId) {
        self.sessions.lock().await.remove(&chat_id);
    }

    async fn require_punter(&self, chat_id: ChatId) -> EngineResult<Punter> {
        self.repo
            .punter_by_chat_id(chat_id)
            .await?
            .ok_or(EngineError::UnknownUser)
    }

    async fn on_start(&self, inbound: &Inbound, is_admin: bool) -> EngineResult<Reply> {
        match self.repo.punter_by_chat_id(inbound.chat_id).await? {
            Some(punter) => Ok(Reply::with_keyboard(
                format!("Welcome back, {}!", punter.name),
                keyboard(is_admin),
            )),
            None => {
                self.set_session(inbound.chat_id, Session::AwaitingName).await;
                Ok(Reply::text(format!(
                    "Hi {}! What should I call you?",
                    inbound.display_name
                )))
            }
        }
    }

    async fn on_profile(&self, inbound: &Inbound) -> EngineResult<Reply> {
        let punter = self.require_punter(inbound.chat_id).await?;

        Ok(Reply::text(format!(
            "👤 Name: {}\n🏆 Points: {}",
            punter.name, punter.points
        )))
    }

    async fn on_predict(&self, inbound: &Inbound) -> EngineResult<Reply> {
        self.require_punter(inbound.chat_id).await?;

        let open = self
            .predict
            .open_fixtures(inbound.chat_id, inbound.at)
            .await?;

        let Some(first) = open.first() else {
            if self.predict.policy().is_past(inbound.at) {
                return Ok(Reply::text("⏳ Predictions are closed for this week."));
            }
            return Ok(Reply::text("Nothing left to predict right now."));
        };

        let prompt = prediction_prompt(first);
        self.set_session(
            inbound.chat_id,
            Session::Predicting { queue: open.into() },
        )
        .await;

        Ok(Reply::text(prompt))
    }

    async fn on_my_predictions(&self, inbound: &Inbound) -> EngineResult<Reply> {
        self.require_punter(inbound.chat_id).await?;

        let views = self.repo.predictions_for(inbound.chat_id).await?;
        if views.is_empty() {
            return Ok(Reply::text("No predictions yet."));
        }

        let table = self.scoring.table();
        let lines: Vec<String> = views
            .iter()
            .map(|v| match v.final_score {
                Some(actual) => format!(
                    "{} vs {}: predicted {}, final {}, +{} pts",
                    v.home,
                    v.away,
                    v.predicted,
                    actual,
                    table.award(v.predicted, actual)
                ),
                None => format!("{} vs {}: predicted {}", v.home, v.away, v.predicted),
            })
            .collect();

        Ok(Reply::text(format!("Your predictions:\n{}", lines.join("\n"))))
    }

    async fn on_leaderboard(&self) -> EngineResult<Reply> {
        let standings = self.board.top(None).await?;
        if standings.is_empty() {
            return Ok(Reply::text("No players on the board yet."));
        }

        let lines: Vec<String> = standings
            .iter()
            .map(|s| format!("{}. {} - {} pts", s.rank, s.name, s.points))
            .collect();

        Ok(Reply::text(format!("🏆 Leaderboard:\n\n{}", lines.join("\n"))))
    }

    async fn on_new_fixture(&self, inbound: &Inbound, is_admin: bool) -> EngineResult<Reply> {
        if !is_admin {
            return Err(EngineError::Forbidden);
        }

        self.set_session(inbound.chat_id, Session::AwaitingFixture)
            .await;

        Ok(Reply::text(
            "Send the fixture as: Home - Away @ 2026-08-29 15:00 (UTC).\n\
             Without the @ part the kickoff is set to now.",
        ))
    }

    async fn on_enter_result(&self, inbound: &Inbound, is_admin: bool) -> EngineResult<Reply> {
        if !is_admin {
            return Err(EngineError::Forbidden);
        }

        let unscored = self.repo.unscored_fixtures().await?;
        if unscored.is_empty() {
            return Ok(Reply::with_keyboard(
                "No fixtures are waiting for a result.",
                keyboard(true),
            ));
        }

        let lines: Vec<String> = unscored
            .iter()
            .map(|f| {
                format!(
                    "{}: {} ({} UTC)",
                    f.id,
                    f.label(),
                    f.kicks_off_at.format(KICKOFF_FORMAT)
                )
            })
            .collect();
        self.set_session(inbound.chat_id, Session::AwaitingResult)
            .await;

        Ok(Reply::text(format!(
            "Send the result as: <fixture id> <score>\n\n{}",
            lines.join("\n")
        )))
    }

    async fn on_text(&self, inbound: &Inbound, text: &str) -> EngineResult<Reply> {
        match self.take_session(inbound.chat_id).await {
            Session::Idle => {
                if self.repo.punter_by_chat_id(inbound.chat_id).await?.is_none() {
                    return Ok(Reply::text("Send /start to join the game."));
                }
                Ok(Reply::with_keyboard(
                    "Pick an option from the keyboard.",
                    keyboard(self.is_admin(inbound.chat_id)),
                ))
            }
            Session::AwaitingName => self.register_name(inbound, text).await,
            Session::Predicting { queue } => self.step_prediction(inbound, queue, text).await,
            Session::AwaitingFixture => self.create_fixture_from(inbound, text).await,
            Session::AwaitingResult => self.settle_from(inbound, text).await,
        }
    }

    async fn register_name(&self, inbound: &Inbound, name: &str) -> EngineResult<Reply> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
            self.set_session(inbound.chat_id, Session::AwaitingName).await;
            return Ok(Reply::text("A short name, please. What should I call you?"));
        }

        let is_admin = self.is_admin(inbound.chat_id);
        match self.repo.ensure_punter(inbound.chat_id, name).await? {
            Registration::Created(p) => Ok(Reply::with_keyboard(
                format!("Name saved. Welcome, {}!", p.name),
                keyboard(is_admin),
            )),
            Registration::Existing(p) => Ok(Reply::with_keyboard(
                format!("You're already in as {}.", p.name),
                keyboard(is_admin),
            )),
        }
    }

    async fn step_prediction(
        &self,
        inbound: &Inbound,
        mut queue: VecDeque<Fixture>,
        text: &str,
    ) -> EngineResult<Reply> {
        let is_admin = self.is_admin(inbound.chat_id);
        let Some(current) = queue.pop_front() else {
            return Ok(Reply::with_keyboard(
                "All predictions are in. Good luck!",
                keyboard(is_admin),
            ));
        };

        let ack = match self
            .predict
            .submit(inbound.chat_id, current.id, text, inbound.at)
            .await
        {
            Ok(_) => format!("Saved {} for {}.", text.trim(), current.label()),
            Err(e @ EngineError::Validation(_)) => {
                // same fixture again
                let prompt = prediction_prompt(&current);
                queue.push_front(current);
                self.set_session(inbound.chat_id, Session::Predicting { queue })
                    .await;
                return Ok(Reply::text(format!("{}\n\n{prompt}", user_message(&e))));
            }
            Err(e @ EngineError::DeadlineExceeded(_)) => {
                // window closed mid-dialogue; the queue is dropped with it
                return Ok(Reply::with_keyboard(user_message(&e), keyboard(is_admin)));
            }
            Err(e) if e.is_retryable() => {
                queue.push_front(current);
                self.set_session(inbound.chat_id, Session::Predicting { queue })
                    .await;
                return Err(e);
            }
            // fixture settled or vanished mid-dialogue; note it and move on
            Err(e) => format!("{} Skipping {}.", user_message(&e), current.label()),
        };

        match queue.front() {
            Some(next) => {
                let reply = format!("{ack}\n\n{}", prediction_prompt(next));
                self.set_session(inbound.chat_id, Session::Predicting { queue })
                    .await;
                Ok(Reply::text(reply))
            }
            None => Ok(Reply::with_keyboard(
                format!("{ack}\nAll predictions are in. Good luck!"),
                keyboard(is_admin),
            )),
        }
    }

    async fn create_fixture_from(&self, inbound: &Inbound, text: &str) -> EngineResult<Reply> {
        let is_admin = self.is_admin(inbound.chat_id);

        let Some((home, away, kickoff)) = parse_fixture_input(text, inbound.at) else {
            self.set_session(inbound.chat_id, Session::AwaitingFixture)
                .await;
            return Ok(Reply::text(
                "Couldn't read that. Send it like: Reds - Blues @ 2026-08-29 15:00",
            ));
        };

        match self
            .scoring
            .create_fixture(&home, &away, kickoff, is_admin)
            .await
        {
            Ok(f) => Ok(Reply::with_keyboard(
                format!(
                    "Fixture saved: {} (kickoff {} UTC).",
                    f.label(),
                    f.kicks_off_at.format(KICKOFF_FORMAT)
                ),
                keyboard(is_admin),
            )),
            Err(e @ EngineError::Validation(_)) => {
                self.set_session(inbound.chat_id, Session::AwaitingFixture)
                    .await;
                Ok(Reply::text(format!("{} Try again.", user_message(&e))))
            }
            Err(e) if e.is_retryable() => {
                self.set_session(inbound.chat_id, Session::AwaitingFixture)
                    .await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn settle_from(&self, inbound: &Inbound, text: &str) -> EngineResult<Reply> {
        let is_admin = self.is_admin(inbound.chat_id);

        let mut parts = text.split_whitespace();
        let (Some(id_raw), Some(score_raw), None) = (parts.next(), parts.next(), parts.next())
        else {
            self.set_session(inbound.chat_id, Session::AwaitingResult)
                .await;
            return Ok(Reply::text(
                "Two pieces, please: <fixture id> <score>, like 12 2-1.",
            ));
        };

        let Ok(fixture_id) = id_raw.parse::<FixtureId>() else {
            self.set_session(inbound.chat_id, Session::AwaitingResult)
                .await;
            return Ok(Reply::text(format!("{id_raw:?} is not a fixture id.")));
        };

        match self.scoring.enter_result(fixture_id, score_raw, is_admin).await {
            Ok(report) => {
                let mut lines = vec![format!(
                    "Result {} saved for fixture {}.",
                    report.final_score, report.fixture_id
                )];
                if report.awarded.is_empty() {
                    lines.push("No predictions to score.".to_string());
                } else {
                    lines.push(format!(
                        "{} scored, {} earned points:",
                        report.scored(),
                        report.earners()
                    ));
                    for a in &report.awarded {
                        lines.push(format!("{} ({}): +{}", a.name, a.predicted, a.points));
                    }
                }
                Ok(Reply::with_keyboard(lines.join("\n"), keyboard(is_admin)))
            }
            Err(e @ (EngineError::Validation(_) | EngineError::UnknownFixture)) => {
                self.set_session(inbound.chat_id, Session::AwaitingResult)
                    .await;
                Ok(Reply::text(format!("{} Try again.", user_message(&e))))
            }
            Err(e) if e.is_retryable() => {
                self.set_session(inbound.chat_id, Session::AwaitingResult)
                    .await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

fn prediction_prompt(fixture: &Fixture) -> String {
    format!(
        "{} ({} UTC)\nSend the score like 2-1:",
        fixture.label(),
        fixture.kicks_off_at.format(KICKOFF_FORMAT)
    )
}

/// `Home - Away @ 2026-08-29 15:00`, the `@ ...` part optional. Team names
/// keep their inner hyphens; only a spaced `" - "` splits them.
fn parse_fixture_input(
    text: &str,
    default_kickoff: DateTime<Utc>,
) -> Option<(String, String, DateTime<Utc>)> {
    let (teams, kickoff) = match text.split_once('@') {
        Some((teams, when)) => {
            let naive = NaiveDateTime::parse_from_str(when.trim(), KICKOFF_FORMAT).ok()?;
            (teams, naive.and_utc())
        }
        None => (text, default_kickoff),
    };

    let (home, away) = teams.split_once(" - ")?;
    let (home, away) = (home.trim(), away.trim());
    if home.is_empty() || away.is_empty() {
        return None;
    }

    Some((home.to_string(), away.to_string(), kickoff))
}

fn user_message(err: &EngineError) -> String {
    match err {
        EngineError::Validation(crate::engine::ValidationErr::BlankTeam) => {
            "Both team names are needed.".to_string()
        }
        EngineError::Validation(_) => "That doesn't look like a score. Send it like 2-1.".to_string(),
        EngineError::DeadlineExceeded(_) => "⏳ Predictions are closed for this week.".to_string(),
        EngineError::AlreadyPredicted => "You already predicted this one.".to_string(),
        EngineError::UnknownFixture => "That fixture isn't open for predictions.".to_string(),
        EngineError::UnknownUser => "You are not registered! Send /start to join.".to_string(),
        EngineError::ResultAlreadyEntered => "A result is already in for that fixture.".to_string(),
        EngineError::Forbidden => "That's for the admin only.".to_string(),
        EngineError::Storage(_) => "Something went wrong on our side. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;
    use crate::chat::commands;
    use crate::db::memory::MemoryRepository;
    use crate::db::models::score::PointsTable;
    use crate::engine::deadline::DeadlinePolicy;
    use chrono::{NaiveTime, Weekday};

    const ADMIN: i64 = 99;

    fn dispatcher(repo: Arc<MemoryRepository>) -> Dispatcher<MemoryRepository> {
        let policy = DeadlinePolicy::new(Weekday::Fri, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        Dispatcher::new(
            Arc::clone(&repo),
            PredictionEngine::new(Arc::clone(&repo), policy),
            ScoringEngine::new(Arc::clone(&repo), PointsTable::default()),
            LeaderboardView::new(repo, 10),
            ChatId(ADMIN),
        )
    }

    // a Wednesday, inside the window
    fn midweek() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 19, 10, 0, 0).unwrap()
    }

    fn msg(chat: i64, text: &str) -> Inbound {
        Inbound {
            chat_id: ChatId(chat),
            display_name: "tester".to_string(),
            text: text.to_string(),
            at: midweek(),
        }
    }

    #[tokio::test]
    async fn registration_dialogue() {
        let repo = Arc::new(MemoryRepository::new());
        let bot = dispatcher(Arc::clone(&repo));

        let reply = bot.handle(msg(1, "/start")).await;
        assert!(reply.text.contains("What should I call you?"));
        assert!(reply.buttons.is_none());

        let reply = bot.handle(msg(1, "Alice")).await;
        assert!(reply.text.contains("Welcome, Alice"));
        assert!(reply.buttons.is_some());

        let punter = repo.punter_by_chat_id(ChatId(1)).await.unwrap().unwrap();
        assert_eq!(punter.name, "Alice");

        let reply = bot.handle(msg(1, "/start")).await;
        assert!(reply.text.contains("Welcome back, Alice"));
    }

    #[tokio::test]
    async fn profile_requires_registration() {
        let repo = Arc::new(MemoryRepository::new());
        let bot = dispatcher(repo);

        let reply = bot.handle(msg(1, commands::BTN_PROFILE)).await;
        assert!(reply.text.contains("not registered"));
    }

    #[tokio::test]
    async fn button_press_abandons_a_dialogue() {
        let repo = Arc::new(MemoryRepository::new());
        let bot = dispatcher(Arc::clone(&repo));

        bot.handle(msg(1, "/start")).await;
        // pressing a button instead of answering the name question
        let reply = bot.handle(msg(1, commands::BTN_LEADERBOARD)).await;
        assert!(reply.text.contains("No players"));

        // the following text is no longer treated as a name
        let reply = bot.handle(msg(1, "Bob")).await;
        assert!(reply.text.contains("/start"));
        assert!(repo.punter_by_chat_id(ChatId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prediction_stepping_walks_the_queue() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        repo.create_fixture("Reds", "Blues", midweek()).await.unwrap();
        repo.create_fixture("Greens", "Golds", midweek()).await.unwrap();
        let bot = dispatcher(Arc::clone(&repo));

        let reply = bot.handle(msg(1, commands::BTN_PREDICT)).await;
        assert!(reply.text.contains("Reds vs Blues"));

        // a typo re-asks the same fixture
        let reply = bot.handle(msg(1, "2:1")).await;
        assert!(reply.text.contains("like 2-1"));
        assert!(reply.text.contains("Reds vs Blues"));

        let reply = bot.handle(msg(1, "2-1")).await;
        assert!(reply.text.contains("Saved 2-1 for Reds vs Blues"));
        assert!(reply.text.contains("Greens vs Golds"));

        let reply = bot.handle(msg(1, "0-0")).await;
        assert!(reply.text.contains("All predictions are in"));
        assert!(reply.buttons.is_some());

        let views = repo.predictions_for(ChatId(1)).await.unwrap();
        assert_eq!(views.len(), 2);
    }

    #[tokio::test]
    async fn predict_when_nothing_open_and_when_closed() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        let bot = dispatcher(Arc::clone(&repo));

        let reply = bot.handle(msg(1, commands::BTN_PREDICT)).await;
        assert!(reply.text.contains("Nothing left to predict"));

        let mut closed = msg(1, commands::BTN_PREDICT);
        closed.at = Utc.with_ymd_and_hms(2026, 8, 21, 21, 0, 0).unwrap();
        let reply = bot.handle(closed).await;
        assert!(reply.text.contains("closed"));
    }

    #[tokio::test]
    async fn admin_enters_fixture_and_result() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        let bot = dispatcher(Arc::clone(&repo));

        let reply = bot.handle(msg(ADMIN, commands::BTN_NEW_FIXTURE)).await;
        assert!(reply.text.contains("Home - Away"));

        let reply = bot.handle(msg(ADMIN, "Reds - Blues @ 2026-08-22 15:00")).await;
        assert!(reply.text.contains("Fixture saved: Reds vs Blues"));

        // alice predicts the exact score
        bot.handle(msg(1, commands::BTN_PREDICT)).await;
        bot.handle(msg(1, "2-1")).await;

        let reply = bot.handle(msg(ADMIN, commands::BTN_ENTER_RESULT)).await;
        assert!(reply.text.contains("1: Reds vs Blues"));

        let reply = bot.handle(msg(ADMIN, "1 2-1")).await;
        assert!(reply.text.contains("Result 2-1 saved"));
        assert!(reply.text.contains("alice (2-1): +3"));

        let alice = repo.punter_by_chat_id(ChatId(1)).await.unwrap().unwrap();
        assert_eq!(alice.points, 3);
    }

    #[tokio::test]
    async fn non_admin_is_turned_away_from_admin_buttons() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        let bot = dispatcher(repo);

        let reply = bot.handle(msg(1, commands::BTN_NEW_FIXTURE)).await;
        assert!(reply.text.contains("admin only"));

        let reply = bot.handle(msg(1, commands::BTN_ENTER_RESULT)).await;
        assert!(reply.text.contains("admin only"));
    }

    #[tokio::test]
    async fn result_entry_reasks_on_garbage_and_refuses_repeats() {
        let repo = Arc::new(MemoryRepository::new());
        repo.create_fixture("Reds", "Blues", midweek()).await.unwrap();
        repo.create_fixture("Greens", "Golds", midweek()).await.unwrap();
        let bot = dispatcher(Arc::clone(&repo));

        bot.handle(msg(ADMIN, commands::BTN_ENTER_RESULT)).await;
        let reply = bot.handle(msg(ADMIN, "first 2-1")).await;
        assert!(reply.text.contains("not a fixture id"));

        // session survives the re-ask
        let reply = bot.handle(msg(ADMIN, "1 2-1")).await;
        assert!(reply.text.contains("Result 2-1 saved"));

        // entering fixture 1 again is refused for good
        bot.handle(msg(ADMIN, commands::BTN_ENTER_RESULT)).await;
        let reply = bot.handle(msg(ADMIN, "1 0-0")).await;
        assert!(reply.text.contains("already in"));
    }

    #[tokio::test]
    async fn storage_fault_reads_as_try_again() {
        let repo = Arc::new(MemoryRepository::new());
        repo.ensure_punter(ChatId(1), "alice").await.unwrap();
        let bot = dispatcher(Arc::clone(&repo));

        repo.fail_next();
        let reply = bot.handle(msg(1, commands::BTN_PROFILE)).await;
        assert!(reply.text.contains("try again"));
    }
}
