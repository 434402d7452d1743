use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;

use totobot::chat::prelude::*;
use totobot::db::{Db, PgErr, schema};
use totobot::db::prelude::*;
use totobot::engine::prelude::*;
use totobot::telegram::prelude::*;
use totobot::util::env::{Config, EnvErr};
use totobot::util::telemetry::Telemetry;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Pg(#[from] PgErr),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Tg(#[from] TgErr),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let telemetry = Telemetry::init(&config)?;

    tracing::info!("starting totobot");

    let db = Db::connect(&config.database_url).await?;
    schema::migrate(db.pool()).await?;

    let repo = Arc::new(PgRepository::new(db.pool().clone()));

    let policy = DeadlinePolicy::new(config.cutoff_weekday, config.cutoff_time);
    let table = PointsTable {
        exact: config.points_exact,
        outcome: config.points_outcome,
    };

    let predict = PredictionEngine::new(Arc::clone(&repo), policy);
    let scoring = ScoringEngine::new(Arc::clone(&repo), table);
    let board = LeaderboardView::new(Arc::clone(&repo), config.leaderboard_size);

    let dispatcher = Dispatcher::new(
        repo,
        predict,
        scoring,
        board,
        ChatId(config.admin_chat_id),
    );

    let api = BotApi::new(&config.bot_token)?;
    let handles = Poller::new(api, dispatcher).run();

    _ = join_all(handles).await;

    telemetry.shutdown();
    Ok(())
}
