use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use super::types::{ApiResponse, GetUpdates, Message, OutgoingMessage, ReplyKeyboardMarkup, Update};
use crate::constants::{HTTP_TIMEOUT_SLACK_SECS, POLL_TIMEOUT_SECS, TELEGRAM_API_BASE};

pub type TgResult<T> = core::result::Result<T, TgErr>;

#[derive(Debug, Error)]
pub enum TgErr {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("bot api refused the call: {0}")]
    Api(String),

    #[error("bot api refused the call (body: {body})")]
    ApiWithBody { body: Value },
}

/// Typed Bot API client. `base` embeds the bot token, so this type carries
/// no `Debug` impl and the URL never reaches a log line.
pub struct BotApi {
    client: reqwest::Client,
    base: String,
}

impl BotApi {
    pub fn new(token: &str) -> TgResult<Self> {
        // The request timeout has to outlive a held-open long poll.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + HTTP_TIMEOUT_SLACK_SECS))
            .build()?;

        Ok(Self {
            client,
            base: format!("{TELEGRAM_API_BASE}/bot{token}"),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_updates(&self, offset: i64) -> TgResult<Vec<Update>> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: POLL_TIMEOUT_SECS,
                allowed_updates: &["message"],
            },
        )
        .await
    }

    #[instrument(skip(self, chat_id, text, keyboard), fields(chat = chat_id))]
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<ReplyKeyboardMarkup>,
    ) -> TgResult<Message> {
        self.call(
            "sendMessage",
            &OutgoingMessage {
                chat_id,
                text: text.to_string(),
                reply_markup: keyboard,
            },
        )
        .await
    }

    async fn call<P, T>(&self, method: &str, payload: &P) -> TgResult<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let res = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(payload)
            .send()
            .await?;

        if res.status() != 200 {
            tracing::error!(code = %res.status(), method, "non-200 response from bot api");
            let status = res.status();
            return match res.json::<Value>().await {
                Ok(body) => match body.get("description").and_then(Value::as_str) {
                    Some(description) => Err(TgErr::Api(description.to_string())),
                    None => Err(TgErr::ApiWithBody { body }),
                },
                Err(_) => Err(TgErr::Api(status.to_string())),
            };
        }

        let envelope = res.json::<ApiResponse<T>>().await?;
        if envelope.ok
            && let Some(result) = envelope.result
        {
            return Ok(result);
        }

        let detail = envelope
            .description
            .unwrap_or_else(|| "no detail given".to_string());
        tracing::error!(code = ?envelope.error_code, method, detail = %detail, "bot api call failed");
        Err(TgErr::Api(detail))
    }
}
