use std::time::Duration;

use chrono::{DateTime, Utc};
use leaky_bucket::RateLimiter;
use tinyrand::{Rand, RandRange, Seeded, StdRand};
use tinyrand_std::ClockSeed;
use tracing::Instrument;
use uuid::Uuid;

use super::api::BotApi;
use super::types::{Message, ReplyKeyboardMarkup, TgUser};
use crate::chat::prelude::*;
use crate::constants::{BACKOFF_BASE_MS, BACKOFF_JITTER_MS, BACKOFF_MAX_MS, SEND_RATE_PER_SEC};
use crate::db::prelude::*;

/// Long-poll driver. Pulls updates off the Bot API, routes each text
/// message through the dispatcher, and sends the reply back out through a
/// rate limiter so a busy week of reminders cannot trip Telegram's flood
/// control.
pub struct Poller<R> {
    api: BotApi,
    dispatcher: Dispatcher<R>,
    limiter: RateLimiter,
}

impl<R: Repository + 'static> Poller<R> {
    pub fn new(api: BotApi, dispatcher: Dispatcher<R>) -> Self {
        let limiter = RateLimiter::builder()
            .initial(SEND_RATE_PER_SEC)
            .refill(SEND_RATE_PER_SEC)
            .max(SEND_RATE_PER_SEC)
            .interval(Duration::from_secs(1))
            .build();

        Self {
            api,
            dispatcher,
            limiter,
        }
    }

    /// Spawns the poll loop and hands back its handle. The loop runs until
    /// the process exits; transport failures are retried in place.
    pub fn run(self) -> Vec<tokio::task::JoinHandle<()>> {
        let instance = Uuid::new_v4();
        let span = tracing::info_span!("poller", %instance);

        let handle = tokio::spawn(
            async move {
                tracing::info!("long poll loop starting");
                self.poll_loop().await;
            }
            .instrument(span),
        );

        vec![handle]
    }

    async fn poll_loop(&self) {
        let mut offset = 0i64;
        let mut failures = 0u32;

        loop {
            let updates = match self.api.get_updates(offset).await {
                Ok(updates) => {
                    failures = 0;
                    updates
                }
                Err(e) => {
                    failures += 1;
                    let wait = poll_backoff(failures);
                    tracing::error!(
                        error = ?e,
                        failures,
                        wait_ms = wait.as_millis() as u64,
                        "getUpdates failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            for update in updates {
                // Acknowledge the update even when we end up skipping it,
                // otherwise the API hands it to us again forever.
                offset = offset.max(update.update_id + 1);

                let Some(message) = update.message else {
                    continue;
                };
                self.handle_message(message).await;
            }
        }
    }

    async fn handle_message(&self, message: Message) {
        let Some(inbound) = to_inbound(message) else {
            return;
        };

        let chat = inbound.chat_id.0;
        let reply = self.dispatcher.handle(inbound).await;
        self.deliver(chat, reply).await;
    }

    async fn deliver(&self, chat_id: i64, reply: Reply) {
        self.limiter.acquire_one().await;

        let keyboard = reply.buttons.map(ReplyKeyboardMarkup::from_rows);
        if let Err(e) = self.api.send_message(chat_id, &reply.text, keyboard).await {
            tracing::error!(error = ?e, chat = chat_id, "sendMessage failed, reply dropped");
        }
    }
}

/// Stickers, photos and other text-less payloads have no place in the game.
fn to_inbound(message: Message) -> Option<Inbound> {
    let text = message.text?;
    let display_name = message
        .from
        .as_ref()
        .map(TgUser::display_name)
        .unwrap_or_else(|| "there".to_string());
    let at = DateTime::from_timestamp(message.date, 0).unwrap_or_else(Utc::now);

    Some(Inbound {
        chat_id: ChatId(message.chat.id),
        display_name,
        text,
        at,
    })
}

fn poll_backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(6);
    let base = BACKOFF_BASE_MS
        .saturating_mul(1u64 << shift)
        .min(BACKOFF_MAX_MS);

    let seed = ClockSeed::default().next_u64();
    let mut rng = StdRand::seed(seed);
    let jitter = rng.next_range(0..BACKOFF_JITTER_MS);

    Duration::from_millis(base + jitter)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::telegram::types::Chat;

    #[test]
    fn inbound_mapping_keeps_text_and_timestamp() {
        let message = Message {
            message_id: 1,
            from: Some(TgUser {
                id: 5,
                first_name: "Alice".to_string(),
                last_name: None,
                username: None,
            }),
            chat: Chat { id: 5 },
            date: 1_766_000_000,
            text: Some("2-1".to_string()),
        };

        let inbound = to_inbound(message).unwrap();
        assert_eq!(inbound.chat_id, ChatId(5));
        assert_eq!(inbound.display_name, "Alice");
        assert_eq!(inbound.text, "2-1");
        assert_eq!(
            inbound.at,
            DateTime::from_timestamp(1_766_000_000, 0).unwrap()
        );
    }

    #[test]
    fn text_less_messages_are_dropped() {
        let message = Message {
            message_id: 2,
            from: None,
            chat: Chat { id: 5 },
            date: 0,
            text: None,
        };

        assert!(to_inbound(message).is_none());
    }

    #[test]
    fn backoff_grows_then_caps() {
        let first = poll_backoff(1).as_millis() as u64;
        assert!(first >= BACKOFF_BASE_MS);
        assert!(first < BACKOFF_BASE_MS + BACKOFF_JITTER_MS);

        let capped = poll_backoff(20).as_millis() as u64;
        assert!(capped >= BACKOFF_MAX_MS);
        assert!(capped < BACKOFF_MAX_MS + BACKOFF_JITTER_MS);
    }
}
