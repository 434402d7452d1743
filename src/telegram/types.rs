use serde::{Deserialize, Serialize};

/// One element of a `getUpdates` response. Only message updates are
/// requested; everything else deserializes with `message: None` and is
/// skipped upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: Chat,
    /// Unix seconds, as sent by the Bot API.
    pub date: i64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl TgUser {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Bot API envelope: `ok` plus either `result` or `description`.
/// Absent keys decode as `None` on their own; the plain `Option` fields keep
/// the derive free of a `Default` bound on `T`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

impl ReplyKeyboardMarkup {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            keyboard: rows
                .into_iter()
                .map(|row| row.into_iter().map(|text| KeyboardButton { text }).collect())
                .collect(),
            resize_keyboard: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

/// `sendMessage` payload.
#[derive(Debug, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyKeyboardMarkup>,
}

/// `getUpdates` payload.
#[derive(Debug, Serialize)]
pub struct GetUpdates {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn update_round_trip_from_api_json() {
        let raw = r#"
        {
            "ok": true,
            "result": [
                {
                    "update_id": 7,
                    "message": {
                        "message_id": 41,
                        "from": { "id": 5, "first_name": "Alice", "last_name": "B" },
                        "chat": { "id": 5 },
                        "date": 1766000000,
                        "text": "2-1"
                    }
                },
                { "update_id": 8 }
            ]
        }
        "#;

        let envelope: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(envelope.ok);
        let updates = envelope.result.unwrap();
        assert_eq!(updates.len(), 2);

        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 5);
        assert_eq!(message.text.as_deref(), Some("2-1"));
        assert_eq!(message.from.as_ref().unwrap().display_name(), "Alice B");

        assert!(updates[1].message.is_none());
    }

    #[test]
    fn error_envelope_carries_description() {
        let raw = r#"{ "ok": false, "error_code": 401, "description": "Unauthorized" }"#;
        let envelope: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();

        assert!(!envelope.ok);
        assert!(envelope.result.is_none());
        assert_eq!(envelope.error_code, Some(401));
        assert_eq!(envelope.description.as_deref(), Some("Unauthorized"));
    }

    // `Message` implements no `Default`; the envelope has to decode for such
    // payloads all the same.
    #[test]
    fn send_message_envelope_decodes() {
        let raw = r#"
        {
            "ok": true,
            "result": {
                "message_id": 42,
                "chat": { "id": 5 },
                "date": 1766000000,
                "text": "Saved."
            }
        }
        "#;

        let envelope: ApiResponse<Message> = serde_json::from_str(raw).unwrap();
        assert!(envelope.ok);

        let message = envelope.result.unwrap();
        assert_eq!(message.message_id, 42);
        assert_eq!(message.text.as_deref(), Some("Saved."));
        assert!(message.from.is_none());
    }

    #[test]
    fn keyboard_serializes_in_bot_api_shape() {
        let markup = ReplyKeyboardMarkup::from_rows(vec![
            vec!["My profile".to_string()],
            vec!["Leaderboard".to_string()],
        ]);
        let json = serde_json::to_value(&markup).unwrap();

        assert_eq!(json["resize_keyboard"], true);
        assert_eq!(json["keyboard"][0][0]["text"], "My profile");
        assert_eq!(json["keyboard"][1][0]["text"], "Leaderboard");
    }

    #[test]
    fn send_payload_omits_missing_keyboard() {
        let payload = OutgoingMessage {
            chat_id: 5,
            text: "hi".to_string(),
            reply_markup: None,
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert!(json.get("reply_markup").is_none());
    }
}
