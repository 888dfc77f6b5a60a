//! Telegram gateway — sends funnel messages and ingests Bot API updates.
//!
//! Native Rust Bot API implementation. Updates arrive either through
//! long-polling (`spawn_polling`) or through the webhook route in
//! `server.rs`; both feed the same classified-event pipeline.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::channels::{Control, Gateway, OutboundMessage};
use crate::error::ChannelError;
use crate::funnel::event::{EventKind, InboundEvent};

/// Telegram gateway — connects to the Bot API over HTTPS.
pub struct TelegramGateway {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramGateway {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Register the webhook URL with Telegram.
    pub async fn set_webhook(&self, url: &str) -> Result<(), ChannelError> {
        self.call("setWebhook", serde_json::json!({ "url": url }))
            .await
    }

    /// Drop any registered webhook (required before long-polling).
    pub async fn delete_webhook(&self) -> Result<(), ChannelError> {
        self.call("deleteWebhook", serde_json::json!({})).await
    }

    /// Post a Bot API method and fail on a non-success status.
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} failed ({status}): {err}"),
            });
        }
        Ok(())
    }

    /// Spawn the long-polling loop, feeding classified events into `tx`.
    ///
    /// Runs until the receiving side of `tx` is dropped. Poll errors back
    /// off for 5 seconds and retry.
    pub fn spawn_polling(&self, tx: UnboundedSender<InboundEvent>) -> tokio::task::JoinHandle<()> {
        let client = self.client.clone();
        let poll_url = self.api_url("getUpdates");
        let answer_url = self.api_url("answerCallbackQuery");

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram gateway polling for updates...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&poll_url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: UpdatesResponse = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in data.result {
                    // Advance offset past this update regardless of what
                    // classification does with it.
                    offset = offset.max(update.update_id + 1);

                    // Acknowledge callback queries so the client stops
                    // its spinner.
                    if let Some(cb) = &update.callback_query {
                        let ack = client
                            .post(&answer_url)
                            .json(&serde_json::json!({ "callback_query_id": cb.id }))
                            .send()
                            .await;
                        if let Err(e) = ack {
                            tracing::debug!("answerCallbackQuery failed: {e}");
                        }
                    }

                    let Some(event) = classify(&update) else {
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram event pipeline closed");
                        return;
                    }
                }
            }
        })
    }
}

// ── Gateway trait implementation ────────────────────────────────────

#[async_trait]
impl Gateway for TelegramGateway {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Send a message, trying Markdown first with plain-text fallback
    /// when the message requests rich formatting.
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": message.target,
            "text": message.text,
        });
        if let Some(markup) = reply_markup(&message.controls, message.remove_keyboard) {
            body["reply_markup"] = markup;
        }

        if message.markdown {
            let mut markdown_body = body.clone();
            markdown_body["parse_mode"] = serde_json::Value::String("Markdown".to_string());

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&markdown_body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.to_string(),
                })?;

            if resp.status().is_success() {
                return Ok(());
            }
            tracing::warn!(
                status = ?resp.status(),
                "Telegram sendMessage with Markdown failed; retrying without parse_mode"
            );
        }

        self.call("sendMessage", body).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

/// Map controls to a Telegram `reply_markup` object.
///
/// Inline selections become an `inline_keyboard` (one button per row,
/// matching the campaign layout); request-type controls become a one-shot
/// reply keyboard.
fn reply_markup(controls: &[Control], remove_keyboard: bool) -> Option<serde_json::Value> {
    if controls.is_empty() {
        return remove_keyboard.then(|| serde_json::json!({ "remove_keyboard": true }));
    }

    let inline: Vec<serde_json::Value> = controls
        .iter()
        .filter_map(|c| match c {
            Control::Inline { text, tag } => {
                Some(serde_json::json!([{ "text": text, "callback_data": tag }]))
            }
            _ => None,
        })
        .collect();
    if !inline.is_empty() {
        return Some(serde_json::json!({ "inline_keyboard": inline }));
    }

    let keyboard: Vec<serde_json::Value> = controls
        .iter()
        .filter_map(|c| match c {
            Control::ShareContact { text } => {
                Some(serde_json::json!([{ "text": text, "request_contact": true }]))
            }
            Control::OpenWebApp { text, url } => {
                Some(serde_json::json!([{ "text": text, "web_app": { "url": url } }]))
            }
            Control::Inline { .. } => None,
        })
        .collect();
    Some(serde_json::json!({ "keyboard": keyboard, "resize_keyboard": true }))
}

// ── Bot API update subset ───────────────────────────────────────────

/// `getUpdates` response envelope.
#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    result: Vec<Update>,
}

/// One Telegram update. Only the fields the funnel cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub web_app_data: Option<WebAppData>,
    #[serde(default)]
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebAppData {
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

/// Classify one update into at most one funnel event.
///
/// Discriminators on a message, checked in order: start command, web-app
/// payload, shared contact, plain text. Callback queries become
/// selections. Anything else is dropped.
pub fn classify(update: &Update) -> Option<InboundEvent> {
    if let Some(message) = &update.message {
        let user_id = message.chat.id.to_string();
        let display_name = display_name(message.from.as_ref());

        if let Some(text) = &message.text {
            if text.trim() == "/start" || text.trim().starts_with("/start ") {
                return Some(InboundEvent::new(user_id, display_name, EventKind::Start));
            }
        }
        if let Some(payload) = &message.web_app_data {
            return Some(InboundEvent::new(
                user_id,
                display_name,
                EventKind::WebAppPayload(payload.data.clone()),
            ));
        }
        if let Some(contact) = &message.contact {
            return Some(InboundEvent::new(
                user_id,
                display_name,
                EventKind::Contact(contact.phone_number.clone()),
            ));
        }
        if let Some(text) = &message.text {
            if !text.trim().is_empty() {
                return Some(InboundEvent::new(
                    user_id,
                    display_name,
                    EventKind::Text(text.clone()),
                ));
            }
        }
        return None;
    }

    if let Some(cb) = &update.callback_query {
        // The originating message carries the chat id; without it there
        // is nowhere to route a reply.
        let chat_id = cb.message.as_ref()?.chat.id.to_string();
        let tag = cb.data.clone()?;
        return Some(InboundEvent::new(
            chat_id,
            display_name(Some(&cb.from)),
            EventKind::Selection(tag),
        ));
    }

    None
}

fn display_name(user: Option<&User>) -> String {
    user.and_then(|u| u.first_name.clone().or_else(|| u.username.clone()))
        .unwrap_or_else(|| "unknown".to_string())
}

// ── Tests ───────────────────────────────────────────────────────────
