use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::bot::{BotHandler, IncomingMessage, Reply};

/// Minimal Bot API surface the polling worker needs
#[async_trait::async_trait]
pub trait BotApi: Send + Sync {
    /// Long-poll for updates with `update_id >= offset`
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>>;

    async fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub web_app_data: Option<WebAppData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebAppData {
    pub data: String,
    #[serde(default)]
    pub button_text: Option<String>,
}

impl From<&Message> for IncomingMessage {
    fn from(msg: &Message) -> Self {
        IncomingMessage {
            chat_id: msg.chat.id,
            text: msg.text.clone(),
            web_app_data: msg.web_app_data.as_ref().map(|d| d.data.clone()),
        }
    }
}

/// Telegram Bot API client over HTTPS
pub struct TelegramClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl TelegramClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Timeout for non-polling calls; `getUpdates` adds its long-poll window on top.
    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(timeout_secs);
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        // the timeout covers reading the body too, not just the response headers
        let exchange = async {
            let response = self
                .client
                .post(self.method_url(method))
                .json(body)
                .send()
                .await
                .with_context(|| format!("Bot API {} HTTP request failed", method))?;
            let status = response.status();
            let body_text = response
                .text()
                .await
                .with_context(|| format!("Failed to read Bot API {} response", method))?;
            Ok::<_, anyhow::Error>((status, body_text))
        };

        let (status, body_text) = tokio::time::timeout(timeout, exchange)
            .await
            .with_context(|| format!("Bot API {} timed out", method))??;

        let parsed: ApiResponse<T> = serde_json::from_str(&body_text).with_context(|| {
            format!("Failed to parse Bot API {} response ({}): {}", method, status, body_text)
        })?;

        if !parsed.ok || !status.is_success() {
            anyhow::bail!(
                "Bot API {} error {}: {}",
                method,
                status,
                parsed.description.unwrap_or_default()
            );
        }

        parsed
            .result
            .with_context(|| format!("Bot API {} response has no result", method))
    }
}

#[async_trait::async_trait]
impl BotApi for TelegramClient {
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let req = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message"],
        };
        let timeout = self.request_timeout + Duration::from_secs(timeout_secs);
        self.call("getUpdates", &req, timeout).await
    }

    async fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let req = SendMessageRequest {
            chat_id,
            text: &reply.text,
            reply_markup: reply.button.as_ref().map(|b| InlineKeyboardMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton {
                    text: &b.text,
                    web_app: WebAppInfo { url: &b.url },
                }]],
            }),
        };
        let _: serde_json::Value = self.call("sendMessage", &req, self.request_timeout).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'a str,
    web_app: WebAppInfo<'a>,
}

#[derive(Debug, Serialize)]
struct WebAppInfo<'a> {
    url: &'a str,
}

/// Handle one update and send its replies. Returns the number of replies delivered.
///
/// Send failures are logged; they do not abort the remaining replies.
pub async fn dispatch_update(api: &dyn BotApi, handler: &BotHandler, update: &Update) -> usize {
    let Some(message) = update.message.as_ref() else {
        debug!(update_id = update.update_id, "skipping non-message update");
        return 0;
    };

    let incoming = IncomingMessage::from(message);
    let mut delivered = 0;
    for reply in handler.handle(&incoming) {
        match api.send_message(incoming.chat_id, &reply).await {
            Ok(()) => delivered += 1,
            Err(e) => error!(chat_id = incoming.chat_id, error = %e, "failed to send reply"),
        }
    }
    delivered
}

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Long-polling loop. Runs until `shutdown` is notified.
///
/// Polling errors are retried with exponential backoff (1s, 2s, 4s... capped at 30s).
pub async fn run_bot(
    api: Arc<dyn BotApi>,
    handler: BotHandler,
    poll_timeout_secs: u64,
    shutdown: Arc<Notify>,
) -> Result<()> {
    info!(poll_timeout_secs, "bot: starting long polling");

    // registered before the first poll so a notify_waiters() while busy is not lost
    let shutdown_signal = shutdown.notified();
    tokio::pin!(shutdown_signal);

    let mut offset: Option<i64> = None;
    let mut backoff = Duration::from_secs(1);

    loop {
        let polled = tokio::select! {
            res = api.get_updates(offset, poll_timeout_secs) => res,
            _ = &mut shutdown_signal => {
                info!("bot: shutdown requested, exiting loop");
                break;
            }
        };

        match polled {
            Ok(updates) => {
                backoff = Duration::from_secs(1);
                if !updates.is_empty() {
                    debug!(count = updates.len(), "bot: received updates");
                }
                for update in &updates {
                    offset = Some(offset.map_or(update.update_id + 1, |o| o.max(update.update_id + 1)));
                    dispatch_update(api.as_ref(), &handler, update).await;
                }
            }
            Err(e) => {
                warn!(error = %e, backoff_secs = backoff.as_secs(), "bot: polling failed, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = &mut shutdown_signal => {
                        info!("bot: shutdown requested during backoff");
                        break;
                    }
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    info!("bot: polling stopped");
    Ok(())
}
