//! Chat command handling for the operator bot.
//!
//! Works on plain [`IncomingMessage`] values and returns [`Reply`] values, so the
//! same routing is used whatever transport delivers the messages.

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::events::NewsEvent;
use crate::relay::NewsRelay;
use crate::store::NewsItem;

/// Per-message ceiling of the Telegram Bot API, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub const HELP_TEXT: &str = "Привет! Я бот для управления WebApp с новостями.\n\n\
Команды:\n\
/webapp - Открыть WebApp\n\
/news [заголовок] [текст] [URL изображения] - Обновить новость\n\
/current - Показать текущую новость";

pub const USAGE_HINT: &str = "Ошибка при обновлении новости. Используйте формат:\n\
/news \"Заголовок\" \"Текст\" URL_изображения";

pub const UPDATED_TEXT: &str = "Новость успешно обновлена!";
pub const WEBAPP_PROMPT: &str = "Откройте WebApp:";
pub const WEBAPP_BUTTON: &str = "Открыть WebApp";
pub const COMMANDS_ONLY_TEXT: &str =
    "Я понимаю только команды. Попробуйте /start для получения списка команд.";
pub const NEWS_REQUEST_ACK: &str = "Получен запрос на обновление новостей";

/// A chat message as seen by the bot, independent of transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub text: Option<String>,
    /// Raw payload sent by the web app through `Telegram.WebApp.sendData`
    pub web_app_data: Option<String>,
}

impl IncomingMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: Some(text.into()),
            web_app_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAppButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub button: Option<WebAppButton>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            button: None,
        }
    }
}

/// Recognized bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    WebApp,
    /// `/news <payload>`; the payload is everything after the first separator
    News(&'a str),
    Current,
    /// Any other `/command`, and `/news` without a payload
    Unknown,
}

impl<'a> Command<'a> {
    /// Classify message text. Returns `None` for text that is not a command.
    pub fn parse(text: &'a str) -> Option<Self> {
        let rest = text.strip_prefix('/')?;
        let (name, args) = match rest.find(char::is_whitespace) {
            Some(pos) => {
                let sep_len = rest[pos..].chars().next().map_or(1, char::len_utf8);
                (&rest[..pos], Some(&rest[pos + sep_len..]))
            }
            None => (rest, None),
        };
        // `/news@my_bot` addresses a specific bot in group chats
        let name = name.split('@').next().unwrap_or(name);

        let command = match (name, args) {
            ("start", _) => Command::Start,
            ("webapp", _) => Command::WebApp,
            ("current", _) => Command::Current,
            ("news", Some(payload)) if !payload.is_empty() => Command::News(payload),
            _ => Command::Unknown,
        };
        Some(command)
    }
}

#[derive(Debug, Deserialize)]
struct WebAppAction {
    action: Option<String>,
}

/// Routes operator messages to the relay.
#[derive(Clone)]
pub struct BotHandler {
    relay: NewsRelay,
    webapp_url: String,
}

impl BotHandler {
    pub fn new(relay: NewsRelay, webapp_url: impl Into<String>) -> Self {
        Self {
            relay,
            webapp_url: webapp_url.into(),
        }
    }

    pub fn relay(&self) -> &NewsRelay {
        &self.relay
    }

    /// Replies to send back to `msg.chat_id`, in order. May be empty.
    pub fn handle(&self, msg: &IncomingMessage) -> Vec<Reply> {
        if let Some(data) = msg.web_app_data.as_deref() {
            return self.handle_web_app_data(msg.chat_id, data);
        }

        let Some(text) = msg.text.as_deref() else {
            return Vec::new();
        };

        match Command::parse(text) {
            Some(Command::Start) => vec![Reply::text(HELP_TEXT)],
            Some(Command::WebApp) => vec![Reply {
                text: WEBAPP_PROMPT.to_string(),
                button: Some(WebAppButton {
                    text: WEBAPP_BUTTON.to_string(),
                    url: self.webapp_url.clone(),
                }),
            }],
            Some(Command::News(payload)) => match self.relay.update(payload) {
                Ok(item) => {
                    info!(chat_id = msg.chat_id, id = %item.id, "news updated from chat");
                    vec![Reply::text(UPDATED_TEXT)]
                }
                Err(e) => {
                    warn!(chat_id = msg.chat_id, code = e.code(), "news update rejected");
                    vec![Reply::text(USAGE_HINT)]
                }
            },
            Some(Command::Current) => {
                let rendered = render_current(&self.relay.current());
                split_message(&rendered, MAX_MESSAGE_CHARS)
                    .into_iter()
                    .map(Reply::text)
                    .collect()
            }
            Some(Command::Unknown) => Vec::new(),
            None => vec![Reply::text(COMMANDS_ONLY_TEXT)],
        }
    }

    fn handle_web_app_data(&self, chat_id: i64, data: &str) -> Vec<Reply> {
        match serde_json::from_str::<WebAppAction>(data) {
            Ok(WebAppAction { action: Some(action) }) if action == "request_news" => {
                self.relay.events().publish(&NewsEvent::NewsRequested);
                vec![Reply::text(NEWS_REQUEST_ACK)]
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                error!(chat_id, error = %e, "failed to decode web app data");
                Vec::new()
            }
        }
    }
}

/// Human-readable summary of the current item for `/current`.
pub fn render_current(item: &NewsItem) -> String {
    format!(
        "Текущая новость:\n\nЗаголовок: {}\nТекст: {}\nИзображение: {}\nДата: {}",
        item.title,
        item.text,
        item.image_url,
        item.created_at.format("%d.%m.%Y, %H:%M:%S")
    )
}

/// Split `text` into pieces of at most `limit` characters.
///
/// Cuts at the last newline inside each window when there is one (the newline
/// itself is dropped), otherwise at exactly `limit` characters.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if window_end == rest.len() {
            parts.push(rest.to_string());
            break;
        }

        let (chunk, next) = match rest[..window_end].rfind('\n') {
            Some(nl) if nl > 0 => (&rest[..nl], &rest[nl + 1..]),
            _ => (&rest[..window_end], &rest[window_end..]),
        };
        parts.push(chunk.to_string());
        rest = next;
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::store::DEFAULT_TITLE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn handler() -> BotHandler {
        BotHandler::new(NewsRelay::default(), "https://webapp.example.com")
    }

    #[test]
    fn classifies_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/webapp"), Some(Command::WebApp));
        assert_eq!(Command::parse("/current please"), Some(Command::Current));
        assert_eq!(Command::parse("/current@news_bot"), Some(Command::Current));
        assert_eq!(
            Command::parse("/news \"a\" \"b\" c"),
            Some(Command::News("\"a\" \"b\" c"))
        );
        assert_eq!(Command::parse("/news"), Some(Command::Unknown));
        assert_eq!(Command::parse("/news "), Some(Command::Unknown));
        assert_eq!(Command::parse("/weather"), Some(Command::Unknown));
        assert_eq!(Command::parse("hello"), None);
    }

    #[test]
    fn news_payload_keeps_newlines() {
        assert_eq!(
            Command::parse("/news\n\"a\" \"line1\nline2\" c"),
            Some(Command::News("\"a\" \"line1\nline2\" c"))
        );
    }

    #[test]
    fn start_lists_commands() {
        let replies = handler().handle(&IncomingMessage::text(1, "/start"));
        assert_eq!(replies, vec![Reply::text(HELP_TEXT)]);
    }

    #[test]
    fn webapp_reply_has_button() {
        let replies = handler().handle(&IncomingMessage::text(1, "/webapp"));
        assert_eq!(replies.len(), 1);
        let button = replies[0].button.as_ref().expect("button");
        assert_eq!(button.url, "https://webapp.example.com");
        assert_eq!(button.text, WEBAPP_BUTTON);
    }

    #[test]
    fn news_command_updates_store() {
        let h = handler();
        let replies = h.handle(&IncomingMessage::text(
            7,
            r#"/news "Добро пожаловать" "Первая новость" https://example.com/img.png"#,
        ));
        assert_eq!(replies, vec![Reply::text(UPDATED_TEXT)]);

        let item = h.relay().current();
        assert_eq!(item.title, "Добро пожаловать");
        assert_eq!(item.text, "Первая новость");
        assert_eq!(item.image_url, "https://example.com/img.png");
    }

    #[test]
    fn malformed_news_gets_usage_hint_and_no_change() {
        let h = handler();
        let before = h.relay().current();
        let replies = h.handle(&IncomingMessage::text(7, r#"/news "Title only""#));
        assert_eq!(replies, vec![Reply::text(USAGE_HINT)]);
        assert_eq!(*h.relay().current(), *before);
    }

    #[test]
    fn current_renders_item() {
        let replies = handler().handle(&IncomingMessage::text(1, "/current"));
        assert_eq!(replies.len(), 1);
        assert!(replies[0].text.starts_with("Текущая новость:"));
        assert!(replies[0].text.contains(DEFAULT_TITLE));
    }

    #[test]
    fn long_current_is_split() {
        let h = handler();
        let body = "слово ".repeat(1500);
        h.relay()
            .update(&format!("\"T\" \"{body}\" u"))
            .expect("update");

        let replies = h.handle(&IncomingMessage::text(1, "/current"));
        assert!(replies.len() > 1);
        assert!(replies
            .iter()
            .all(|r| r.text.chars().count() <= MAX_MESSAGE_CHARS));
    }

    #[test]
    fn plain_text_gets_hint_and_unknown_command_is_ignored() {
        let h = handler();
        assert_eq!(
            h.handle(&IncomingMessage::text(1, "hi there")),
            vec![Reply::text(COMMANDS_ONLY_TEXT)]
        );
        assert!(h.handle(&IncomingMessage::text(1, "/unknown")).is_empty());
        assert!(h.handle(&IncomingMessage::default()).is_empty());
    }

    #[test]
    fn web_app_request_is_acknowledged_and_published() {
        let h = handler();
        let count = Arc::new(AtomicUsize::new(0));
        let count_in_handler = Arc::clone(&count);
        h.relay().events().subscribe(EventKind::NewsRequested, move |_| {
            count_in_handler.fetch_add(1, Ordering::SeqCst);
        });

        let msg = IncomingMessage {
            chat_id: 3,
            text: None,
            web_app_data: Some(r#"{"action":"request_news"}"#.to_string()),
        };
        assert_eq!(h.handle(&msg), vec![Reply::text(NEWS_REQUEST_ACK)]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bad_web_app_data_is_ignored() {
        let h = handler();
        for data in ["not json", r#"{"action":"other"}"#, "{}"] {
            let msg = IncomingMessage {
                chat_id: 3,
                text: None,
                web_app_data: Some(data.to_string()),
            };
            assert!(h.handle(&msg).is_empty(), "{data}");
        }
    }

    #[test]
    fn split_prefers_newlines() {
        let parts = split_message("aaaa\nbbbb\ncc", 7);
        assert_eq!(parts, vec!["aaaa", "bbbb\ncc"]);
    }

    #[test]
    fn split_hard_cuts_without_newlines() {
        let parts = split_message("абвгдеёжз", 4);
        assert_eq!(parts, vec!["абвг", "деёж", "з"]);
        assert_eq!(split_message("short", 4096), vec!["short"]);
        assert!(split_message("", 10).is_empty());
    }
}
