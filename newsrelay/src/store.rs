use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::NewsConfig;

/// The news record shown by the web app.
///
/// Serialized field names (`imageUrl`, `createdAt`) are the contract with the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub text: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_ID: &str = "1";
pub const DEFAULT_TITLE: &str = "Добро пожаловать";
pub const DEFAULT_TEXT: &str =
    "Это первая новость в нашем WebApp. Обновите её, отправив команду /news.";
pub const DEFAULT_IMAGE_URL: &str = "https://placehold.co/600x400?text=Welcome";

impl NewsItem {
    /// Placeholder item served until the first update.
    pub fn placeholder(overrides: &NewsConfig) -> Self {
        Self {
            id: DEFAULT_ID.to_string(),
            title: overrides.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            text: overrides.text.clone().unwrap_or_else(|| DEFAULT_TEXT.to_string()),
            image_url: overrides
                .image_url
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            created_at: Utc::now(),
        }
    }
}

struct Slot {
    item: Arc<NewsItem>,
    last_stamp: i64,
}

/// Holds the single current news item.
///
/// Readers get an `Arc` snapshot; `replace` swaps the whole item under the write
/// lock, so a reader never sees fields from two different updates.
pub struct NewsStore {
    slot: RwLock<Slot>,
}

impl NewsStore {
    pub fn new(initial: NewsItem) -> Self {
        Self {
            slot: RwLock::new(Slot {
                item: Arc::new(initial),
                last_stamp: 0,
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(NewsItem::placeholder(&NewsConfig::default()))
    }

    pub fn current(&self) -> Arc<NewsItem> {
        // A poisoned lock still holds a complete item: the swap is a single assignment.
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&slot.item)
    }

    /// Replace the current item. Inputs are expected to be validated already.
    pub fn replace(
        &self,
        title: impl Into<String>,
        text: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Arc<NewsItem> {
        let (title, text, image_url) = (title.into(), text.into(), image_url.into());
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        // ids are millisecond stamps; bump on collision so every update is distinct
        let stamp = now.timestamp_millis().max(slot.last_stamp + 1);
        slot.last_stamp = stamp;

        let item = Arc::new(NewsItem {
            id: stamp.to_string(),
            title,
            text,
            image_url,
            created_at: now,
        });
        slot.item = Arc::clone(&item);
        item
    }
}

impl Default for NewsStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
