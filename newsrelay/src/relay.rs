use std::sync::Arc;

use tracing::{debug, info};

use crate::events::{EventBus, NewsEvent};
use crate::parser::{self, ParseError};
use crate::store::{NewsItem, NewsStore};

/// Update and read entry points shared by the bot and the HTTP server.
///
/// Built once at startup and handed to each consumer; cloning shares the
/// same store and event bus.
#[derive(Clone)]
pub struct NewsRelay {
    store: Arc<NewsStore>,
    events: Arc<EventBus>,
}

impl NewsRelay {
    pub fn new(store: Arc<NewsStore>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    /// Parse `raw` and, on success, make it the current item.
    ///
    /// A parse failure leaves the store untouched.
    pub fn update(&self, raw: &str) -> Result<Arc<NewsItem>, ParseError> {
        let parsed = parser::parse(raw).map_err(|e| {
            debug!(error = %e, code = e.code(), "rejected news payload");
            e
        })?;

        let item = self
            .store
            .replace(parsed.title, parsed.body, parsed.image_ref);
        info!(id = %item.id, title = %item.title, "news item replaced");

        self.events.publish(&NewsEvent::NewsUpdated(Arc::clone(&item)));
        Ok(item)
    }

    pub fn current(&self) -> Arc<NewsItem> {
        self.store.current()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Default for NewsRelay {
    fn default() -> Self {
        Self::new(Arc::new(NewsStore::with_defaults()), Arc::new(EventBus::new()))
    }
}
