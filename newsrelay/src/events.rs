//! Typed observer registry for out-of-band news notifications.
//!
//! Handlers run synchronously on the publishing thread, in registration order.
//! The registry lock is never held while a handler runs, so a handler may
//! subscribe or unsubscribe (itself included) without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::store::NewsItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewsUpdated,
    NewsRequested,
}

#[derive(Debug, Clone)]
pub enum NewsEvent {
    /// A new item replaced the current one
    NewsUpdated(Arc<NewsItem>),
    /// The web app asked for fresh news
    NewsRequested,
}

impl NewsEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NewsEvent::NewsUpdated(_) => EventKind::NewsUpdated,
            NewsEvent::NewsRequested => EventKind::NewsRequested,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Handler = Arc<dyn Fn(&NewsEvent) + Send + Sync>;

struct Subscription {
    token: SubscriptionToken,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    next_token: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionToken
    where
        F: Fn(&NewsEvent) + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription {
            token,
            kind,
            handler: Arc::new(handler),
        });
        token
    }

    /// Remove a subscription. Returns `false` if the token was already gone.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subs = self.lock();
        let before = subs.len();
        subs.retain(|s| s.token != token);
        subs.len() != before
    }

    /// Deliver `event` to its subscribers; returns how many handlers ran.
    ///
    /// Subscribers added during delivery only see later events. A subscriber
    /// removed during delivery is skipped if it has not run yet.
    pub fn publish(&self, event: &NewsEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionToken, Handler)> = self
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.token, Arc::clone(&s.handler)))
            .collect();

        let mut delivered = 0;
        for (token, handler) in snapshot {
            if !self.is_subscribed(token) {
                continue;
            }
            handler(event);
            delivered += 1;
        }
        delivered
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|s| s.kind == kind).count()
    }

    fn is_subscribed(&self, token: SubscriptionToken) -> bool {
        self.lock().iter().any(|s| s.token == token)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
