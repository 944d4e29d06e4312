//! # One observer's private view of a store.
//!
//! A [`Subscription`] owns its own ring buffer. It receives the store's current value
//! first, then every later change in order. When it falls more than the buffer size
//! behind, the oldest undelivered values are skipped and counted in [`Subscription::lagged`].
//!
//! Cancelling (or dropping) a subscription deregisters it from the store right away;
//! other subscriptions are unaffected.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;

use super::store::Command;
use crate::events::{Bus, Event, EventKind, publish_opt};

/// Independent subscription to a [`Store`](crate::Store).
pub struct Subscription<T> {
    id: u64,
    store: Arc<str>,
    rx: broadcast::Receiver<T>,
    commands: mpsc::WeakUnboundedSender<Command<T>>,
    bus: Option<Bus>,
    lagged: u64,
    closed: bool,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub(super) fn new(
        id: u64,
        store: Arc<str>,
        rx: broadcast::Receiver<T>,
        commands: mpsc::WeakUnboundedSender<Command<T>>,
        bus: Option<Bus>,
    ) -> Self {
        Self {
            id,
            store,
            rx,
            commands,
            bus,
            lagged: 0,
            closed: false,
        }
    }

    /// Subscription id, unique within its store.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next value; `None` after cancellation or once the store is gone.
    pub async fn next(&mut self) -> Option<T> {
        if self.closed {
            return None;
        }
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    self.lagged += skipped;
                    tracing::warn!(store = %self.store, subscription = self.id, skipped, "subscriber lagging");
                    publish_opt(self.bus.as_ref(), || {
                        Event::new(EventKind::SubscriptionLagged)
                            .with_source(self.store.clone())
                            .with_subscription(self.id)
                            .with_reason(skipped.to_string())
                    });
                }
                Err(RecvError::Closed) => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    /// Total number of values skipped because this subscriber fell behind.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// True once cancelled or once the store went away.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stops listening and deregisters from the store.
    ///
    /// Idempotent: only the first call sends the deregistration.
    pub fn cancel(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(commands) = self.commands.upgrade() {
            let _ = commands.send(Command::Unsubscribe { id: self.id });
        }
    }

    /// Converts the subscription into a [`Stream`]; dropping the stream cancels it.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let value = sub.next().await?;
            Some((value, sub))
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(commands) = self.commands.upgrade() {
            let _ = commands.send(Command::Unsubscribe { id: self.id });
        }
    }
}
