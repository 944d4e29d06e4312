//! # Shared state owned by a single writer task.
//!
//! A [`Store`] holds one current value and fans every change out to any number of
//! [`Subscription`]s. All mutations are serialized on one writer task, confined to the
//! runtime chosen by [`StoreConfig::confinement`].
//!
//! ## Architecture
//! ```text
//! Store handles (many) ──► commands (mpsc) ──► writer task ──┬──► ring(sub 1) ──► Subscription 1
//!                                                owns value  ├──► ring(sub 2) ──► Subscription 2
//!                                                            └──► ring(sub N) ──► Subscription N
//! ```
//!
//! ## Rules
//! - A new subscription first receives the current value, then later changes in order.
//! - Each subscription has its own bounded ring; a slow one skips its oldest values
//!   and never delays the writer or other subscribers.
//! - Cancelling or dropping a subscription removes it from the writer's map.
//!   Subscriptions whose receiver vanished are pruned on the next change.
//! - When the last `Store` handle drops, the writer stops and every subscription ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, mpsc, oneshot};

use super::confinement::Confinement;
use super::subscription::Subscription;
use crate::error::BuildError;
use crate::events::{Bus, Event, EventKind, publish_opt};

/// Default per-subscription ring size.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

type Mutation<T> = Box<dyn FnOnce(&T) -> Option<T> + Send>;

pub(crate) enum Command<T> {
    Subscribe {
        id: u64,
        tx: broadcast::Sender<T>,
    },
    Unsubscribe {
        id: u64,
    },
    Set(T),
    Update(Mutation<T>),
    Get(oneshot::Sender<T>),
    Count(oneshot::Sender<usize>),
}

/// Store construction settings.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Values buffered per subscription before the oldest are skipped (min 1).
    ///
    /// The ring is a `tokio::sync::broadcast` channel, which rounds its capacity up to
    /// the next power of two: a capacity of 5 buffers 8 values.
    pub subscriber_capacity: usize,
    /// Runtime hosting the writer task.
    pub confinement: Confinement,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            confinement: Confinement::Current,
        }
    }
}

/// Cloneable handle to shared, observable state.
pub struct Store<T> {
    name: Arc<str>,
    commands: mpsc::UnboundedSender<Command<T>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
    bus: Option<Bus>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            commands: self.commands.clone(),
            next_id: self.next_id.clone(),
            capacity: self.capacity,
            bus: self.bus.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Store<T> {
    /// Creates a store holding `initial` and starts its writer.
    ///
    /// Fails with [`BuildError::NoRuntime`] when the confinement cannot be resolved.
    pub fn new(
        name: impl Into<Arc<str>>,
        initial: T,
        config: StoreConfig,
    ) -> Result<Self, BuildError> {
        Self::spawn(name.into(), initial, config, None)
    }

    pub(crate) fn spawn(
        name: Arc<str>,
        initial: T,
        config: StoreConfig,
        bus: Option<Bus>,
    ) -> Result<Self, BuildError> {
        let handle = config.confinement.resolve()?;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(writer(name.clone(), initial, rx, bus.clone()));

        Ok(Self {
            name,
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            capacity: config.subscriber_capacity.max(1),
            bus,
        })
    }

    /// Store name (used in events and logs).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a new independent subscription.
    pub fn observe(&self) -> Subscription<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = broadcast::channel(self.capacity);
        self.send(Command::Subscribe { id, tx });
        Subscription::new(
            id,
            self.name.clone(),
            rx,
            self.commands.downgrade(),
            self.bus.clone(),
        )
    }

    /// Replaces the current value and notifies every subscriber.
    pub fn set(&self, value: T) {
        self.send(Command::Set(value));
    }

    /// Derives the next value from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        self.send(Command::Update(Box::new(move |cur| Some(f(cur)))));
    }

    /// Like [`update`](Self::update), but `None` leaves the value untouched and notifies nobody.
    pub fn update_if<F>(&self, f: F)
    where
        F: FnOnce(&T) -> Option<T> + Send + 'static,
    {
        self.send(Command::Update(Box::new(f)));
    }

    /// Reads the current value after every previously issued mutation was applied.
    ///
    /// Returns `None` only when the writer's runtime has shut down.
    pub async fn get(&self) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Get(tx));
        rx.await.ok()
    }

    /// Number of registered subscriptions, as seen by the writer.
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Count(tx));
        rx.await.unwrap_or(0)
    }

    fn send(&self, cmd: Command<T>) {
        if self.commands.send(cmd).is_err() {
            tracing::debug!(store = %self.name, "store writer is gone; command dropped");
        }
    }
}

async fn writer<T: Clone + Send + 'static>(
    name: Arc<str>,
    mut value: T,
    mut commands: mpsc::UnboundedReceiver<Command<T>>,
    bus: Option<Bus>,
) {
    let mut subscribers: HashMap<u64, broadcast::Sender<T>> = HashMap::new();

    while let Some(cmd) = commands.recv().await {
        match cmd {
            Command::Subscribe { id, tx } => {
                // Receiver already dropped: nothing to register.
                if tx.send(value.clone()).is_err() {
                    continue;
                }
                subscribers.insert(id, tx);
                publish_opt(bus.as_ref(), || {
                    Event::new(EventKind::SubscriptionOpened)
                        .with_source(name.clone())
                        .with_subscription(id)
                });
            }
            Command::Unsubscribe { id } => {
                if subscribers.remove(&id).is_some() {
                    closed(bus.as_ref(), &name, id, "cancelled");
                }
            }
            Command::Set(next) => {
                value = next;
                fan_out(&value, &mut subscribers, bus.as_ref(), &name);
            }
            Command::Update(f) => {
                if let Some(next) = f(&value) {
                    value = next;
                    fan_out(&value, &mut subscribers, bus.as_ref(), &name);
                }
            }
            Command::Get(reply) => {
                let _ = reply.send(value.clone());
            }
            Command::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }

    tracing::debug!(store = %name, "store writer stopped");
    publish_opt(bus.as_ref(), || {
        Event::new(EventKind::StoreClosed).with_source(name.clone())
    });
}

fn fan_out<T: Clone>(
    value: &T,
    subscribers: &mut HashMap<u64, broadcast::Sender<T>>,
    bus: Option<&Bus>,
    name: &Arc<str>,
) {
    subscribers.retain(|id, tx| {
        if tx.send(value.clone()).is_ok() {
            return true;
        }
        closed(bus, name, *id, "receiver_gone");
        false
    });
}

fn closed(bus: Option<&Bus>, name: &Arc<str>, id: u64, reason: &'static str) {
    publish_opt(bus, || {
        Event::new(EventKind::SubscriptionClosed)
            .with_source(name.clone())
            .with_subscription(id)
            .with_reason(reason)
    });
}
