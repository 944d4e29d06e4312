//! Multi-subscriber broadcast of shared state.
//!
//! - [`Store`] single-writer shared value; cheap to clone.
//! - [`Subscription`] one observer's isolated view with its own bounded ring.
//! - [`StoreConfig`] and [`Confinement`] construction settings.
//!
//! Subscriptions are independent: cancelling or lagging one never alters the
//! sequence another one observes.

mod confinement;
mod store;
mod subscription;

pub use confinement::Confinement;
pub use store::{DEFAULT_SUBSCRIBER_CAPACITY, Store, StoreConfig};
pub use subscription::Subscription;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Bus, EventKind};
    use futures::StreamExt;

    fn store(initial: i32) -> Store<i32> {
        Store::new("counter", initial, StoreConfig::default()).expect("store")
    }

    #[tokio::test]
    async fn test_new_subscription_replays_current_value() {
        let s = store(0);
        s.set(7);
        let mut sub = s.observe();
        assert_eq!(sub.next().await, Some(7));

        s.set(8);
        assert_eq!(sub.next().await, Some(8));
    }

    #[tokio::test]
    async fn test_cancelling_one_subscriber_leaves_the_other_intact() {
        let s = store(0);
        let mut a = s.observe();
        let mut b = s.observe();
        assert_eq!(s.subscriber_count().await, 2);

        s.set(1);
        assert_eq!(a.next().await, Some(0));
        assert_eq!(a.next().await, Some(1));

        a.cancel();
        a.cancel();
        assert!(a.is_closed());
        assert_eq!(a.next().await, None);

        s.set(2);
        s.set(3);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(b.next().await.expect("value"));
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(s.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_drop_deregisters_subscription() {
        let s = store(0);
        let sub = s.observe();
        assert_eq!(s.subscriber_count().await, 1);
        drop(sub);
        assert_eq!(s.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_skips_oldest_values() {
        let cfg = StoreConfig {
            subscriber_capacity: 2,
            ..StoreConfig::default()
        };
        let s = Store::new("ring", 0, cfg).expect("store");
        let mut slow = s.observe();
        for v in 1..=5 {
            s.set(v);
        }
        assert_eq!(s.get().await, Some(5));

        assert_eq!(slow.next().await, Some(4));
        assert_eq!(slow.next().await, Some(5));
        assert_eq!(slow.lagged(), 4);
    }

    #[tokio::test]
    async fn test_ring_capacity_rounds_up_to_power_of_two() {
        let cfg = StoreConfig {
            subscriber_capacity: 3,
            ..StoreConfig::default()
        };
        let s = Store::new("ring", 0, cfg).expect("store");
        let mut slow = s.observe();
        for v in 1..=6 {
            s.set(v);
        }
        assert_eq!(s.get().await, Some(6));

        assert_eq!(slow.next().await, Some(3));
        assert_eq!(slow.lagged(), 3);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_publishes_lag_event() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let cfg = StoreConfig {
            subscriber_capacity: 2,
            ..StoreConfig::default()
        };
        let s = Store::spawn("ring".into(), 0, cfg, Some(bus)).expect("store");
        let mut slow = s.observe();
        for v in 1..=5 {
            s.set(v);
        }
        assert_eq!(s.get().await, Some(5));
        assert_eq!(slow.next().await, Some(4));

        let lagged = loop {
            let ev = events.recv().await.expect("event");
            if ev.kind == EventKind::SubscriptionLagged {
                break ev;
            }
        };
        assert_eq!(lagged.source.as_deref(), Some("ring"));
        assert_eq!(lagged.subscription, Some(slow.id()));
        assert_eq!(lagged.reason.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_update_if_none_notifies_nobody() {
        let s = store(1);
        let mut sub = s.observe();
        assert_eq!(sub.next().await, Some(1));

        s.update_if(|_| None);
        s.update(|v| v * 10);
        assert_eq!(sub.next().await, Some(10));
    }

    #[tokio::test]
    async fn test_subscriptions_end_when_store_is_dropped() {
        let s = store(3);
        let mut sub = s.observe();
        drop(s);
        assert_eq!(sub.next().await, Some(3));
        assert_eq!(sub.next().await, None);
        assert!(sub.is_closed());
    }

    #[tokio::test]
    async fn test_into_stream_yields_values_in_order() {
        let s = store(0);
        let stream = s.observe().into_stream();
        s.set(1);
        s.set(2);
        drop(s);
        let all: Vec<i32> = stream.collect().await;
        assert_eq!(all, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_writer_publishes_subscription_lifecycle() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let s = Store::spawn("cart".into(), 0, StoreConfig::default(), Some(bus)).expect("store");

        let mut sub = s.observe();
        sub.cancel();
        assert_eq!(s.subscriber_count().await, 0);

        let opened = events.recv().await.expect("opened");
        assert_eq!(opened.kind, EventKind::SubscriptionOpened);
        assert_eq!(opened.subscription, Some(sub.id()));
        let closed = events.recv().await.expect("closed");
        assert_eq!(closed.kind, EventKind::SubscriptionClosed);
        assert_eq!(closed.reason.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_store_on_explicit_runtime() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .expect("runtime");
        let cfg = StoreConfig {
            confinement: Confinement::On(rt.handle().clone()),
            ..StoreConfig::default()
        };
        let s = Store::new("ui", 1, cfg).expect("store");
        s.set(2);
        assert_eq!(rt.block_on(s.get()), Some(2));
    }
}
