//! # Example: shared_store
//!
//! One store, several independent observers.
//!
//! Demonstrates how to:
//! - Create a [`Store`] through the [`Runtime`] so subscription events reach monitors.
//! - Let a parent observer react to changes while a view renders the same changes.
//! - Cancel one subscription without disturbing the other.
//! - Watch a slow subscriber skip its oldest values instead of stalling the store.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example shared_store
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use uniflow::{LogWriter, Monitor, Runtime, RuntimeConfig};

#[derive(Clone, Debug)]
struct Cart {
    items: Vec<&'static str>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = RuntimeConfig {
        subscriber_capacity: 4,
        ..RuntimeConfig::default()
    };
    let rt = Runtime::builder(cfg)
        .with_monitors(vec![Arc::new(LogWriter::new()) as Arc<dyn Monitor>])
        .build()?;
    let cart = rt.store("cart", Cart { items: Vec::new() })?;

    // Parent observer: stops after the cart holds two items.
    let mut parent = cart.observe();
    let parent_task = tokio::spawn(async move {
        while let Some(c) = parent.next().await {
            println!("[parent] {} item(s)", c.items.len());
            if c.items.len() >= 2 {
                println!("[parent] checkout threshold reached; unsubscribing");
                parent.cancel();
            }
        }
    });

    // View observer: renders everything until the store goes away.
    let mut view = cart.observe();
    let view_task = tokio::spawn(async move {
        while let Some(c) = view.next().await {
            println!("[view] {:?}", c.items);
        }
    });

    // Slow observer: sleeps between reads and falls behind.
    let mut slow = cart.observe();
    let slow_task = tokio::spawn(async move {
        while let Some(c) = slow.next().await {
            println!("[slow] saw {} item(s)", c.items.len());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        println!("[slow] skipped {} value(s)", slow.lagged());
    });

    for item in ["apple", "pear", "plum", "fig", "kiwi", "lime", "date", "yuzu"] {
        cart.update(move |c| {
            let mut next = c.clone();
            next.items.push(item);
            next
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    println!("active subscriptions: {}", cart.subscriber_count().await);

    drop(cart);
    let _ = tokio::join!(parent_task, view_task, slow_task);
    rt.shutdown().await?;
    Ok(())
}
