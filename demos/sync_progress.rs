//! # Example: sync_progress
//!
//! A three-stage sync use case observed by a view and driven by a presenter.
//!
//! Demonstrates how to:
//! - Inject leaf sub-operations ([`OperationFn`]) into a [`Pipeline`].
//! - Run two fetches in parallel and merge them into one snapshot.
//! - Map snapshots into a view through a pure [`Projection`].
//! - Retry after a failure without losing the last good view.
//!
//! ## Flow
//! ```text
//! Presenter::perform(sync)
//!   ├─► validate options
//!   ├─► stage "fetch"  (remote ∥ local) ─► emit Snapshot
//!   ├─► stage "merge"                   ─► emit Snapshot
//!   └─► stage "upload" (sub-operation)  ─► emit Snapshot
//!        view task: Loading → Operating(..) → Ready(..)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example sync_progress
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use uniflow::{
    LogWriter, Monitor, OperationError, OperationFn, OperationRef, Part, Patch, Pipeline,
    PresentationState, Presenter, Projection, Runtime, RuntimeConfig,
};

#[derive(Clone, Debug)]
struct SyncOptions {
    account: String,
}

#[derive(Clone, Debug, Default)]
struct SyncSnapshot {
    remote: Vec<String>,
    local: Vec<String>,
    merged: Vec<String>,
    uploaded: usize,
}

/// What a screen shows.
#[derive(Clone, Debug)]
struct SyncView {
    headline: String,
    uploaded: usize,
}

struct SyncScreen;

impl Projection for SyncScreen {
    type Snapshot = SyncSnapshot;
    type View = SyncView;

    fn project(s: SyncSnapshot, _prior: Option<&SyncView>) -> SyncView {
        let headline = if s.merged.is_empty() {
            format!("fetched {} remote / {} local", s.remote.len(), s.local.len())
        } else {
            format!("{} merged, {} uploaded", s.merged.len(), s.uploaded)
        };
        SyncView {
            headline,
            uploaded: s.uploaded,
        }
    }
}

fn fetch_part(
    which: &'static str,
    items: &'static [&'static str],
    delay_ms: u64,
) -> Part<SyncOptions, SyncSnapshot> {
    Part::new(move |opts: Arc<SyncOptions>, _| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        tracing::info!(account = %opts.account, which, "fetched");
        let items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        let patch: Patch<SyncSnapshot> = Box::new(move |s: &mut SyncSnapshot| match which {
            "remote" => s.remote = items,
            _ => s.local = items,
        });
        Ok(patch)
    })
}

fn build_sync(
    upload: OperationRef<Vec<String>, usize>,
) -> Result<Pipeline<SyncOptions, SyncSnapshot>, uniflow::BuildError> {
    Pipeline::builder("sync", |_: &SyncOptions| SyncSnapshot::default())
        .validate(|o: &SyncOptions| {
            if o.account.is_empty() {
                return Err(OperationError::invalid("account is required"));
            }
            Ok(())
        })
        .invariant(|s: &SyncSnapshot| {
            if s.uploaded > s.merged.len() {
                return Err(format!("uploaded {} of {} merged", s.uploaded, s.merged.len()));
            }
            Ok(())
        })
        .parallel(
            "fetch",
            [
                fetch_part("remote", &["a", "b", "c"], 120),
                fetch_part("local", &["c", "d"], 40),
            ],
        )
        .step("merge", |_, mut s: SyncSnapshot| async move {
            let mut merged: Vec<String> =
                s.remote.iter().chain(s.local.iter()).cloned().collect();
            merged.sort();
            merged.dedup();
            s.merged = merged;
            Ok(s)
        })
        .call(
            "upload",
            upload,
            |_: &SyncOptions, s: &SyncSnapshot| s.merged.clone(),
            |mut s, uploaded| {
                s.uploaded = uploaded;
                s
            },
        )
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = Runtime::builder(RuntimeConfig::default())
        .with_monitors(vec![Arc::new(LogWriter::new()) as Arc<dyn Monitor>])
        .build()?;

    // First upload attempt fails; the retry succeeds.
    let flaky = Arc::new(AtomicBool::new(true));
    let upload: OperationRef<Vec<String>, usize> =
        OperationFn::arc("upload", move |items: Vec<String>| {
            let flaky = flaky.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                if flaky.swap(false, Ordering::SeqCst) {
                    return Err(OperationError::fail("upload endpoint unavailable"));
                }
                Ok(items.len())
            }
        });
    let sync = Arc::new(build_sync(upload)?);

    let screen: Presenter<SyncScreen> = rt.presenter("sync-screen")?;
    let mut view = screen.observe();
    let viewer = tokio::spawn(async move {
        while let Some(state) = view.next().await {
            match state {
                PresentationState::Uninitialized => println!("[view] idle"),
                PresentationState::Loading { prior } => {
                    println!("[view] loading (showing {:?})", prior.map(|p| p.headline))
                }
                PresentationState::Operating { live, .. } => println!("[view] {}", live.headline),
                PresentationState::Ready(v) => {
                    println!("[view] done: {} ({} uploaded)", v.headline, v.uploaded)
                }
                PresentationState::Failed { error, prior } => println!(
                    "[view] failed: {error} (still showing {:?})",
                    prior.map(|p| p.headline)
                ),
            }
        }
    });

    let options = SyncOptions {
        account: "demo".into(),
    };
    println!("first attempt: {:?}", screen.perform(sync.clone(), options.clone()).await);
    println!("retry: {:?}", screen.perform(sync.clone(), options).await);
    println!(
        "rejected: {:?}",
        screen
            .perform(sync, SyncOptions { account: String::new() })
            .await
    );

    rt.shutdown().await?;
    drop(screen);
    let _ = viewer.await;
    Ok(())
}
