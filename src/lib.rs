//! # uniflow
//!
//! **Uniflow** is a small runtime for use-case orchestration and state streaming.
//!
//! Business logic is written as operations. A multi-step use case reports one
//! consistent snapshot per step through a progress channel; a presenter maps those
//! snapshots into its own presentation state and broadcasts it to any number of
//! independent observers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller (one call per user action)
//!      │ options
//!      ▼
//! ┌──────────────────────────────┐   sub-operations   ┌────────────────────┐
//! │  Pipeline (orchestrator)     │ ─────────────────► │ Operation / OpFn   │
//! │  seed → step → fork → step   │ ◄───────────────── │ (I/O, computation) │
//! └──────────────┬───────────────┘      results       └────────────────────┘
//!                │ one snapshot per stage
//!                ▼
//!        Progress channel (Emitter ──► Progress)      one producer, one consumer
//!                │
//!                ▼
//! ┌──────────────────────────────┐
//! │  Presenter<P: Projection>    │   pure mapping: snapshot + prior ──► view
//! │  PresentationState<View>     │
//! └──────────────┬───────────────┘
//!                │ single writer
//!                ▼
//!          Store (broadcast) ──┬──► Subscription 1 (own ring)  e.g. a view
//!                              ├──► Subscription 2 (own ring)  e.g. a parent flow
//!                              └──► Subscription N
//! ```
//!
//! ### Runtime
//! ```text
//! Runtime ── stream/run ──► invocation task (child token, timeout) ─┐
//!         ── store/presenter ──► store writer ──────────────────────┼─► Bus ─► MonitorSet ─► LogWriter, ...
//!         ── shutdown ──► cancel root token, wait within grace ─────┘
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                              |
//! |-------------------|-----------------------------------------------------------------|-------------------------------------------------|
//! | **Operations**    | Single-result and streaming operation protocols, bridged.       | [`Operation`], [`StreamingOperation`], [`OperationFn`] |
//! | **Progress**      | Snapshot channel with one terminal signal and cancellation.     | [`Emitter`], [`Progress`]                       |
//! | **Orchestration** | Multi-stage pipelines emitting only consistent snapshots.       | [`Pipeline`], [`Part`], [`Patch`]               |
//! | **Presentation**  | Pure snapshot → view mapping and a retry-safe state machine.     | [`Projection`], [`PresentationState`], [`Presenter`] |
//! | **Broadcast**     | Single-writer state with isolated, bounded subscriptions.       | [`Store`], [`Subscription`], [`Confinement`]    |
//! | **Runtime**       | Composition root, events, monitors, graceful shutdown.          | [`Runtime`], [`Monitor`], [`LogWriter`]         |
//! | **Errors**        | Typed errors for invocations, construction, and shutdown.       | [`OperationError`], [`BuildError`], [`RuntimeError`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use uniflow::{
//!     Identity, LogWriter, Monitor, OperationError, Outcome, Pipeline, PresentationState,
//!     Presenter, Runtime, RuntimeConfig,
//! };
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Mirror { pulled: usize, pushed: usize }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rt = Runtime::builder(RuntimeConfig::default())
//!         .with_monitors(vec![Arc::new(LogWriter::default()) as Arc<dyn Monitor>])
//!         .build()?;
//!
//!     let mirror = Pipeline::builder("mirror", |_: &()| Mirror { pulled: 0, pushed: 0 })
//!         .step("pull", |_, m: Mirror| async move { Ok::<_, OperationError>(Mirror { pulled: 3, ..m }) })
//!         .step("push", |_, m: Mirror| async move { Ok(Mirror { pushed: m.pulled, ..m }) })
//!         .build()?;
//!
//!     let screen: Presenter<Identity<Mirror>> = rt.presenter("mirror-screen")?;
//!     assert_eq!(screen.perform(Arc::new(mirror), ()).await, Outcome::Completed);
//!     assert_eq!(
//!         screen.state().await,
//!         Some(PresentationState::Ready(Mirror { pulled: 3, pushed: 3 }))
//!     );
//!
//!     rt.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod broadcast;
mod core;
mod error;
mod events;
mod monitors;
mod operations;
mod orchestrator;
mod presentation;
pub mod progress;

// ---- Public re-exports ----

pub use self::core::{Runtime, RuntimeBuilder, RuntimeConfig, run_with_timeout};
pub use broadcast::{Confinement, Store, StoreConfig, Subscription};
pub use error::{BuildError, OperationError, RuntimeError, require};
pub use events::{Event, EventKind};
pub use monitors::{LogWriter, Monitor};
pub use operations::{Operation, OperationFn, OperationRef, StreamingOperation};
pub use orchestrator::{Part, Patch, Pipeline, PipelineBuilder};
pub use presentation::{Identity, Outcome, PresentationState, Presenter, Projection};
pub use progress::{Emitter, Progress};
