//! State ownership boundary between operations and their observers.
//!
//! - [`Projection`] the pure snapshot → view mapping ([`Identity`] passes snapshots through)
//! - [`PresentationState`] the subscriber-owned state machine
//! - [`Presenter`] follows invocations and broadcasts the state; [`Outcome`] reports how a call ended
//!
//! Snapshots belong to the operation; the presentation state belongs to the presenter and
//! is the only thing observers hold as "current".

mod presenter;
mod projection;
mod state;

pub use presenter::{Outcome, Presenter};
pub use projection::{Identity, Projection};
pub use state::PresentationState;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::broadcast::StoreConfig;
    use crate::error::OperationError;
    use crate::operations::StreamingOperation;
    use crate::progress::Emitter;

    use PresentationState::*;

    /// Emits `emits`, then fails with `fail` or hangs when asked to.
    #[derive(Clone, Default)]
    struct Script {
        emits: Vec<u32>,
        fail: Option<&'static str>,
        hang: bool,
    }

    struct Player;

    #[async_trait]
    impl StreamingOperation for Player {
        type Options = Script;
        type State = u32;

        async fn drive(
            &self,
            script: Script,
            progress: &Emitter<u32>,
        ) -> Result<(), OperationError> {
            for v in script.emits {
                progress.emit(v).await;
            }
            if script.hang {
                std::future::pending::<()>().await;
            }
            match script.fail {
                Some(reason) => Err(OperationError::fail(reason)),
                None => Ok(()),
            }
        }
    }

    fn emits(values: &[u32]) -> Script {
        Script {
            emits: values.to_vec(),
            ..Script::default()
        }
    }

    fn presenter() -> Presenter<Identity<u32>> {
        Presenter::new("screen", StoreConfig::default()).expect("presenter")
    }

    async fn wait_until_operating(p: &Presenter<Identity<u32>>) {
        loop {
            if let Some(Operating { .. }) = p.state().await {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_retry_keeps_prior_through_pure_transitions() {
        let x = Ready(2u32);
        let failed = x.begin().fail(OperationError::fail("offline"));
        assert_eq!(failed.last_good(), Some(&2));

        let operating = failed.begin().advance::<Identity<u32>>(5);
        assert_eq!(
            operating,
            Operating {
                live: 5,
                prior: Some(2)
            }
        );
        assert_eq!(operating.complete(), Ready(5));
    }

    #[test]
    fn test_completion_without_snapshot_is_empty_failure() {
        let state = Ready(1u32).begin().complete();
        assert_eq!(
            state,
            Failed {
                error: OperationError::Empty,
                prior: Some(1)
            }
        );
    }

    #[test]
    fn test_abort_falls_back_to_last_good() {
        assert_eq!(PresentationState::<u32>::Uninitialized.begin().abort(), Uninitialized);
        let state = Ready(4u32).begin().advance::<Identity<u32>>(9).abort();
        assert_eq!(state, Ready(4));
    }

    #[tokio::test]
    async fn test_failed_run_retried_never_loses_prior() {
        let p = presenter();
        let mut sub = p.observe();
        let op = Arc::new(Player);

        assert_eq!(p.perform(op.clone(), emits(&[1, 2])).await, Outcome::Completed);
        let failing = Script {
            fail: Some("offline"),
            ..Script::default()
        };
        assert_eq!(
            p.perform(op.clone(), failing).await,
            Outcome::Failed(OperationError::fail("offline"))
        );
        assert_eq!(p.perform(op, emits(&[5, 7])).await, Outcome::Completed);

        let mut seen = Vec::new();
        for _ in 0..11 {
            seen.push(sub.next().await.expect("state"));
        }
        let live = |live: u32, prior: Option<u32>| Operating { live, prior };
        let error = OperationError::fail("offline");
        assert_eq!(
            seen,
            vec![
                Uninitialized,
                Loading { prior: None },
                live(1, None),
                live(2, None),
                Ready(2),
                Loading { prior: Some(2) },
                Failed {
                    error,
                    prior: Some(2)
                },
                Loading { prior: Some(2) },
                live(5, Some(2)),
                live(7, Some(2)),
                Ready(7),
            ]
        );
    }

    #[tokio::test]
    async fn test_new_invocation_supersedes_in_flight_one() {
        let p = presenter();
        let background = p.clone();
        let first = tokio::spawn(async move {
            let hanging = Script {
                emits: vec![1],
                hang: true,
                ..Script::default()
            };
            background.perform(Arc::new(Player), hanging).await
        });
        wait_until_operating(&p).await;

        assert_eq!(p.perform(Arc::new(Player), emits(&[9])).await, Outcome::Completed);
        assert_eq!(first.await.expect("join"), Outcome::Superseded);
        assert_eq!(p.state().await, Some(Ready(9)));
    }

    #[tokio::test]
    async fn test_cancel_reverts_to_last_good() {
        let p = presenter();
        let background = p.clone();
        let run = tokio::spawn(async move {
            let hanging = Script {
                emits: vec![3],
                hang: true,
                ..Script::default()
            };
            background.perform(Arc::new(Player), hanging).await
        });
        wait_until_operating(&p).await;

        p.cancel();
        p.cancel();
        assert_eq!(run.await.expect("join"), Outcome::Cancelled);
        assert_eq!(p.state().await, Some(Uninitialized));
    }

    /// Highest of the snapshot and the last good view of an earlier invocation.
    struct Peak;

    impl Projection for Peak {
        type Snapshot = u32;
        type View = u32;

        fn project(snapshot: u32, prior: Option<&u32>) -> u32 {
            snapshot.max(prior.copied().unwrap_or(0))
        }
    }

    #[tokio::test]
    async fn test_projection_receives_prior_view() {
        let p: Presenter<Peak> = Presenter::new("peak", StoreConfig::default()).expect("presenter");
        p.perform(Arc::new(Player), emits(&[3, 1])).await;
        assert_eq!(p.state().await, Some(Ready(1)));

        p.perform(Arc::new(Player), emits(&[2, 0])).await;
        assert_eq!(p.state().await, Some(Ready(1)));
    }

    /// Pairs each snapshot with the snapshot of the prior view it was given.
    struct Tagged;

    impl Projection for Tagged {
        type Snapshot = u32;
        type View = (u32, Option<u32>);

        fn project(snapshot: u32, prior: Option<&(u32, Option<u32>)>) -> (u32, Option<u32>) {
            (snapshot, prior.map(|view| view.0))
        }
    }

    #[test]
    fn test_every_snapshot_is_projected_against_the_same_prior() {
        let state = Ready((10, None))
            .begin()
            .advance::<Tagged>(1)
            .advance::<Tagged>(2);
        assert_eq!(
            state,
            Operating {
                live: (2, Some(10)),
                prior: Some((10, None))
            }
        );
    }

    #[tokio::test]
    async fn test_completed_run_followed_immediately_by_failure_keeps_prior() {
        let p = presenter();
        let op = Arc::new(Player);

        assert_eq!(p.perform(op.clone(), emits(&[2])).await, Outcome::Completed);
        let failing = Script {
            fail: Some("offline"),
            ..Script::default()
        };
        assert_eq!(
            p.perform(op, failing).await,
            Outcome::Failed(OperationError::fail("offline"))
        );
        assert_eq!(
            p.state().await,
            Some(Failed {
                error: OperationError::fail("offline"),
                prior: Some(2)
            })
        );
    }

    #[tokio::test]
    async fn test_follow_externally_started_stream() {
        let p = presenter();
        let (emitter, progress) = crate::progress::channel::<u32>(4);
        tokio::spawn(async move {
            for v in [4, 6] {
                if !emitter.emit(v).await {
                    return;
                }
            }
            emitter.finish().await;
        });

        assert_eq!(p.follow(progress).await, Outcome::Completed);
        assert_eq!(p.state().await, Some(Ready(6)));
    }

    #[tokio::test]
    async fn test_terminal_received_after_supersession_reports_superseded() {
        let p = presenter();
        let (first_tx, first_rx) = crate::progress::channel::<u32>(4);
        let background = p.clone();
        let first = tokio::spawn(async move { background.follow(first_rx).await });
        assert!(first_tx.emit(1).await);
        wait_until_operating(&p).await;

        // The failure is queued for the first follower, but the second one starts
        // before the first gets to run again.
        first_tx.fail(OperationError::fail("late")).await;
        let (second_tx, second_rx) = crate::progress::channel::<u32>(4);
        let mut second = Box::pin(p.follow(second_rx));
        assert!(futures::poll!(second.as_mut()).is_pending());

        assert!(second_tx.emit(9).await);
        second_tx.finish().await;
        assert_eq!(second.await, Outcome::Completed);
        assert_eq!(first.await.expect("join"), Outcome::Superseded);
        assert_eq!(p.state().await, Some(Ready(9)));
    }
}
