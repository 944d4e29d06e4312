//! # Mapping operation snapshots into subscriber-owned views.
//!
//! A [`Projection`] has no `self`: the mapping can depend only on the snapshot and the
//! explicitly passed prior view. It cannot hold clients, caches, or other hidden state.

use std::marker::PhantomData;

/// Pure, total mapping from an operation's snapshot to a presentation view.
///
/// `prior` is the last good view of an earlier invocation. It stays the same for every
/// snapshot of one invocation; the live view of the current invocation is never passed
/// back, so a projection cannot accumulate across snapshots.
///
/// If writing `project` needs real business logic, the snapshot type is missing a
/// field and the operation should compute it instead.
///
/// # Example
/// ```
/// use uniflow::Projection;
///
/// struct Percent;
///
/// impl Projection for Percent {
///     type Snapshot = (u32, u32);
///     type View = u8;
///
///     fn project((done, total): (u32, u32), _prior: Option<&u8>) -> u8 {
///         if total == 0 { 0 } else { (done * 100 / total) as u8 }
///     }
/// }
///
/// assert_eq!(Percent::project((1, 4), None), 25);
/// ```
pub trait Projection: Send + Sync + 'static {
    /// Operation-owned snapshot type.
    type Snapshot: Send + 'static;
    /// Subscriber-owned view type.
    type View: Clone + Send + Sync + 'static;

    /// Builds the view for `snapshot`.
    fn project(snapshot: Self::Snapshot, prior: Option<&Self::View>) -> Self::View;
}

/// Projection that presents snapshots unchanged.
pub struct Identity<S>(PhantomData<fn() -> S>);

impl<S> Projection for Identity<S>
where
    S: Clone + Send + Sync + 'static,
{
    type Snapshot = S;
    type View = S;

    #[inline]
    fn project(snapshot: S, _prior: Option<&S>) -> S {
        snapshot
    }
}
