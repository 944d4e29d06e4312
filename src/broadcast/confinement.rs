//! # Where a store's single writer runs.
//!
//! Every [`Store`](crate::Store) serializes its mutations on one writer task. The
//! [`Confinement`] decides which tokio runtime hosts that task, for example a
//! dedicated runtime driving a UI loop.

use tokio::runtime::Handle;

use crate::error::BuildError;

/// Executor a store's writer task is confined to.
#[derive(Clone, Debug, Default)]
pub enum Confinement {
    /// The runtime the store is constructed on.
    #[default]
    Current,
    /// An explicit runtime.
    On(Handle),
}

impl Confinement {
    /// Resolves the runtime handle, failing construction when none is reachable.
    pub(crate) fn resolve(&self) -> Result<Handle, BuildError> {
        match self {
            Confinement::Current => Handle::try_current().map_err(|_| BuildError::NoRuntime),
            Confinement::On(handle) => Ok(handle.clone()),
        }
    }
}
