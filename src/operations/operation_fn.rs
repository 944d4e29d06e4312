//! # Function-backed operation (`OperationFn`)
//!
//! [`OperationFn`] wraps a closure `F: Fn(O) -> Fut`, producing a fresh future per call.
//! This is the usual shape for leaf sub-operations injected into orchestrators.
//!
//! ## Concurrency semantics
//! - Each call to [`Operation::run`] creates a **new** future owning its own state.
//! - No hidden mutation between calls; if shared state is needed, capture an `Arc<...>`
//!   explicitly inside the closure.
//!
//! ## Example
//! ```rust
//! use uniflow::{Operation, OperationError, OperationFn, OperationRef};
//!
//! let fetch: OperationRef<String, usize> = OperationFn::arc("fetch", |url: String| async move {
//!     Ok::<_, OperationError>(url.len())
//! });
//!
//! assert_eq!(fetch.name(), "fetch");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OperationError;
use crate::operations::Operation;

/// Function-backed operation implementation.
pub struct OperationFn<F, O, R> {
    name: Cow<'static, str>,
    f: F,
    _io: PhantomData<fn(O) -> R>,
}

impl<F, O, R> OperationFn<F, O, R> {
    /// Creates a new function-backed operation.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _io: PhantomData,
        }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut, O, R> Operation for OperationFn<F, O, R>
where
    F: Fn(O) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, OperationError>> + Send + 'static,
    O: Send + 'static,
    R: Send + 'static,
{
    type Options = O;
    type Output = R;

    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, options: O) -> Result<R, OperationError> {
        (self.f)(options).await
    }
}
