//! Teardown hooks captured by scopes.

use std::future::Future;
use std::pin::Pin;

use crate::error::DiResult;

/// Future type for asynchronous teardown hooks.
pub(crate) type BoxFutureUnit = Pin<Box<dyn Future<Output = DiResult<()>> + Send>>;

/// A captured teardown hook, run exactly once on scope teardown.
pub(crate) enum Disposer {
    Sync(Box<dyn FnOnce() -> DiResult<()> + Send>),
    Async(Box<dyn FnOnce() -> BoxFutureUnit + Send>),
}

impl Disposer {
    pub(crate) fn sync<F>(f: F) -> Self
    where
        F: FnOnce() -> DiResult<()> + Send + 'static,
    {
        Disposer::Sync(Box::new(f))
    }

    pub(crate) fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        Disposer::Async(Box::new(move || Box::pin(f())))
    }

    pub(crate) async fn dispose(self) -> DiResult<()> {
        match self {
            Disposer::Sync(f) => f(),
            Disposer::Async(f) => f().await,
        }
    }
}

/// Runs every hook in reverse insertion order. Teardown is best-effort:
/// every hook is attempted, and the error raised latest in the walk (if
/// any) is the one that propagates.
pub(crate) async fn dispose_all_reverse(mut disposers: Vec<Disposer>) -> DiResult<()> {
    let mut failure = None;

    while let Some(disposer) = disposers.pop() {
        if let Err(error) = disposer.dispose().await {
            failure = Some(error);
        }
    }

    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
