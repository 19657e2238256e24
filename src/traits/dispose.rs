//! Disposal traits for resource cleanup.

use crate::error::DiResult;

/// Trait for synchronous resource disposal.
///
/// Services implementing `Dispose` can hand a teardown hook to the scope
/// that resolved them, either through [`crate::Scope::register_disposer`]
/// or a constructor's dispose hook. Hooks run in reverse capture order
/// when the scope is disposed; a failing hook's error propagates only
/// after every remaining hook has been attempted.
///
/// # Examples
///
/// ```
/// use wirebox::{Dispose, DiResult, ResolverExt, ServiceCollection};
/// use std::sync::Arc;
///
/// struct SpoolFile {
///     path: &'static str,
/// }
///
/// impl Dispose for SpoolFile {
///     fn dispose(&self) -> DiResult<()> {
///         println!("removing spool file {}", self.path);
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_scoped_async_factory(|scope| async move {
///     let spool = Arc::new(SpoolFile { path: "/tmp/outbox" });
///     scope.register_disposer(spool.clone()).await?;
///     Ok(spool)
/// });
///
/// let provider = services.build_provider();
/// let scope = provider.create_scope()?;
/// let spool = scope.get_required::<Arc<SpoolFile>>().await?;
/// assert_eq!(spool.path, "/tmp/outbox");
///
/// scope.dispose().await?; // runs SpoolFile::dispose
/// # provider.aclose().await?;
/// # Ok(()) }
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> DiResult<()>;
}

/// Trait for asynchronous resource disposal.
///
/// The async counterpart of [`Dispose`], registered through
/// [`crate::Scope::register_async_disposer`]. Async hooks join the same
/// reverse-ordered teardown walk as sync hooks; a singleton's hook lands
/// in the root scope and runs when the provider closes.
///
/// # Examples
///
/// ```
/// use wirebox::{AsyncDispose, DiResult, ResolverExt, ServiceCollection};
/// use async_trait::async_trait;
/// use std::sync::{Arc, Mutex};
///
/// struct EventPublisher {
///     pending: Mutex<Vec<String>>,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for EventPublisher {
///     async fn dispose(&self) -> DiResult<()> {
///         // flush whatever is still queued
///         self.pending.lock().unwrap().clear();
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_singleton_async_factory(|scope| async move {
///     let publisher = Arc::new(EventPublisher {
///         pending: Mutex::new(Vec::new()),
///     });
///     scope.register_async_disposer(publisher.clone()).await?;
///     Ok(publisher)
/// });
///
/// let provider = services.build_provider();
/// let publisher = provider.get_required::<Arc<EventPublisher>>().await?;
/// publisher.pending.lock().unwrap().push("startup".to_string());
///
/// provider.aclose().await?; // awaits EventPublisher::dispose
/// # Ok(()) }
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self) -> DiResult<()>;
}
