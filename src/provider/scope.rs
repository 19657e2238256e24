//! Scopes: lifetime boundaries with per-scope caches and ordered teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;

use crate::descriptors::AnyArc;
use crate::error::{DiError, DiResult};
use crate::internal::{dispose_all_reverse, Disposer};
use crate::lookup::{ServiceCacheKey, ServiceIdentifier};
use crate::sync::ReentrantAsyncLock;
use crate::traits::{AsyncDispose, Dispose, Resolver};

use super::{ProviderShared, ServiceProvider};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Lifecycle {
    Active,
    Disposing,
    Disposed,
}

struct ScopeData {
    // Dense storage: cache key -> index into `resolved`. Teardown and
    // iteration never chase hash buckets.
    resolved_index: HashMap<ServiceCacheKey, usize>,
    resolved: Vec<AnyArc>,
    disposables: Vec<Disposer>,
    lifecycle: Lifecycle,
}

pub(crate) struct ScopeState {
    sync_lock: ReentrantAsyncLock,
    data: Mutex<ScopeData>,
}

impl ScopeState {
    pub(crate) fn new() -> Self {
        Self {
            sync_lock: ReentrantAsyncLock::new(),
            data: Mutex::new(ScopeData {
                resolved_index: HashMap::new(),
                resolved: Vec::new(),
                disposables: Vec::new(),
                lifecycle: Lifecycle::Active,
            }),
        }
    }

    pub(crate) fn sync_lock(&self) -> &ReentrantAsyncLock {
        &self.sync_lock
    }

    pub(crate) fn get_resolved(&self, key: &ServiceCacheKey) -> Option<AnyArc> {
        let data = self.data.lock().unwrap();
        data.resolved_index
            .get(key)
            .map(|index| data.resolved[*index].clone())
    }

    pub(crate) fn store_resolved(&self, key: ServiceCacheKey, value: AnyArc) {
        let mut data = self.data.lock().unwrap();
        let index = data.resolved.len();
        data.resolved.push(value);
        data.resolved_index.insert(key, index);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.data.lock().unwrap().lifecycle != Lifecycle::Active
    }

    // Accepts the hook while active, hands it back once teardown started.
    fn try_push_disposable(&self, disposer: Disposer) -> Result<(), Disposer> {
        let mut data = self.data.lock().unwrap();
        if data.lifecycle != Lifecycle::Active {
            return Err(disposer);
        }
        data.disposables.push(disposer);
        Ok(())
    }

    fn begin_dispose(&self) -> Option<Vec<Disposer>> {
        let mut data = self.data.lock().unwrap();
        if data.lifecycle != Lifecycle::Active {
            return None;
        }
        data.lifecycle = Lifecycle::Disposing;
        Some(std::mem::take(&mut data.disposables))
    }

    fn finish_dispose(&self) {
        self.data.lock().unwrap().lifecycle = Lifecycle::Disposed;
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        let data = self.data.get_mut().unwrap();
        if data.lifecycle == Lifecycle::Active && !data.disposables.is_empty() {
            #[cfg(feature = "logging")]
            tracing::warn!(
                target: "wirebox",
                undisposed = data.disposables.len(),
                "scope dropped with undisposed resources; call dispose().await before dropping"
            );
            #[cfg(not(feature = "logging"))]
            eprintln!(
                "[wirebox] Scope dropped with {} undisposed resource(s). \
                 Call dispose().await before dropping.",
                data.disposables.len()
            );
        }
    }
}

/// A lifetime boundary for scoped services.
///
/// A scope memoizes scoped services, captures disposables produced inside
/// it, and tears them down in reverse capture order on [`Scope::dispose`].
/// The provider owns one root scope, home of the singletons; user scopes
/// come from [`ServiceProvider::create_scope`].
///
/// # Examples
///
/// ```
/// use wirebox::{Lifetime, ServiceCollection, ServiceDescriptor, ResolverExt};
/// use std::sync::Arc;
///
/// struct Session { id: u32 }
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));
/// let c = counter.clone();
/// services.add_scoped_factory(move |_| Session {
///     id: c.fetch_add(1, std::sync::atomic::Ordering::SeqCst),
/// });
///
/// let provider = services.build_provider();
/// let scope = provider.create_scope()?;
/// let a = scope.get_required::<Session>().await?;
/// let b = scope.get_required::<Session>().await?;
/// assert!(Arc::ptr_eq(&a, &b)); // memoized per scope
/// scope.dispose().await?;
/// # provider.aclose().await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Scope {
    pub(crate) provider: ServiceProvider,
    pub(crate) state: Arc<ScopeState>,
    pub(crate) is_root: bool,
}

impl Scope {
    /// The provider this scope belongs to.
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Whether this is the provider's root scope.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Whether teardown has started.
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Creates a sibling scope from the owning provider.
    pub fn create_scope(&self) -> DiResult<Scope> {
        self.provider.create_scope()
    }

    /// Registers a service for synchronous teardown when this scope is
    /// disposed. Factory-built services use this to participate in
    /// teardown.
    pub async fn register_disposer<T: Dispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.capture_disposable(Disposer::sync(move || service.dispose()))
            .await
    }

    /// Registers a service for asynchronous teardown when this scope is
    /// disposed.
    pub async fn register_async_disposer<T: AsyncDispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.capture_disposable(Disposer::asynchronous(move || async move {
            service.dispose().await
        }))
        .await
    }

    /// Tears the scope down: no further disposables are accepted, and the
    /// captured hooks run in reverse capture order. Disposing the root
    /// scope disposes the provider. Idempotent.
    pub async fn dispose(&self) -> DiResult<()> {
        let to_dispose = {
            let _guard = self.state.sync_lock.acquire().await;
            self.state.begin_dispose()
        };

        let Some(disposables) = to_dispose else {
            return Ok(());
        };

        let mut failure = None;

        if self.is_root && !self.provider.is_disposed() {
            // The root scope and the provider share a lifetime; whichever
            // is torn down first takes the other with it.
            if let Err(error) = Box::pin(self.provider.aclose()).await {
                failure = Some(error);
            }
        }

        let result = dispose_all_reverse(disposables).await;
        self.state.finish_dispose();

        match (result, failure) {
            (Err(error), _) => Err(error),
            (Ok(()), Some(error)) => Err(error),
            (Ok(()), None) => Ok(()),
        }
    }

    pub(crate) fn state(&self) -> &ScopeState {
        &self.state
    }

    pub(crate) async fn capture_disposable(&self, disposer: Disposer) -> DiResult<()> {
        let rejected = {
            let _guard = self.state.sync_lock.acquire().await;
            self.state.try_push_disposable(disposer)
        };

        match rejected {
            Ok(()) => Ok(()),
            Err(disposer) => {
                // The scope is already gone; release the instance
                // immediately, outside the lock, then report the misuse.
                disposer.dispose().await?;
                Err(DiError::ObjectDisposed("ServiceProvider"))
            }
        }
    }
}

#[async_trait]
impl Resolver for Scope {
    async fn resolve_object(&self, identifier: ServiceIdentifier) -> DiResult<Option<AnyArc>> {
        self.provider.get_service_with_scope(identifier, self).await
    }
}

/// Factory handle for creating scopes, resolvable by singletons.
///
/// Holds a weak provider reference: a singleton depending on the factory
/// does not keep the provider alive through its own cache.
pub struct ScopeFactory {
    pub(crate) provider: Weak<ProviderShared>,
}

impl ScopeFactory {
    /// Creates a new scope from the owning provider.
    pub fn create_scope(&self) -> DiResult<Scope> {
        let inner = self
            .provider
            .upgrade()
            .ok_or(DiError::ObjectDisposed("ServiceProvider"))?;
        ServiceProvider { inner }.create_scope()
    }
}
