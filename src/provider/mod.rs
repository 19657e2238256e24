//! The service provider: resolution facade, built-in registrations, and
//! provider lifecycle.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::descriptors::{AnyArc, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;
use crate::lookup::call_site::{CacheLocation, CallSiteVariant, ResultCache, ServiceCallSite};
use crate::lookup::chain::CallSiteChain;
use crate::lookup::factory::CallSiteFactory;
use crate::lookup::resolver::RUNTIME_RESOLVER;
use crate::lookup::validator::CallSiteValidator;
use crate::lookup::{ServiceCacheKey, ServiceIdentifier};
use crate::sync::{AsyncConcurrentMap, ReentrantAsyncLock};
use crate::traits::Resolver;
use crate::typed_type::TypedType;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

mod scope;

pub use scope::{Scope, ScopeFactory};
pub(crate) use scope::ScopeState;

#[derive(Default)]
struct Flags {
    disposed: bool,
    initialized: bool,
    initializing: bool,
    built_ins_added: bool,
}

struct DescriptorLists {
    committed: Vec<Arc<ServiceDescriptor>>,
    pending: Vec<Arc<ServiceDescriptor>>,
}

#[derive(Clone)]
enum RealizedService {
    /// Eagerly resolved singleton: lookups return the memoized object.
    Value(Option<AnyArc>),
    /// Execute the call site against the requested scope.
    CallSite(Arc<ServiceCallSite>),
    /// No registration matches the identifier.
    Missing,
}

#[derive(Clone)]
struct ServiceAccessor {
    call_site: Option<Arc<ServiceCallSite>>,
    realized: RealizedService,
}

pub(crate) struct ProviderShared {
    call_site_factory: Arc<CallSiteFactory>,
    validator: Option<CallSiteValidator>,
    validate_on_build: bool,
    root_state: Arc<ScopeState>,
    accessors: AsyncConcurrentMap<ServiceIdentifier, ServiceAccessor>,
    descriptors: Mutex<DescriptorLists>,
    flags: Mutex<Flags>,
    init_lock: ReentrantAsyncLock,
    child_scopes: Mutex<Vec<std::sync::Weak<ScopeState>>>,
}

/// Resolves registered services, owning the root scope and the singleton
/// cache.
///
/// Built by [`crate::ServiceCollection::build_provider`]. The provider is a
/// cheap-to-clone handle; dropping the last handle without calling
/// [`ServiceProvider::aclose`] leaks teardown, and a warning is emitted for
/// scopes still holding disposables.
///
/// # Examples
///
/// ```
/// use wirebox::{ServiceCollection, ResolverExt};
///
/// struct Counter(u32);
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Counter(7));
///
/// let provider = services.build_provider();
/// let a = provider.get_required::<Counter>().await?;
/// let b = provider.get_required::<Counter>().await?;
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// # provider.aclose().await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    pub(crate) inner: Arc<ProviderShared>,
}

impl ServiceProvider {
    pub(crate) fn new(
        descriptors: Vec<ServiceDescriptor>,
        validate_scopes: bool,
        validate_on_build: bool,
    ) -> Self {
        let descriptors: Vec<Arc<ServiceDescriptor>> =
            descriptors.into_iter().map(Arc::new).collect();

        #[cfg(feature = "logging")]
        debug!(
            target: "wirebox",
            descriptors = descriptors.len(),
            validate_scopes,
            validate_on_build,
            "building service provider"
        );

        Self {
            inner: Arc::new(ProviderShared {
                call_site_factory: Arc::new(CallSiteFactory::new(descriptors.clone())),
                validator: validate_scopes.then(CallSiteValidator::new),
                validate_on_build,
                root_state: Arc::new(ScopeState::new()),
                accessors: AsyncConcurrentMap::new(),
                descriptors: Mutex::new(DescriptorLists {
                    committed: Vec::new(),
                    pending: descriptors,
                }),
                flags: Mutex::new(Flags::default()),
                init_lock: ReentrantAsyncLock::new(),
                child_scopes: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The root scope, home of the singleton cache.
    pub fn root_scope(&self) -> Scope {
        Scope {
            provider: self.clone(),
            state: self.inner.root_state.clone(),
            is_root: true,
        }
    }

    /// Whether [`ServiceProvider::aclose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.flags.lock().unwrap().disposed
    }

    /// Whether initialization ran and no descriptors are pending.
    pub fn is_fully_initialized(&self) -> bool {
        let flags = self.inner.flags.lock().unwrap();
        flags.initialized && self.inner.descriptors.lock().unwrap().pending.is_empty()
    }

    /// Whether an unkeyed lookup of `T` would find a registration.
    pub fn is_service<T: ?Sized + 'static>(&self) -> bool {
        self.inner.call_site_factory.is_service(&TypedType::of::<T>())
    }

    /// Whether a keyed lookup of `(key, T)` would find a registration.
    pub fn is_keyed_service<T: ?Sized + 'static>(&self, key: &ServiceKey) -> bool {
        self.inner
            .call_site_factory
            .is_keyed_service(Some(key), &TypedType::of::<T>())
    }

    /// Runs initialization now: built-in registrations, auto-activated
    /// singletons, optional whole-collection validation, and promotion of
    /// pending descriptors. Idempotent; the first resolution triggers it
    /// implicitly.
    pub async fn initialize(&self) -> DiResult<()> {
        let _guard = self.inner.init_lock.acquire().await;

        {
            let mut flags = self.inner.flags.lock().unwrap();
            if flags.initializing {
                return Ok(());
            }
            let pending_empty = self.inner.descriptors.lock().unwrap().pending.is_empty();
            if flags.initialized && pending_empty {
                return Ok(());
            }
            flags.initializing = true;
        }

        let result = self.initialize_inner().await;

        {
            let mut flags = self.inner.flags.lock().unwrap();
            flags.initializing = false;
            if result.is_ok() {
                flags.initialized = true;
            }
        }

        result
    }

    async fn initialize_inner(&self) -> DiResult<()> {
        let add_built_ins = {
            let mut flags = self.inner.flags.lock().unwrap();
            let first = !flags.built_ins_added;
            flags.built_ins_added = true;
            first
        };
        if add_built_ins {
            self.add_built_in_services().await;
        }

        self.activate_auto_activated().await?;
        self.validate_services().await?;

        let mut descriptors = self.inner.descriptors.lock().unwrap();
        let pending = std::mem::take(&mut descriptors.pending);
        descriptors.committed.extend(pending);

        #[cfg(feature = "logging")]
        debug!(
            target: "wirebox",
            committed = descriptors.committed.len(),
            "service provider initialized"
        );

        Ok(())
    }

    // Registrations that exist on every provider without being described:
    // the current scope, the scope factory, and the introspection handles.
    async fn add_built_in_services(&self) {
        let factory = &self.inner.call_site_factory;

        let scope_identifier = ServiceIdentifier::of::<Scope>();
        factory
            .add(
                scope_identifier.clone(),
                Arc::new(ServiceCallSite {
                    cache: ResultCache::none(scope_identifier, ServiceCacheKey::DEFAULT_SLOT),
                    service_type: TypedType::of::<Scope>(),
                    service_key: None,
                    variant: CallSiteVariant::ServiceProvider,
                }),
            )
            .await;

        factory
            .add(
                ServiceIdentifier::of::<ScopeFactory>(),
                ServiceCallSite::constant(
                    TypedType::of::<ScopeFactory>(),
                    None,
                    Some(Arc::new(ScopeFactory {
                        provider: Arc::downgrade(&self.inner),
                    }) as AnyArc),
                    ServiceCacheKey::DEFAULT_SLOT,
                ),
            )
            .await;

        factory
            .add(
                ServiceIdentifier::of::<ServiceProviderIsService>(),
                ServiceCallSite::constant(
                    TypedType::of::<ServiceProviderIsService>(),
                    None,
                    Some(Arc::new(ServiceProviderIsService {
                        factory: factory.clone(),
                    }) as AnyArc),
                    ServiceCacheKey::DEFAULT_SLOT,
                ),
            )
            .await;

        factory
            .add(
                ServiceIdentifier::of::<ServiceProviderIsKeyedService>(),
                ServiceCallSite::constant(
                    TypedType::of::<ServiceProviderIsKeyedService>(),
                    None,
                    Some(Arc::new(ServiceProviderIsKeyedService {
                        factory: factory.clone(),
                    }) as AnyArc),
                    ServiceCacheKey::DEFAULT_SLOT,
                ),
            )
            .await;
    }

    async fn activate_auto_activated(&self) -> DiResult<()> {
        let pending = self.inner.descriptors.lock().unwrap().pending.clone();
        let root = self.root_scope();

        for descriptor in pending {
            if !descriptor.auto_activate() {
                continue;
            }

            #[cfg(feature = "logging")]
            debug!(target: "wirebox", descriptor = ?descriptor, "auto-activating");

            self.resolve_identifier(ServiceIdentifier::from_descriptor(&descriptor), &root)
                .await?;
        }

        Ok(())
    }

    async fn validate_services(&self) -> DiResult<()> {
        if !self.inner.validate_on_build {
            return Ok(());
        }

        let pending = self.inner.descriptors.lock().unwrap().pending.clone();
        let mut errors = Vec::new();

        for descriptor in pending {
            if let Err(error) = self.validate_descriptor(&descriptor).await {
                errors.push(DiError::ValidationFailed {
                    descriptor: format!("{:?}", descriptor),
                    source: Box::new(error),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::Aggregate(errors))
        }
    }

    async fn validate_descriptor(&self, descriptor: &Arc<ServiceDescriptor>) -> DiResult<()> {
        let mut chain = CallSiteChain::new();
        let call_site = self
            .inner
            .call_site_factory
            .get_call_site_for_descriptor(descriptor, &mut chain)
            .await?;

        if let Some(call_site) = call_site {
            self.on_create(&call_site).await?;
        }

        Ok(())
    }

    /// Creates a child scope for scoped resolution.
    pub fn create_scope(&self) -> DiResult<Scope> {
        if self.is_disposed() {
            return Err(DiError::ObjectDisposed("ServiceProvider"));
        }

        let state = Arc::new(ScopeState::new());
        {
            let mut scopes = self.inner.child_scopes.lock().unwrap();
            scopes.retain(|weak| weak.strong_count() > 0);
            scopes.push(Arc::downgrade(&state));
        }

        #[cfg(feature = "logging")]
        trace!(target: "wirebox", "created scope");

        Ok(Scope {
            provider: self.clone(),
            state,
            is_root: false,
        })
    }

    /// Temporarily replaces the unkeyed registration of `T` with a fixed
    /// value; dropping the guard restores the previous behavior. Overrides
    /// stack, and lookups observe the top of the stack.
    #[must_use = "the override is removed when the guard is dropped"]
    pub fn override_service<T: Send + Sync + 'static>(&self, value: T) -> OverrideGuard {
        self.override_identifier(
            ServiceIdentifier::of::<T>(),
            Some(Arc::new(value) as AnyArc),
        )
    }

    /// Temporarily replaces the keyed registration of `(key, T)`.
    #[must_use = "the override is removed when the guard is dropped"]
    pub fn override_keyed_service<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
        value: T,
    ) -> OverrideGuard {
        self.override_identifier(
            ServiceIdentifier::keyed(TypedType::of::<T>(), key),
            Some(Arc::new(value) as AnyArc),
        )
    }

    fn override_identifier(
        &self,
        identifier: ServiceIdentifier,
        value: Option<AnyArc>,
    ) -> OverrideGuard {
        self.inner
            .call_site_factory
            .add_override(identifier.clone(), value);
        OverrideGuard {
            factory: self.inner.call_site_factory.clone(),
            identifier,
        }
    }

    /// Registers a descriptor after the provider was built. Call sites and
    /// accessors cached for the service type are invalidated, while
    /// already-materialized singleton instances keep their identity.
    pub async fn add_descriptor(&self, descriptor: ServiceDescriptor) {
        let descriptor = Arc::new(descriptor);
        let identifier = ServiceIdentifier::from_descriptor(&descriptor);

        #[cfg(feature = "logging")]
        debug!(target: "wirebox", descriptor = ?descriptor, "adding descriptor post-build");

        self.inner
            .descriptors
            .lock()
            .unwrap()
            .pending
            .push(descriptor.clone());
        self.inner.call_site_factory.add_descriptor(descriptor);

        self.inner.accessors.try_remove(&identifier).await;

        let sequence_type = TypedType::sequence_of(identifier.service_type().clone());
        self.inner
            .accessors
            .try_remove(&ServiceIdentifier::new(
                sequence_type.clone(),
                identifier.service_key().cloned(),
            ))
            .await;
        if identifier.service_key().is_some() {
            self.inner
                .accessors
                .try_remove(&ServiceIdentifier::keyed(sequence_type, ServiceKey::Any))
                .await;
        }
    }

    /// Disposes the provider: still-live child scopes first (most recent
    /// first), then the root scope with every captured singleton
    /// disposable. Idempotent.
    pub async fn aclose(&self) -> DiResult<()> {
        {
            let mut flags = self.inner.flags.lock().unwrap();
            if flags.disposed {
                return Ok(());
            }
            flags.disposed = true;
        }

        #[cfg(feature = "logging")]
        debug!(target: "wirebox", "disposing service provider");

        let children: Vec<Arc<ScopeState>> = {
            let mut scopes = self.inner.child_scopes.lock().unwrap();
            scopes.drain(..).filter_map(|weak| weak.upgrade()).collect()
        };

        let mut failure = None;

        for state in children.into_iter().rev() {
            let scope = Scope {
                provider: self.clone(),
                state,
                is_root: false,
            };
            if let Err(error) = scope.dispose().await {
                failure = Some(error);
            }
        }

        if let Err(error) = self.root_scope().dispose().await {
            failure = Some(error);
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub(crate) async fn get_service_with_scope(
        &self,
        identifier: ServiceIdentifier,
        scope: &Scope,
    ) -> DiResult<Option<AnyArc>> {
        if self.is_disposed() {
            return Err(DiError::ObjectDisposed("ServiceProvider"));
        }

        if !self.is_fully_initialized() {
            self.initialize().await?;
        }

        self.resolve_identifier(identifier, scope).await
    }

    async fn resolve_identifier(
        &self,
        identifier: ServiceIdentifier,
        scope: &Scope,
    ) -> DiResult<Option<AnyArc>> {
        // Overrides bypass the accessor cache entirely so popping one
        // restores the registered behavior.
        if let Some(call_site) = self
            .inner
            .call_site_factory
            .get_overridden_call_site(&identifier)
        {
            return RUNTIME_RESOLVER.resolve(&call_site, scope).await;
        }

        let accessor = self
            .inner
            .accessors
            .get_or_add(identifier, |id| self.create_service_accessor(id))
            .await?;

        if let (Some(validator), Some(call_site)) = (
            self.inner.validator.as_ref(),
            accessor.call_site.as_ref(),
        ) {
            validator.validate_resolution(call_site, scope.is_root())?;
        }

        match &accessor.realized {
            RealizedService::Value(value) => Ok(value.clone()),
            RealizedService::CallSite(call_site) => {
                RUNTIME_RESOLVER.resolve(call_site, scope).await
            }
            RealizedService::Missing => Ok(None),
        }
    }

    async fn create_service_accessor(
        &self,
        identifier: ServiceIdentifier,
    ) -> DiResult<ServiceAccessor> {
        let mut chain = CallSiteChain::new();
        let call_site = self
            .inner
            .call_site_factory
            .get_call_site(identifier, &mut chain)
            .await?;

        let Some(call_site) = call_site else {
            return Ok(ServiceAccessor {
                call_site: None,
                realized: RealizedService::Missing,
            });
        };

        self.on_create(&call_site).await?;

        // Singletons resolve once, eagerly, and the accessor short-circuits
        // every later lookup to the memoized object.
        if call_site.cache.location == CacheLocation::Root {
            let value = RUNTIME_RESOLVER.resolve(&call_site, &self.root_scope()).await?;
            return Ok(ServiceAccessor {
                call_site: Some(call_site),
                realized: RealizedService::Value(value),
            });
        }

        Ok(ServiceAccessor {
            call_site: Some(call_site.clone()),
            realized: RealizedService::CallSite(call_site),
        })
    }

    async fn on_create(&self, call_site: &Arc<ServiceCallSite>) -> DiResult<()> {
        if let Some(validator) = &self.inner.validator {
            validator.validate_call_site(call_site).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resolver for ServiceProvider {
    async fn resolve_object(&self, identifier: ServiceIdentifier) -> DiResult<Option<AnyArc>> {
        let root = self.root_scope();
        self.get_service_with_scope(identifier, &root).await
    }
}

/// Guard for a scoped service override; the override is popped when the
/// guard is dropped.
#[must_use = "the override is removed when the guard is dropped"]
pub struct OverrideGuard {
    factory: Arc<CallSiteFactory>,
    identifier: ServiceIdentifier,
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        self.factory.remove_override(&self.identifier);
    }
}

/// Introspection handle answering "would an unkeyed lookup succeed".
/// Registered as a built-in; injectable into services that need to probe
/// the container without resolving.
pub struct ServiceProviderIsService {
    pub(crate) factory: Arc<CallSiteFactory>,
}

impl ServiceProviderIsService {
    /// Whether `T` is resolvable without a key.
    pub fn is_service<T: ?Sized + 'static>(&self) -> bool {
        self.factory.is_service(&TypedType::of::<T>())
    }
}

/// Introspection handle answering "would a keyed lookup succeed".
pub struct ServiceProviderIsKeyedService {
    pub(crate) factory: Arc<CallSiteFactory>,
}

impl ServiceProviderIsKeyedService {
    /// Whether `(key, T)` is resolvable.
    pub fn is_keyed_service<T: ?Sized + 'static>(&self, key: &ServiceKey) -> bool {
        self.factory
            .is_keyed_service(Some(key), &TypedType::of::<T>())
    }

    /// Whether `T` is resolvable without a key.
    pub fn is_service<T: ?Sized + 'static>(&self) -> bool {
        self.factory.is_service(&TypedType::of::<T>())
    }
}
