//! Service registration: the collection of descriptors a provider is built
//! from.

use std::future::Future;
use std::sync::Arc;

use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::injection::Injectable;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::provider::{Scope, ServiceProvider};
use crate::typed_type::TypedType;

/// Collection of service descriptors provided during configuration.
///
/// Registration methods follow a `lifetime × implementation form` grid:
/// instances, [`Injectable`] implementation types, factories, async
/// factories, setup factories (value + teardown), trait objects, and keyed
/// variants of each. Later registrations of the same identifier win for
/// single-service lookups; [`crate::ResolverExt::get_services`] returns all
/// of them in declaration order.
///
/// # Examples
///
/// ```
/// use wirebox::{ServiceCollection, ResolverExt};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_transient_async_factory(|scope| async move {
///     Ok(UserService {
///         db: scope.get_required::<Database>().await?,
///     })
/// });
///
/// let provider = services.build_provider();
/// let users = provider.get_required::<UserService>().await?;
/// assert_eq!(users.db.url, "postgres://localhost");
/// # provider.aclose().await?;
/// # Ok(()) }
/// ```
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    /// Creates an empty service collection.
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    /// Adds a fully built descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// The registered descriptors, in declaration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    // ----- Instances -----

    /// Registers a singleton instance shared across the provider.
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add(ServiceDescriptor::instance(value))
    }

    /// Registers a keyed singleton instance.
    pub fn add_keyed_singleton<T: Send + Sync + 'static>(
        &mut self,
        key: ServiceKey,
        value: T,
    ) -> &mut Self {
        self.add(ServiceDescriptor::keyed_instance(key, value))
    }

    /// Registers a singleton trait object, resolvable with
    /// [`crate::ResolverExt::get_trait`].
    pub fn add_singleton_trait<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        value: Arc<T>,
    ) -> &mut Self {
        self.add(ServiceDescriptor::trait_instance(value))
    }

    // ----- Injectable implementation types -----

    /// Registers a singleton activated through `T`'s declared constructor.
    pub fn add_singleton_injectable<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::injectable::<T>(Lifetime::Singleton))
    }

    /// Registers a scoped service activated through `T`'s constructor.
    pub fn add_scoped_injectable<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::injectable::<T>(Lifetime::Scoped))
    }

    /// Registers a transient service activated through `T`'s constructor.
    pub fn add_transient_injectable<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::injectable::<T>(Lifetime::Transient))
    }

    /// Registers a keyed singleton implementation type.
    pub fn add_keyed_singleton_injectable<T: Injectable>(&mut self, key: ServiceKey) -> &mut Self {
        self.add(ServiceDescriptor::keyed_injectable::<T>(
            key,
            Lifetime::Singleton,
        ))
    }

    /// Registers a keyed scoped implementation type.
    pub fn add_keyed_scoped_injectable<T: Injectable>(&mut self, key: ServiceKey) -> &mut Self {
        self.add(ServiceDescriptor::keyed_injectable::<T>(
            key,
            Lifetime::Scoped,
        ))
    }

    /// Registers a keyed transient implementation type.
    pub fn add_keyed_transient_injectable<T: Injectable>(&mut self, key: ServiceKey) -> &mut Self {
        self.add(ServiceDescriptor::keyed_injectable::<T>(
            key,
            Lifetime::Transient,
        ))
    }

    // ----- Sync factories -----

    /// Registers a singleton built by a factory on first request.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Singleton, factory))
    }

    /// Registers a scoped service built by a factory once per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Scoped, factory))
    }

    /// Registers a transient service built by a factory on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Transient, factory))
    }

    /// Registers a keyed transient factory receiving the resolved key.
    pub fn add_keyed_transient_factory<T, F>(&mut self, key: ServiceKey, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceKey, &Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::keyed_factory(
            key,
            Lifetime::Transient,
            factory,
        ))
    }

    /// Registers a keyed scoped factory.
    pub fn add_keyed_scoped_factory<T, F>(&mut self, key: ServiceKey, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceKey, &Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::keyed_factory(
            key,
            Lifetime::Scoped,
            factory,
        ))
    }

    /// Registers a keyed singleton factory.
    pub fn add_keyed_singleton_factory<T, F>(&mut self, key: ServiceKey, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceKey, &Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::keyed_factory(
            key,
            Lifetime::Singleton,
            factory,
        ))
    }

    /// Registers a trait-object factory.
    pub fn add_singleton_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> Arc<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::trait_factory(
            Lifetime::Singleton,
            factory,
        ))
    }

    /// Registers a scoped trait-object factory.
    pub fn add_scoped_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> Arc<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::trait_factory(Lifetime::Scoped, factory))
    }

    /// Registers a transient trait-object factory.
    pub fn add_transient_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> Arc<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::trait_factory(
            Lifetime::Transient,
            factory,
        ))
    }

    // ----- Async factories -----

    /// Registers a singleton built by an async factory; the factory may
    /// resolve further services through the scope it receives.
    pub fn add_singleton_async_factory<T, F, Fut>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.add(ServiceDescriptor::async_factory(
            Lifetime::Singleton,
            factory,
        ))
    }

    /// Registers a scoped service built by an async factory.
    pub fn add_scoped_async_factory<T, F, Fut>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.add(ServiceDescriptor::async_factory(Lifetime::Scoped, factory))
    }

    /// Registers a transient service built by an async factory.
    pub fn add_transient_async_factory<T, F, Fut>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.add(ServiceDescriptor::async_factory(
            Lifetime::Transient,
            factory,
        ))
    }

    /// Registers a keyed async factory.
    pub fn add_keyed_async_factory<T, F, Fut>(
        &mut self,
        key: ServiceKey,
        lifetime: Lifetime,
        factory: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(ServiceKey, Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.add(ServiceDescriptor::keyed_async_factory(key, lifetime, factory))
    }

    // ----- Setup factories (value + teardown) -----

    /// Registers a scoped service with a teardown hook, run when the scope
    /// is disposed.
    pub fn add_scoped_setup_factory<T, F, D>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<(T, D)> + Send + Sync + 'static,
        D: FnOnce() -> DiResult<()> + Send + 'static,
    {
        self.add(ServiceDescriptor::setup_factory(Lifetime::Scoped, factory))
    }

    /// Registers a transient service with a teardown hook; every produced
    /// instance is captured by the resolving scope.
    pub fn add_transient_setup_factory<T, F, D>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<(T, D)> + Send + Sync + 'static,
        D: FnOnce() -> DiResult<()> + Send + 'static,
    {
        self.add(ServiceDescriptor::setup_factory(
            Lifetime::Transient,
            factory,
        ))
    }

    /// Registers a singleton with a teardown hook, run when the provider
    /// is disposed.
    pub fn add_singleton_setup_factory<T, F, D>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<(T, D)> + Send + Sync + 'static,
        D: FnOnce() -> DiResult<()> + Send + 'static,
    {
        self.add(ServiceDescriptor::setup_factory(
            Lifetime::Singleton,
            factory,
        ))
    }

    /// Registers an async setup factory for any lifetime.
    pub fn add_async_setup_factory<T, F, Fut, D, DFut>(
        &mut self,
        lifetime: Lifetime,
        factory: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<(T, D)>> + Send + 'static,
        D: FnOnce() -> DFut + Send + 'static,
        DFut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.add(ServiceDescriptor::async_setup_factory(lifetime, factory))
    }

    // ----- Auto-activation -----

    /// Flags the most recent singleton registration of `T` for eager
    /// activation during provider initialization.
    pub fn enable_auto_activation<T: ?Sized + 'static>(&mut self) -> DiResult<()> {
        self.enable_auto_activation_of(&TypedType::of::<T>(), None)
    }

    /// Flags the most recent keyed singleton registration of `(key, T)`.
    pub fn enable_keyed_auto_activation<T: ?Sized + 'static>(
        &mut self,
        key: ServiceKey,
    ) -> DiResult<()> {
        self.enable_auto_activation_of(&TypedType::of::<T>(), Some(key))
    }

    fn enable_auto_activation_of(
        &mut self,
        service_type: &TypedType,
        key: Option<ServiceKey>,
    ) -> DiResult<()> {
        for descriptor in self.descriptors.iter_mut().rev() {
            if descriptor.service_type() != service_type {
                continue;
            }
            if descriptor.key() != key.as_ref() {
                continue;
            }
            if descriptor.lifetime() != Lifetime::Singleton {
                continue;
            }
            descriptor.set_auto_activate();
            return Ok(());
        }

        match key {
            Some(key) => Err(DiError::NoKeyedSingletonServiceRegistered(
                service_type.clone(),
                key.value_type_name(),
            )),
            None => Err(DiError::NoSingletonServiceRegistered(service_type.clone())),
        }
    }

    // ----- Build -----

    /// Builds a provider with scope validation and build-time validation
    /// enabled.
    pub fn build_provider(&self) -> ServiceProvider {
        self.build_provider_with(true, true)
    }

    /// Builds a provider with explicit validation flags.
    ///
    /// - `validate_scopes`: reject singletons depending on scoped services
    ///   and scoped resolutions from the root scope.
    /// - `validate_on_build`: compile and validate every registration
    ///   during initialization, aggregating failures into one error.
    pub fn build_provider_with(
        &self,
        validate_scopes: bool,
        validate_on_build: bool,
    ) -> ServiceProvider {
        ServiceProvider::new(self.descriptors.clone(), validate_scopes, validate_on_build)
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}
