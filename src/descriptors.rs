//! Service descriptors: immutable registrations of a service type, an
//! optional key, a lifetime, and exactly one implementation form.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::injection::{ConstructorInfo, Injectable};
use crate::internal::Disposer;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::provider::Scope;
use crate::typed_type::TypedType;

/// Type-erased, shared service instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Boxed future used by the async implementation forms.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) type SyncFactoryFn =
    Arc<dyn Fn(Option<&ServiceKey>, &Scope) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type AsyncFactoryFn =
    Arc<dyn Fn(Option<ServiceKey>, Scope) -> BoxFuture<'static, DiResult<AnyArc>> + Send + Sync>;
pub(crate) type SetupFactoryFn =
    Arc<dyn Fn(Option<&ServiceKey>, &Scope) -> DiResult<(AnyArc, Disposer)> + Send + Sync>;
pub(crate) type AsyncSetupFactoryFn = Arc<
    dyn Fn(Option<ServiceKey>, Scope) -> BoxFuture<'static, DiResult<(AnyArc, Disposer)>>
        + Send
        + Sync,
>;

/// The implementation form carried by a descriptor.
#[derive(Clone)]
pub(crate) enum Implementation {
    /// Activate an implementation type through its declared constructor.
    Type(Arc<ConstructorInfo>),
    /// A pre-built instance (singletons only).
    Instance(AnyArc),
    /// `(key, scope) -> T`
    SyncFactory(SyncFactoryFn),
    /// `(key, scope) -> Future<T>`
    AsyncFactory(AsyncFactoryFn),
    /// `(key, scope) -> (T, teardown)` — the setup/teardown rendering of a
    /// generator factory.
    SyncSetupFactory(SetupFactoryFn),
    /// Async variant of the setup factory.
    AsyncSetupFactory(AsyncSetupFactoryFn),
}

impl Implementation {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Implementation::Type(_) => "type",
            Implementation::Instance(_) => "instance",
            Implementation::SyncFactory(_) => "factory",
            Implementation::AsyncFactory(_) => "async factory",
            Implementation::SyncSetupFactory(_) => "setup factory",
            Implementation::AsyncSetupFactory(_) => "async setup factory",
        }
    }
}

/// An immutable service registration.
///
/// Descriptors are usually created through [`crate::ServiceCollection`]
/// convenience methods; the constructors here are the full surface,
/// covering every lifetime, keyed variants, and all implementation forms.
///
/// # Examples
///
/// ```
/// use wirebox::{Lifetime, ServiceCollection, ServiceDescriptor, ResolverExt};
///
/// struct Config { url: String }
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add(ServiceDescriptor::factory(Lifetime::Scoped, |_scope| Config {
///     url: "postgres://localhost".into(),
/// }));
/// let provider = services.build_provider();
/// let scope = provider.create_scope()?;
/// let config = scope.get_required::<Config>().await?;
/// assert_eq!(config.url, "postgres://localhost");
/// # scope.dispose().await?; provider.aclose().await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    service_type: TypedType,
    service_key: Option<ServiceKey>,
    lifetime: Lifetime,
    auto_activate: bool,
    implementation: Implementation,
}

impl ServiceDescriptor {
    fn new(
        service_type: TypedType,
        service_key: Option<ServiceKey>,
        lifetime: Lifetime,
        implementation: Implementation,
    ) -> Self {
        Self {
            service_type,
            service_key,
            lifetime,
            auto_activate: false,
            implementation,
        }
    }

    /// A singleton backed by a pre-built instance.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(
            TypedType::of::<T>(),
            None,
            Lifetime::Singleton,
            Implementation::Instance(Arc::new(value)),
        )
    }

    /// A keyed singleton backed by a pre-built instance.
    pub fn keyed_instance<T: Send + Sync + 'static>(key: ServiceKey, value: T) -> Self {
        Self::new(
            TypedType::of::<T>(),
            Some(key),
            Lifetime::Singleton,
            Implementation::Instance(Arc::new(value)),
        )
    }

    /// A singleton trait object backed by a pre-built instance.
    pub fn trait_instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::new(
            TypedType::of::<T>(),
            None,
            Lifetime::Singleton,
            Implementation::Instance(Arc::new(value)),
        )
    }

    /// An implementation type activated through its [`Injectable`]
    /// constructor.
    pub fn injectable<T: Injectable>(lifetime: Lifetime) -> Self {
        Self::new(
            TypedType::of::<T>(),
            None,
            lifetime,
            Implementation::Type(Arc::new(T::constructor())),
        )
    }

    /// A keyed implementation type.
    pub fn keyed_injectable<T: Injectable>(key: ServiceKey, lifetime: Lifetime) -> Self {
        Self::new(
            TypedType::of::<T>(),
            Some(key),
            lifetime,
            Implementation::Type(Arc::new(T::constructor())),
        )
    }

    /// An [`Injectable`] implementation registered under a different
    /// service type (the constructor's result must still downcast as the
    /// service type; use trait factories for trait-object services).
    pub fn injectable_constructor(
        service_type: TypedType,
        constructor: ConstructorInfo,
        lifetime: Lifetime,
    ) -> Self {
        Self::new(
            service_type,
            None,
            lifetime,
            Implementation::Type(Arc::new(constructor)),
        )
    }

    /// A sync factory `(scope) -> T`.
    pub fn factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            None,
            lifetime,
            Implementation::SyncFactory(Arc::new(
                move |_: Option<&ServiceKey>, scope: &Scope| -> DiResult<AnyArc> {
                    Ok(Arc::new(factory(scope)) as AnyArc)
                },
            )),
        )
    }

    /// A keyed sync factory `(key, scope) -> T`; the factory receives the
    /// resolved lookup key, which for catch-all registrations is the
    /// caller's key.
    pub fn keyed_factory<T, F>(key: ServiceKey, lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceKey, &Scope) -> T + Send + Sync + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            Some(key),
            lifetime,
            Implementation::SyncFactory(Arc::new(
                move |key: Option<&ServiceKey>, scope: &Scope| -> DiResult<AnyArc> {
                    match key {
                        Some(key) => Ok(Arc::new(factory(key, scope)) as AnyArc),
                        None => Err(DiError::InvalidServiceDescriptor),
                    }
                },
            )),
        )
    }

    /// A sync factory returning a trait object.
    pub fn trait_factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> Arc<T> + Send + Sync + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            None,
            lifetime,
            Implementation::SyncFactory(Arc::new(
                move |_: Option<&ServiceKey>, scope: &Scope| -> DiResult<AnyArc> {
                    Ok(Arc::new(factory(scope)) as AnyArc)
                },
            )),
        )
    }

    /// An async factory `(scope) -> Future<DiResult<T>>`.
    pub fn async_factory<T, F, Fut>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            None,
            lifetime,
            Implementation::AsyncFactory(Arc::new(
                move |_: Option<ServiceKey>, scope: Scope| -> BoxFuture<'static, DiResult<AnyArc>> {
                    let fut = factory(scope);
                    Box::pin(async move { Ok(Arc::new(fut.await?) as AnyArc) })
                },
            )),
        )
    }

    /// A keyed async factory `(key, scope) -> Future<DiResult<T>>`.
    pub fn keyed_async_factory<T, F, Fut>(key: ServiceKey, lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(ServiceKey, Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            Some(key),
            lifetime,
            Implementation::AsyncFactory(Arc::new(
                move |key: Option<ServiceKey>, scope: Scope| -> BoxFuture<'static, DiResult<AnyArc>> {
                    match key {
                        Some(key) => {
                            let fut = factory(key, scope);
                            Box::pin(async move { Ok(Arc::new(fut.await?) as AnyArc) })
                        }
                        None => Box::pin(async { Err(DiError::InvalidServiceDescriptor) }),
                    }
                },
            )),
        )
    }

    /// A setup factory `(scope) -> DiResult<(T, teardown)>`. The teardown
    /// closure is captured by the resolving scope and runs on its
    /// teardown, in reverse capture order.
    pub fn setup_factory<T, F, D>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<(T, D)> + Send + Sync + 'static,
        D: FnOnce() -> DiResult<()> + Send + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            None,
            lifetime,
            Implementation::SyncSetupFactory(Arc::new(
                move |_: Option<&ServiceKey>, scope: &Scope| -> DiResult<(AnyArc, Disposer)> {
                    let (value, teardown) = factory(scope)?;
                    Ok((Arc::new(value) as AnyArc, Disposer::sync(teardown)))
                },
            )),
        )
    }

    /// A keyed setup factory `(key, scope) -> DiResult<(T, teardown)>`.
    pub fn keyed_setup_factory<T, F, D>(key: ServiceKey, lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceKey, &Scope) -> DiResult<(T, D)> + Send + Sync + 'static,
        D: FnOnce() -> DiResult<()> + Send + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            Some(key),
            lifetime,
            Implementation::SyncSetupFactory(Arc::new(
                move |key: Option<&ServiceKey>, scope: &Scope| -> DiResult<(AnyArc, Disposer)> {
                    match key {
                        Some(key) => {
                            let (value, teardown) = factory(key, scope)?;
                            Ok((Arc::new(value) as AnyArc, Disposer::sync(teardown)))
                        }
                        None => Err(DiError::InvalidServiceDescriptor),
                    }
                },
            )),
        )
    }

    /// An async setup factory `(scope) -> Future<DiResult<(T, teardown)>>`
    /// with an async teardown.
    pub fn async_setup_factory<T, F, Fut, D, DFut>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<(T, D)>> + Send + 'static,
        D: FnOnce() -> DFut + Send + 'static,
        DFut: Future<Output = DiResult<()>> + Send + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            None,
            lifetime,
            Implementation::AsyncSetupFactory(Arc::new(
                move |_: Option<ServiceKey>,
                      scope: Scope|
                      -> BoxFuture<'static, DiResult<(AnyArc, Disposer)>> {
                    let fut = factory(scope);
                    Box::pin(async move {
                        let (value, teardown) = fut.await?;
                        Ok((Arc::new(value) as AnyArc, Disposer::asynchronous(teardown)))
                    })
                },
            )),
        )
    }

    /// A keyed async setup factory.
    pub fn keyed_async_setup_factory<T, F, Fut, D, DFut>(
        key: ServiceKey,
        lifetime: Lifetime,
        factory: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(ServiceKey, Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<(T, D)>> + Send + 'static,
        D: FnOnce() -> DFut + Send + 'static,
        DFut: Future<Output = DiResult<()>> + Send + 'static,
    {
        Self::new(
            TypedType::of::<T>(),
            Some(key),
            lifetime,
            Implementation::AsyncSetupFactory(Arc::new(
                move |key: Option<ServiceKey>,
                      scope: Scope|
                      -> BoxFuture<'static, DiResult<(AnyArc, Disposer)>> {
                    match key {
                        Some(key) => {
                            let fut = factory(key, scope);
                            Box::pin(async move {
                                let (value, teardown) = fut.await?;
                                Ok((Arc::new(value) as AnyArc, Disposer::asynchronous(teardown)))
                            })
                        }
                        None => Box::pin(async { Err(DiError::InvalidServiceDescriptor) }),
                    }
                },
            )),
        )
    }

    /// Marks the descriptor for eager activation during provider
    /// initialization. Only meaningful for singletons; a scoped descriptor
    /// flagged this way fails scope validation at build.
    pub fn auto_activated(mut self) -> Self {
        self.auto_activate = true;
        self
    }

    /// The registered service type.
    pub fn service_type(&self) -> &TypedType {
        &self.service_type
    }

    /// The registration key, if any.
    pub fn key(&self) -> Option<&ServiceKey> {
        self.service_key.as_ref()
    }

    /// The registration key, failing with `NonKeyedDescriptorMisuse` for
    /// unkeyed descriptors.
    pub fn service_key(&self) -> DiResult<&ServiceKey> {
        self.service_key
            .as_ref()
            .ok_or(DiError::NonKeyedDescriptorMisuse)
    }

    /// Whether this is a keyed registration.
    pub fn is_keyed(&self) -> bool {
        self.service_key.is_some()
    }

    /// The service lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Whether the descriptor is flagged for eager activation.
    pub fn auto_activate(&self) -> bool {
        self.auto_activate
    }

    /// Whether the descriptor carries a pre-built instance.
    pub fn has_instance(&self) -> bool {
        matches!(self.implementation, Implementation::Instance(_))
    }

    pub(crate) fn set_auto_activate(&mut self) {
        self.auto_activate = true;
    }

    pub(crate) fn implementation(&self) -> &Implementation {
        &self.implementation
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} via {}",
            self.lifetime.as_str(),
            self.service_type,
            self.implementation.kind_name()
        )?;
        if let Some(key) = &self.service_key {
            write!(f, " (key: {:?})", key)?;
        }
        Ok(())
    }
}
