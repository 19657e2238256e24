//! Constructor metadata for injectable implementation types.
//!
//! Rust has no runtime reflection over constructors, so implementation
//! types declare their dependencies explicitly: [`Injectable`] supplies a
//! [`ConstructorInfo`] listing each parameter and a build closure that
//! receives the resolved arguments.

use std::sync::Arc;

use crate::descriptors::AnyArc;
use crate::error::{DiError, DiResult};
use crate::internal::Disposer;
use crate::key::ServiceKey;
use crate::traits::{AsyncDispose, Dispose};
use crate::typed_type::TypedType;

/// How a `FromKeyedServices` parameter derives its lookup key.
#[derive(Clone, Debug)]
pub enum KeyLookupMode {
    /// Use the key of the service currently being constructed.
    InheritKey,
    /// Use the given key.
    ExplicitKey(ServiceKey),
    /// Look the dependency up without a key.
    NullKey,
}

#[derive(Clone)]
pub(crate) enum ParameterBinding {
    /// Plain dependency on the parameter's service type.
    Service,
    /// Receives the key of the service being constructed.
    ServiceKey,
    /// Keyed dependency with an explicit lookup mode.
    FromKeyed(KeyLookupMode),
}

/// Declaration of a single constructor parameter.
///
/// # Examples
///
/// ```
/// use wirebox::{ConstructorInfo, Injectable, ParameterInfo, DiResult};
/// use std::sync::Arc;
///
/// struct Database;
/// struct Repository { db: Arc<Database>, retries: u32 }
///
/// impl Injectable for Repository {
///     fn constructor() -> ConstructorInfo {
///         ConstructorInfo::of::<Repository, _>(
///             vec![
///                 ParameterInfo::service::<Database>(),
///                 ParameterInfo::service::<u32>().with_default(3u32),
///             ],
///             |args| {
///                 Ok(Repository {
///                     db: args.get::<Database>(0)?,
///                     retries: *args.get::<u32>(1)?,
///                 })
///             },
///         )
///     }
/// }
/// ```
#[derive(Clone)]
pub struct ParameterInfo {
    parameter_type: TypedType,
    binding: ParameterBinding,
    optional: bool,
    default: Option<AnyArc>,
}

impl ParameterInfo {
    /// A plain dependency on `T`.
    pub fn service<T: ?Sized + 'static>() -> Self {
        Self {
            parameter_type: TypedType::of::<T>(),
            binding: ParameterBinding::Service,
            optional: false,
            default: None,
        }
    }

    /// A dependency on the given service type.
    pub fn service_of(parameter_type: TypedType) -> Self {
        Self {
            parameter_type,
            binding: ParameterBinding::Service,
            optional: false,
            default: None,
        }
    }

    /// The parameter receives the registration key of the service being
    /// constructed, as a `K`. Fails compilation of the call site with
    /// `InvalidServiceKeyType` when the actual key is not a `K`.
    pub fn service_key<K: 'static>() -> Self {
        Self {
            parameter_type: TypedType::of::<K>(),
            binding: ParameterBinding::ServiceKey,
            optional: false,
            default: None,
        }
    }

    /// The parameter receives the registration key as an erased
    /// [`ServiceKey`], whatever its value type. This is the form to use for
    /// catch-all (`ServiceKey::Any`) registrations.
    pub fn erased_service_key() -> Self {
        Self {
            parameter_type: TypedType::of::<ServiceKey>(),
            binding: ParameterBinding::ServiceKey,
            optional: false,
            default: None,
        }
    }

    /// A keyed dependency on `T`, with the key chosen by `mode`.
    pub fn keyed_service<T: ?Sized + 'static>(mode: KeyLookupMode) -> Self {
        Self {
            parameter_type: TypedType::of::<T>(),
            binding: ParameterBinding::FromKeyed(mode),
            optional: false,
            default: None,
        }
    }

    /// Marks the parameter optional: when the dependency is unregistered
    /// the argument slot is `None` instead of failing compilation.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Default value used when the dependency is unregistered.
    pub fn with_default<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.default = Some(Arc::new(value));
        self
    }

    pub(crate) fn parameter_type(&self) -> &TypedType {
        &self.parameter_type
    }

    pub(crate) fn binding(&self) -> &ParameterBinding {
        &self.binding
    }

    pub(crate) fn is_optional(&self) -> bool {
        self.optional
    }

    pub(crate) fn default_value(&self) -> Option<&AnyArc> {
        self.default.as_ref()
    }
}

/// Resolved constructor arguments, in declaration order.
///
/// Required parameters are always present; optional parameters without a
/// registration are `None` slots.
pub struct Arguments<'a> {
    values: &'a [Option<AnyArc>],
}

impl Arguments<'_> {
    /// The resolved argument at `index`, downcast to `T`.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        match self.values.get(index) {
            Some(Some(value)) => value
                .clone()
                .downcast::<T>()
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>())),
            _ => Err(DiError::TypeMismatch(std::any::type_name::<T>())),
        }
    }

    /// The resolved optional argument at `index`, `None` when the
    /// dependency was unregistered.
    pub fn get_optional<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.values
            .get(index)?
            .as_ref()?
            .clone()
            .downcast::<T>()
            .ok()
    }

    /// The resolved trait-object argument at `index`.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        match self.values.get(index) {
            Some(Some(value)) => value
                .downcast_ref::<Arc<T>>()
                .cloned()
                .ok_or(DiError::TypeMismatch(std::any::type_name::<T>())),
            _ => Err(DiError::TypeMismatch(std::any::type_name::<T>())),
        }
    }

    /// The erased service key injected at `index` (for parameters declared
    /// with [`ParameterInfo::erased_service_key`]).
    pub fn service_key(&self, index: usize) -> DiResult<ServiceKey> {
        self.get::<ServiceKey>(index).map(|key| (*key).clone())
    }

    /// Number of argument slots.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the constructor takes no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type InvokeFn = Arc<dyn Fn(&Arguments<'_>) -> DiResult<AnyArc> + Send + Sync>;
type DisposeHook = Arc<dyn Fn(&AnyArc) -> Option<Disposer> + Send + Sync>;

/// Constructor metadata: the implementation type, its parameters, a build
/// closure, and an optional teardown hook captured on construction.
#[derive(Clone)]
pub struct ConstructorInfo {
    implementation_type: TypedType,
    parameters: Vec<ParameterInfo>,
    invoke: InvokeFn,
    dispose_hook: Option<DisposeHook>,
}

impl ConstructorInfo {
    /// Declares the constructor of `T`.
    pub fn of<T, F>(parameters: Vec<ParameterInfo>, build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            implementation_type: TypedType::of::<T>(),
            parameters,
            invoke: Arc::new(move |args: &Arguments<'_>| Ok(Arc::new(build(args)?) as AnyArc)),
            dispose_hook: None,
        }
    }

    /// Captures `T`'s [`Dispose`] impl as the teardown hook for instances
    /// built by this constructor.
    pub fn with_dispose<T: Dispose>(mut self) -> Self {
        self.dispose_hook = Some(Arc::new(|value: &AnyArc| {
            value
                .clone()
                .downcast::<T>()
                .ok()
                .map(|service| Disposer::sync(move || service.dispose()))
        }));
        self
    }

    /// Captures `T`'s [`AsyncDispose`] impl as the teardown hook.
    pub fn with_async_dispose<T: AsyncDispose>(mut self) -> Self {
        self.dispose_hook = Some(Arc::new(|value: &AnyArc| {
            value.clone().downcast::<T>().ok().map(|service| {
                Disposer::asynchronous(move || async move { service.dispose().await })
            })
        }));
        self
    }

    /// The concrete type this constructor produces.
    pub fn implementation_type(&self) -> &TypedType {
        &self.implementation_type
    }

    /// The declared parameters, in order.
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub(crate) fn invoke(&self, values: &[Option<AnyArc>]) -> DiResult<AnyArc> {
        (self.invoke)(&Arguments { values })
    }

    pub(crate) fn disposer_for(&self, value: &AnyArc) -> Option<Disposer> {
        self.dispose_hook.as_ref().and_then(|hook| hook(value))
    }
}

/// Implementation types that can be activated by the container.
///
/// # Examples
///
/// ```
/// use wirebox::{ConstructorInfo, Injectable, ServiceCollection, ResolverExt};
///
/// #[derive(Debug)]
/// struct Clock;
///
/// impl Injectable for Clock {
///     fn constructor() -> ConstructorInfo {
///         ConstructorInfo::of::<Clock, _>(vec![], |_| Ok(Clock))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_singleton_injectable::<Clock>();
/// let provider = services.build_provider();
/// let clock = provider.get_required::<Clock>().await?;
/// # provider.aclose().await?;
/// # Ok(()) }
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// The constructor the container uses to activate this type.
    fn constructor() -> ConstructorInfo;
}
