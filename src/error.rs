//! Error types for the dependency injection container.

use std::fmt;

use crate::typed_type::TypedType;

/// Dependency injection errors.
///
/// Represents the error conditions that can occur during service
/// registration, call-site compilation, resolution, or teardown.
///
/// # Examples
///
/// ```rust
/// use wirebox::{DiError, ServiceCollection, ResolverExt};
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() {
/// let provider = ServiceCollection::new().build_provider();
/// match provider.get_required::<String>().await {
///     Err(DiError::NoServiceRegistered(ty)) => {
///         assert!(ty.to_string().contains("String"));
///     }
///     _ => unreachable!(),
/// }
/// # provider.aclose().await.unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// No service is registered for the requested type.
    NoServiceRegistered(TypedType),
    /// No keyed service is registered for the requested type and key type.
    NoKeyedServiceRegistered(TypedType, &'static str),
    /// No singleton registration exists for the type (auto-activation).
    NoSingletonServiceRegistered(TypedType),
    /// No keyed singleton registration exists for the type and key type.
    NoKeyedSingletonServiceRegistered(TypedType, &'static str),
    /// A constructor parameter could not be resolved.
    CannotResolveService {
        /// The parameter's service type.
        parameter_type: TypedType,
        /// The implementation type being activated.
        implementation_type: TypedType,
    },
    /// A parameter of an external endpoint could not be resolved
    /// (boundary convenience for framework adapters).
    CannotResolveServiceFromEndpoint(TypedType),
    /// The service descriptor is invalid.
    InvalidServiceDescriptor,
    /// The lookup key's type does not match the `ServiceKey` parameter type.
    InvalidServiceKeyType,
    /// `ServiceKey::Any` was used to resolve a single service.
    KeyedServiceAnyKeyUsedToResolveService,
    /// A circular dependency was detected while compiling a call site.
    CircularDependency(TypedType),
    /// A keyed accessor was used on a descriptor that is not keyed.
    NonKeyedDescriptorMisuse,
    /// An operation was performed on a disposed object.
    ObjectDisposed(&'static str),
    /// A singleton depends, directly or transitively, on a scoped service.
    ScopedInSingleton {
        /// The scoped service type.
        scoped_type: TypedType,
        /// The singleton that reaches it.
        singleton_type: TypedType,
    },
    /// A scoped service was resolved directly from the root scope.
    DirectScopedResolvedFromRoot(TypedType),
    /// A service with a scoped dependency was resolved from the root scope.
    ScopedResolvedFromRoot {
        /// The requested service type.
        service_type: TypedType,
        /// Its first scoped dependency.
        scoped_dependency: TypedType,
    },
    /// The service container has not been built yet.
    ServiceContainerNotBuilt,
    /// The descriptor is not part of the registration list.
    ServiceDescriptorDoesNotExist,
    /// A resolved value could not be downcast to the requested type.
    TypeMismatch(&'static str),
    /// A descriptor failed compile-time validation.
    ValidationFailed {
        /// Rendering of the failing descriptor.
        descriptor: String,
        /// The underlying error.
        source: Box<DiError>,
    },
    /// Several descriptors failed validation during provider build.
    Aggregate(Vec<DiError>),
    /// A teardown hook failed.
    DisposalFailed(String),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NoServiceRegistered(ty) => {
                write!(f, "No service for type '{}' has been registered", ty)
            }
            DiError::NoKeyedServiceRegistered(ty, key_ty) => write!(
                f,
                "No keyed service for type '{}' using key type '{}' has been registered",
                ty, key_ty
            ),
            DiError::NoSingletonServiceRegistered(ty) => {
                write!(f, "No singleton service for type '{}' has been registered", ty)
            }
            DiError::NoKeyedSingletonServiceRegistered(ty, key_ty) => write!(
                f,
                "No keyed singleton service for type '{}' using key type '{}' has been registered",
                ty, key_ty
            ),
            DiError::CannotResolveService {
                parameter_type,
                implementation_type,
            } => write!(
                f,
                "Unable to resolve service for type '{}' while attempting to activate '{}'",
                parameter_type, implementation_type
            ),
            DiError::CannotResolveServiceFromEndpoint(ty) => write!(
                f,
                "Unable to resolve service for type '{}' while attempting to invoke endpoint",
                ty
            ),
            DiError::InvalidServiceDescriptor => f.write_str("Invalid service descriptor"),
            DiError::InvalidServiceKeyType => f.write_str(
                "The type of the key used for lookup doesn't match the type of the \
                 ServiceKey constructor parameter",
            ),
            DiError::KeyedServiceAnyKeyUsedToResolveService => {
                f.write_str("ServiceKey::Any cannot be used to resolve a single service")
            }
            DiError::CircularDependency(ty) => write!(
                f,
                "A circular dependency was detected for the service of type '{}'",
                ty
            ),
            DiError::NonKeyedDescriptorMisuse => {
                f.write_str("This service descriptor is not keyed")
            }
            DiError::ObjectDisposed(name) => write!(f, "{} has been disposed", name),
            DiError::ScopedInSingleton {
                scoped_type,
                singleton_type,
            } => write!(
                f,
                "Cannot consume scoped service '{}' from singleton '{}'",
                scoped_type, singleton_type
            ),
            DiError::DirectScopedResolvedFromRoot(ty) => write!(
                f,
                "Cannot resolve scoped service '{}' from the root scope",
                ty
            ),
            DiError::ScopedResolvedFromRoot {
                service_type,
                scoped_dependency,
            } => write!(
                f,
                "Cannot resolve '{}' from the root scope because it requires scoped service '{}'",
                service_type, scoped_dependency
            ),
            DiError::ServiceContainerNotBuilt => {
                f.write_str("The service container has not been built")
            }
            DiError::ServiceDescriptorDoesNotExist => {
                f.write_str("The service descriptor does not exist in the registration list")
            }
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::ValidationFailed { descriptor, source } => write!(
                f,
                "Error while validating the service descriptor '{}': {}",
                descriptor, source
            ),
            DiError::Aggregate(errors) => {
                write!(
                    f,
                    "Some services are not able to be constructed ({} error(s))",
                    errors.len()
                )?;
                for error in errors {
                    write!(f, "\n  - {}", error)?;
                }
                Ok(())
            }
            DiError::DisposalFailed(message) => write!(f, "Disposal failed: {}", message),
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for DI operations.
///
/// A convenience alias for `Result<T, DiError>` used throughout wirebox.
pub type DiResult<T> = Result<T, DiError>;
