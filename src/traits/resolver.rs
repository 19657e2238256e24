//! Resolver traits: the object-safe core and the typed extension surface.

use std::sync::Arc;

use async_trait::async_trait;

use crate::descriptors::AnyArc;
use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;
use crate::lookup::ServiceIdentifier;
use crate::typed_type::TypedType;

/// Object-safe resolution core, implemented by [`crate::ServiceProvider`]
/// (resolving against the root scope) and [`crate::Scope`].
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves an identifier to a type-erased instance, `None` when no
    /// registration matches.
    async fn resolve_object(&self, identifier: ServiceIdentifier) -> DiResult<Option<AnyArc>>;
}

fn downcast<T: Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

fn downcast_trait<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))
}

fn downcast_sequence(value: AnyArc) -> DiResult<Arc<Vec<AnyArc>>> {
    value
        .downcast::<Vec<AnyArc>>()
        .map_err(|_| DiError::TypeMismatch("Sequence"))
}

/// Typed resolution methods, available on every [`Resolver`].
///
/// # Examples
///
/// ```
/// use wirebox::{ServiceCollection, ResolverExt};
///
/// #[derive(Debug)]
/// struct Greeter(&'static str);
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Greeter("hello"));
///
/// let provider = services.build_provider();
/// let greeter = provider.get_required::<Greeter>().await?;
/// assert_eq!(greeter.0, "hello");
/// assert!(provider.get::<String>().await?.is_none());
/// # provider.aclose().await?;
/// # Ok(()) }
/// ```
#[async_trait]
pub trait ResolverExt: Resolver {
    /// Resolves `T`, returning `None` when unregistered.
    async fn get<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        match self.resolve_object(ServiceIdentifier::of::<T>()).await? {
            Some(value) => downcast::<T>(value).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves `T`, failing with `NoServiceRegistered` when unregistered.
    async fn get_required<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.get::<T>()
            .await?
            .ok_or_else(|| DiError::NoServiceRegistered(TypedType::of::<T>()))
    }

    /// Resolves the keyed service `(key, T)`, returning `None` when
    /// unregistered. `ServiceKey::Any` is rejected: it only makes sense in
    /// enumeration contexts.
    async fn get_keyed<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
    ) -> DiResult<Option<Arc<T>>> {
        if key.is_any() {
            return Err(DiError::KeyedServiceAnyKeyUsedToResolveService);
        }

        let identifier = ServiceIdentifier::keyed(TypedType::of::<T>(), key);
        match self.resolve_object(identifier).await? {
            Some(value) => downcast::<T>(value).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves the keyed service `(key, T)`, failing when unregistered.
    async fn get_required_keyed<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
    ) -> DiResult<Arc<T>> {
        let key_type = key.value_type_name();
        self.get_keyed::<T>(key)
            .await?
            .ok_or_else(|| DiError::NoKeyedServiceRegistered(TypedType::of::<T>(), key_type))
    }

    /// Resolves every unkeyed registration of `T`, in declaration order.
    /// Never fails for an empty result: no registrations means an empty
    /// vector.
    async fn get_services<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        let identifier = ServiceIdentifier::from_service_type(TypedType::sequence_of(
            TypedType::of::<T>(),
        ));
        self.collect_sequence::<T>(identifier).await
    }

    /// Resolves every registration of `T` matching `key`, in declaration
    /// order. `ServiceKey::Any` enumerates every concretely keyed
    /// registration.
    async fn get_keyed_services<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
    ) -> DiResult<Vec<Arc<T>>> {
        let identifier = ServiceIdentifier::keyed(
            TypedType::sequence_of(TypedType::of::<T>()),
            key,
        );
        self.collect_sequence::<T>(identifier).await
    }

    #[doc(hidden)]
    async fn collect_sequence<T: Send + Sync + 'static>(
        &self,
        identifier: ServiceIdentifier,
    ) -> DiResult<Vec<Arc<T>>> {
        let Some(value) = self.resolve_object(identifier).await? else {
            return Ok(Vec::new());
        };

        let items = downcast_sequence(value)?;
        items
            .iter()
            .map(|item| downcast::<T>(item.clone()))
            .collect()
    }

    /// Resolves a trait-object service registered with one of the
    /// `*_trait*` registration forms.
    async fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        match self.resolve_object(ServiceIdentifier::of::<T>()).await? {
            Some(value) => downcast_trait::<T>(&value).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves a trait-object service, failing when unregistered.
    async fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.get_trait::<T>()
            .await?
            .ok_or_else(|| DiError::NoServiceRegistered(TypedType::of::<T>()))
    }

    /// Resolves every trait-object registration of `T`, in declaration
    /// order.
    async fn get_trait_services<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> DiResult<Vec<Arc<T>>> {
        let identifier = ServiceIdentifier::from_service_type(TypedType::sequence_of(
            TypedType::of::<T>(),
        ));
        let Some(value) = self.resolve_object(identifier).await? else {
            return Ok(Vec::new());
        };

        let items = downcast_sequence(value)?;
        items.iter().map(|item| downcast_trait::<T>(item)).collect()
    }
}

#[async_trait]
impl<R: Resolver + ?Sized> ResolverExt for R {}
