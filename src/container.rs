//! Mutable container facade: a collection and its lazily built provider.

use std::sync::{Arc, Mutex};

use crate::collection::ServiceCollection;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;
use crate::provider::{OverrideGuard, Scope, ServiceProvider};
use crate::traits::ResolverExt;

/// Collection of resolvable services.
///
/// Unlike [`ServiceCollection`], which is a pure registration builder, the
/// container owns its provider: the first resolution builds it, and later
/// registrations are routed to the live provider as dynamic descriptors.
/// The container builds with scope validation off, matching its
/// exploratory, mutable character.
///
/// # Examples
///
/// ```
/// use wirebox::{ServiceContainer, ServiceDescriptor};
///
/// struct Config { name: &'static str }
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
/// let container = ServiceContainer::new();
/// container.add(ServiceDescriptor::instance(Config { name: "app" })).await;
///
/// let config = container.get::<Config>().await?;
/// assert_eq!(config.name, "app");
/// # container.aclose().await?;
/// # Ok(()) }
/// ```
pub struct ServiceContainer {
    collection: Mutex<ServiceCollection>,
    provider: Mutex<Option<ServiceProvider>>,
}

impl ServiceContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self {
            collection: Mutex::new(ServiceCollection::new()),
            provider: Mutex::new(None),
        }
    }

    /// Adds a descriptor; before the provider exists it lands in the
    /// collection, afterwards it becomes a dynamic registration.
    pub async fn add(&self, descriptor: ServiceDescriptor) {
        let provider = self.provider.lock().unwrap().clone();
        match provider {
            Some(provider) => provider.add_descriptor(descriptor).await,
            None => {
                self.collection.lock().unwrap().add(descriptor);
            }
        }
    }

    /// The provider, if it has been built.
    pub fn service_provider(&self) -> Option<ServiceProvider> {
        self.provider.lock().unwrap().clone()
    }

    /// Builds (or returns) the provider backing this container.
    pub fn build_provider(&self) -> ServiceProvider {
        let mut slot = self.provider.lock().unwrap();
        if let Some(provider) = slot.as_ref() {
            return provider.clone();
        }

        let provider = self
            .collection
            .lock()
            .unwrap()
            .build_provider_with(false, true);
        *slot = Some(provider.clone());
        provider
    }

    /// Gets a service of type `T`, failing with `NoServiceRegistered`.
    pub async fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.build_provider().get_required::<T>().await
    }

    /// Gets a service of type `T`, or `None`.
    pub async fn try_get<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.build_provider().get::<T>().await
    }

    /// Gets the keyed service `(key, T)`, failing when unregistered.
    pub async fn get_keyed<T: Send + Sync + 'static>(&self, key: ServiceKey) -> DiResult<Arc<T>> {
        self.build_provider().get_required_keyed::<T>(key).await
    }

    /// Gets the keyed service `(key, T)`, or `None`.
    pub async fn try_get_keyed<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
    ) -> DiResult<Option<Arc<T>>> {
        self.build_provider().get_keyed::<T>(key).await
    }

    /// Gets every registration of `T`, in declaration order.
    pub async fn get_all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.build_provider().get_services::<T>().await
    }

    /// Gets every registration of `T` matching `key`.
    pub async fn get_all_keyed<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
    ) -> DiResult<Vec<Arc<T>>> {
        self.build_provider().get_keyed_services::<T>(key).await
    }

    /// Creates a scope from the container's provider.
    pub fn create_scope(&self) -> DiResult<Scope> {
        self.build_provider().create_scope()
    }

    /// Overrides the unkeyed registration of `T`; fails with
    /// `ServiceContainerNotBuilt` before the provider exists.
    pub fn override_service<T: Send + Sync + 'static>(
        &self,
        value: T,
    ) -> DiResult<OverrideGuard> {
        let provider = self
            .service_provider()
            .ok_or(DiError::ServiceContainerNotBuilt)?;
        Ok(provider.override_service(value))
    }

    /// Overrides the keyed registration of `(key, T)`.
    pub fn override_keyed_service<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
        value: T,
    ) -> DiResult<OverrideGuard> {
        let provider = self
            .service_provider()
            .ok_or(DiError::ServiceContainerNotBuilt)?;
        Ok(provider.override_keyed_service(key, value))
    }

    /// Disposes the provider, if built, and forgets it.
    pub async fn aclose(&self) -> DiResult<()> {
        let provider = self.provider.lock().unwrap().take();
        match provider {
            Some(provider) => provider.aclose().await,
            None => Ok(()),
        }
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}
