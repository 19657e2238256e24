//! The call-site tree: resolution plans as a tagged union.

use std::sync::Arc;

use crate::descriptors::{
    AnyArc, AsyncFactoryFn, AsyncSetupFactoryFn, SetupFactoryFn, SyncFactoryFn,
};
use crate::injection::ConstructorInfo;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::lookup::{ServiceCacheKey, ServiceIdentifier};
use crate::typed_type::TypedType;

/// Where a call site's result is memoized.
///
/// Ordered by permanence: `Root` outlives `Scope`, which outlives the
/// capture-only `Dispose`, which outlives `None`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) enum CacheLocation {
    /// Never memoized, never captured.
    None = 0,
    /// Not memoized, but captured by the scope for teardown.
    Dispose = 1,
    /// Memoized per scope.
    Scope = 2,
    /// Memoized in the root scope (singletons).
    Root = 3,
}

#[derive(Clone, Debug)]
pub(crate) struct ResultCache {
    pub(crate) location: CacheLocation,
    pub(crate) key: ServiceCacheKey,
}

impl ResultCache {
    pub(crate) fn from_lifetime(
        lifetime: Lifetime,
        identifier: ServiceIdentifier,
        slot: usize,
    ) -> Self {
        let location = match lifetime {
            Lifetime::Singleton => CacheLocation::Root,
            Lifetime::Scoped => CacheLocation::Scope,
            Lifetime::Transient => CacheLocation::Dispose,
        };
        Self {
            location,
            key: ServiceCacheKey::new(identifier, slot),
        }
    }

    pub(crate) fn none(identifier: ServiceIdentifier, slot: usize) -> Self {
        Self {
            location: CacheLocation::None,
            key: ServiceCacheKey::new(identifier, slot),
        }
    }
}

/// One node of a compiled resolution plan.
pub(crate) struct ServiceCallSite {
    pub(crate) cache: ResultCache,
    pub(crate) service_type: TypedType,
    pub(crate) service_key: Option<ServiceKey>,
    pub(crate) variant: CallSiteVariant,
}

pub(crate) enum CallSiteVariant {
    /// A fixed value: implementation instances, defaults, overrides,
    /// injected keys, and built-in constants.
    Constant { value: Option<AnyArc> },
    /// Resolves to the current scope's provider facade.
    ServiceProvider,
    /// Activates an implementation type; `parameters` holds one entry per
    /// constructor parameter, `None` meaning "pass nothing" for optional
    /// parameters without a registration.
    Constructor {
        constructor: Arc<ConstructorInfo>,
        parameters: Vec<Option<Arc<ServiceCallSite>>>,
    },
    SyncFactory { factory: SyncFactoryFn },
    AsyncFactory { factory: AsyncFactoryFn },
    SyncSetupFactory { factory: SetupFactoryFn },
    AsyncSetupFactory { factory: AsyncSetupFactoryFn },
    /// Fan-out over every matching registration, in declaration order.
    Sequence {
        item_type: TypedType,
        call_sites: Vec<Arc<ServiceCallSite>>,
    },
}

impl ServiceCallSite {
    pub(crate) fn constant(
        service_type: TypedType,
        service_key: Option<ServiceKey>,
        value: Option<AnyArc>,
        slot: usize,
    ) -> Arc<Self> {
        let identifier = ServiceIdentifier::new(service_type.clone(), service_key.clone());
        Arc::new(Self {
            cache: ResultCache::none(identifier, slot),
            service_type,
            service_key,
            variant: CallSiteVariant::Constant { value },
        })
    }
}
