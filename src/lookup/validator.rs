//! Compile-time and resolve-time scope-purity validation.

use std::sync::Arc;

use crate::descriptors::BoxFuture;
use crate::error::{DiError, DiResult};
use crate::lookup::call_site::{CacheLocation, CallSiteVariant, ServiceCallSite};
use crate::lookup::ServiceCacheKey;
use crate::provider::ScopeFactory;
use crate::sync::AsyncConcurrentMap;
use crate::typed_type::TypedType;

struct ValidatorState {
    singleton: Option<Arc<ServiceCallSite>>,
}

/// Enforces that singletons never depend on scoped services and that the
/// root scope never hands out scoped instances.
pub(crate) struct CallSiteValidator {
    // For every visited cache key: the first scoped service in its call
    // site tree, or None when the tree has no scoped dependency.
    scoped_services: AsyncConcurrentMap<ServiceCacheKey, Option<TypedType>>,
}

impl CallSiteValidator {
    pub(crate) fn new() -> Self {
        Self {
            scoped_services: AsyncConcurrentMap::new(),
        }
    }

    /// Walks the call-site tree before any instance is built, failing with
    /// `ScopedInSingleton` when a singleton reaches a scoped dependency.
    pub(crate) async fn validate_call_site(
        &self,
        call_site: &Arc<ServiceCallSite>,
    ) -> DiResult<()> {
        let mut state = ValidatorState { singleton: None };
        self.visit(call_site, &mut state).await.map(|_| ())
    }

    /// Rejects root-scope resolutions whose trees contain scoped services.
    pub(crate) fn validate_resolution(
        &self,
        call_site: &Arc<ServiceCallSite>,
        scope_is_root: bool,
    ) -> DiResult<()> {
        if !scope_is_root {
            return Ok(());
        }

        let scoped_service = self.scoped_services.get(&call_site.cache.key).flatten();
        let Some(scoped_service) = scoped_service else {
            return Ok(());
        };

        if scoped_service == call_site.service_type {
            return Err(DiError::DirectScopedResolvedFromRoot(scoped_service));
        }

        Err(DiError::ScopedResolvedFromRoot {
            service_type: call_site.service_type.clone(),
            scoped_dependency: scoped_service,
        })
    }

    fn visit<'a>(
        &'a self,
        call_site: &'a Arc<ServiceCallSite>,
        state: &'a mut ValidatorState,
    ) -> BoxFuture<'a, DiResult<Option<TypedType>>> {
        Box::pin(async move {
            let memoized = self.scoped_services.get(&call_site.cache.key).flatten();

            let first_scoped = match memoized {
                Some(scoped) => Some(scoped),
                None => {
                    let computed = self.visit_cache(call_site, state).await?;
                    self.scoped_services
                        .upsert(call_site.cache.key.clone(), computed.clone())
                        .await;
                    computed
                }
            };

            if first_scoped.is_some() {
                if let Some(singleton) = &state.singleton {
                    return Err(DiError::ScopedInSingleton {
                        scoped_type: call_site.service_type.clone(),
                        singleton_type: singleton.service_type.clone(),
                    });
                }
            }

            Ok(first_scoped)
        })
    }

    async fn visit_cache(
        &self,
        call_site: &Arc<ServiceCallSite>,
        state: &mut ValidatorState,
    ) -> DiResult<Option<TypedType>> {
        match call_site.cache.location {
            CacheLocation::Root => {
                state.singleton = Some(call_site.clone());
                self.visit_variant(call_site, state).await
            }
            CacheLocation::Scope => {
                // Singletons may depend on the scope factory.
                if call_site.service_type == TypedType::of::<ScopeFactory>() {
                    return Ok(None);
                }

                self.visit_variant(call_site, state).await?;
                Ok(Some(call_site.service_type.clone()))
            }
            CacheLocation::Dispose | CacheLocation::None => {
                self.visit_variant(call_site, state).await
            }
        }
    }

    async fn visit_variant(
        &self,
        call_site: &Arc<ServiceCallSite>,
        state: &mut ValidatorState,
    ) -> DiResult<Option<TypedType>> {
        match &call_site.variant {
            CallSiteVariant::Constructor { parameters, .. } => {
                let mut result = None;
                for parameter in parameters.iter().flatten() {
                    let scoped = self.visit(parameter, state).await?;
                    if result.is_none() {
                        result = scoped;
                    }
                }
                Ok(result)
            }
            CallSiteVariant::Sequence { call_sites, .. } => {
                let mut result = None;
                for element in call_sites {
                    let scoped = self.visit(element, state).await?;
                    if result.is_none() {
                        result = scoped;
                    }
                }
                Ok(result)
            }
            _ => Ok(None),
        }
    }
}
