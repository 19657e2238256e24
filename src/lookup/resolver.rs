//! Runtime execution of call sites against a scope.

use std::sync::Arc;

use crate::descriptors::{AnyArc, BoxFuture};
use crate::error::{DiError, DiResult};
use crate::internal::Disposer;
use crate::lookup::call_site::{CacheLocation, CallSiteVariant, ServiceCallSite};
use crate::provider::Scope;

/// Walks a call-site tree and produces an instance, memoizing per cache
/// location and capturing disposables into the resolving scope.
pub(crate) struct CallSiteRuntimeResolver;

pub(crate) static RUNTIME_RESOLVER: CallSiteRuntimeResolver = CallSiteRuntimeResolver;

impl CallSiteRuntimeResolver {
    pub(crate) async fn resolve(
        &self,
        call_site: &Arc<ServiceCallSite>,
        scope: &Scope,
    ) -> DiResult<Option<AnyArc>> {
        self.visit(call_site, scope).await
    }

    fn visit<'a>(
        &'a self,
        call_site: &'a Arc<ServiceCallSite>,
        scope: &'a Scope,
    ) -> BoxFuture<'a, DiResult<Option<AnyArc>>> {
        Box::pin(async move {
            match call_site.cache.location {
                CacheLocation::Root => {
                    let root = scope.provider().root_scope();
                    self.visit_cached(call_site, &root).await
                }
                CacheLocation::Scope => self.visit_cached(call_site, scope).await,
                CacheLocation::Dispose => {
                    let (value, disposer) = self.create(call_site, scope).await?;
                    if let Some(disposer) = disposer {
                        scope.capture_disposable(disposer).await?;
                    }
                    Ok(value)
                }
                CacheLocation::None => {
                    let (value, _) = self.create(call_site, scope).await?;
                    Ok(value)
                }
            }
        })
    }

    // Scoped and singleton memoization: at most one instance per cache key
    // per scope. The scope's fair lock is reentrant, so a dependency
    // resolved while building a cached instance may re-enter.
    async fn visit_cached(
        &self,
        call_site: &Arc<ServiceCallSite>,
        scope: &Scope,
    ) -> DiResult<Option<AnyArc>> {
        let _guard = scope.state().sync_lock().acquire().await;

        if let Some(cached) = scope.state().get_resolved(&call_site.cache.key) {
            return Ok(Some(cached));
        }

        if scope.is_disposed() {
            return Err(DiError::ObjectDisposed("ServiceProvider"));
        }

        let (value, disposer) = self.create(call_site, scope).await?;

        if let Some(value) = &value {
            scope
                .state()
                .store_resolved(call_site.cache.key.clone(), value.clone());
        }

        if let Some(disposer) = disposer {
            scope.capture_disposable(disposer).await?;
        }

        Ok(value)
    }

    async fn create(
        &self,
        call_site: &Arc<ServiceCallSite>,
        scope: &Scope,
    ) -> DiResult<(Option<AnyArc>, Option<Disposer>)> {
        match &call_site.variant {
            CallSiteVariant::Constant { value } => Ok((value.clone(), None)),
            CallSiteVariant::ServiceProvider => {
                Ok((Some(Arc::new(scope.clone()) as AnyArc), None))
            }
            CallSiteVariant::SyncFactory { factory } => {
                let value = factory(call_site.service_key.as_ref(), scope)?;
                Ok((Some(value), None))
            }
            CallSiteVariant::AsyncFactory { factory } => {
                let value = factory(call_site.service_key.clone(), scope.clone()).await?;
                Ok((Some(value), None))
            }
            CallSiteVariant::SyncSetupFactory { factory } => {
                let (value, disposer) = factory(call_site.service_key.as_ref(), scope)?;
                Ok((Some(value), Some(disposer)))
            }
            CallSiteVariant::AsyncSetupFactory { factory } => {
                let (value, disposer) =
                    factory(call_site.service_key.clone(), scope.clone()).await?;
                Ok((Some(value), Some(disposer)))
            }
            CallSiteVariant::Constructor {
                constructor,
                parameters,
            } => {
                let mut values = Vec::with_capacity(parameters.len());
                for parameter in parameters {
                    match parameter {
                        Some(parameter_call_site) => {
                            values.push(self.visit(parameter_call_site, scope).await?);
                        }
                        None => values.push(None),
                    }
                }

                let instance = constructor.invoke(&values)?;
                let disposer = constructor.disposer_for(&instance);
                Ok((Some(instance), disposer))
            }
            CallSiteVariant::Sequence { call_sites, .. } => {
                let mut items = Vec::with_capacity(call_sites.len());
                for element in call_sites {
                    if let Some(value) = self.visit(element, scope).await? {
                        items.push(value);
                    }
                }
                Ok((Some(Arc::new(items) as AnyArc), None))
            }
        }
    }
}
