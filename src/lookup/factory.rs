//! Call-site compilation: descriptors in, resolution plans out.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::descriptors::{AnyArc, BoxFuture, Implementation, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::injection::{ConstructorInfo, KeyLookupMode, ParameterBinding};
use crate::key::ServiceKey;
use crate::lookup::call_site::{
    CacheLocation, CallSiteVariant, ResultCache, ServiceCallSite,
};
use crate::lookup::chain::CallSiteChain;
use crate::lookup::{ServiceCacheKey, ServiceIdentifier};
use crate::provider::{Scope, ScopeFactory, ServiceProviderIsKeyedService, ServiceProviderIsService};
use crate::sync::{AsyncConcurrentMap, ReentrantAsyncLock};
use crate::typed_type::TypedType;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

struct FactoryState {
    descriptors: Vec<Arc<ServiceDescriptor>>,
    // Descriptors per identifier, in declaration order; the last one is the
    // primary and owns slot 0.
    descriptor_lookup: HashMap<ServiceIdentifier, Vec<Arc<ServiceDescriptor>>>,
    service_overrides: HashMap<ServiceIdentifier, Vec<Option<AnyArc>>>,
    service_type_to_cache_keys: HashMap<TypedType, HashSet<ServiceCacheKey>>,
    dirty_service_types: HashSet<TypedType>,
}

/// Compiles service identifiers into cached call sites.
///
/// Compilation of a single identifier is serialized by a per-identifier
/// fair lock so concurrent resolvers of `C -> D` and `E -> D` observe one
/// shared call site for `D`.
pub(crate) struct CallSiteFactory {
    state: Mutex<FactoryState>,
    call_site_cache: AsyncConcurrentMap<ServiceCacheKey, Arc<ServiceCallSite>>,
    call_site_locks: AsyncConcurrentMap<ServiceIdentifier, Arc<ReentrantAsyncLock>>,
    invalidation_lock: ReentrantAsyncLock,
}

impl CallSiteFactory {
    pub(crate) fn new(descriptors: Vec<Arc<ServiceDescriptor>>) -> Self {
        let factory = Self {
            state: Mutex::new(FactoryState {
                descriptors: Vec::new(),
                descriptor_lookup: HashMap::new(),
                service_overrides: HashMap::new(),
                service_type_to_cache_keys: HashMap::new(),
                dirty_service_types: HashSet::new(),
            }),
            call_site_cache: AsyncConcurrentMap::new(),
            call_site_locks: AsyncConcurrentMap::new(),
            invalidation_lock: ReentrantAsyncLock::new(),
        };
        factory.populate(descriptors);
        factory
    }

    /// Whether an unkeyed lookup of `service_type` would succeed.
    pub(crate) fn is_service(&self, service_type: &TypedType) -> bool {
        self.is_registered(&ServiceIdentifier::from_service_type(service_type.clone()))
    }

    /// Whether a keyed lookup of `(key, service_type)` would succeed.
    pub(crate) fn is_keyed_service(
        &self,
        service_key: Option<&ServiceKey>,
        service_type: &TypedType,
    ) -> bool {
        self.is_registered(&ServiceIdentifier::new(
            service_type.clone(),
            service_key.cloned(),
        ))
    }

    pub(crate) fn add_descriptor(&self, descriptor: Arc<ServiceDescriptor>) {
        let service_type = descriptor.service_type().clone();
        self.populate(vec![descriptor]);
        self.mark_service_type_dirty(service_type);
    }

    pub(crate) fn mark_service_type_dirty(&self, service_type: TypedType) {
        self.state
            .lock()
            .unwrap()
            .dirty_service_types
            .insert(service_type);
    }

    /// Registers a pre-built call site (built-in registrations).
    pub(crate) async fn add(
        &self,
        identifier: ServiceIdentifier,
        call_site: Arc<ServiceCallSite>,
    ) {
        let cache_key = ServiceCacheKey::new(identifier.clone(), ServiceCacheKey::DEFAULT_SLOT);
        self.call_site_cache.upsert(cache_key.clone(), call_site).await;
        self.track_cache_key(identifier.service_type().clone(), cache_key);
    }

    // ----- Overrides -----

    pub(crate) fn add_override(&self, identifier: ServiceIdentifier, value: Option<AnyArc>) {
        self.state
            .lock()
            .unwrap()
            .service_overrides
            .entry(identifier)
            .or_default()
            .push(value);
    }

    pub(crate) fn remove_override(&self, identifier: &ServiceIdentifier) {
        let mut state = self.state.lock().unwrap();
        if let Some(stack) = state.service_overrides.get_mut(identifier) {
            stack.pop();
            if stack.is_empty() {
                state.service_overrides.remove(identifier);
            }
        }
    }

    /// The call site for an active override, if one exists. Overrides are
    /// never cached so popping one restores the original behavior.
    pub(crate) fn get_overridden_call_site(
        &self,
        identifier: &ServiceIdentifier,
    ) -> Option<Arc<ServiceCallSite>> {
        let value = self.find_override(identifier)?;
        Some(ServiceCallSite::constant(
            identifier.service_type().clone(),
            identifier.service_key().cloned(),
            value,
            ServiceCacheKey::DEFAULT_SLOT,
        ))
    }

    fn find_override(&self, identifier: &ServiceIdentifier) -> Option<Option<AnyArc>> {
        let state = self.state.lock().unwrap();

        if let Some(stack) = state.service_overrides.get(identifier) {
            if let Some(top) = stack.last() {
                return Some(top.clone());
            }
        }

        let catch_all = identifier.catch_all()?;
        let stack = state.service_overrides.get(&catch_all)?;
        stack.last().cloned()
    }

    // ----- Lookup -----

    /// Compile (or fetch) the call site for an identifier.
    pub(crate) fn get_call_site<'a>(
        &'a self,
        identifier: ServiceIdentifier,
        chain: &'a mut CallSiteChain,
    ) -> BoxFuture<'a, DiResult<Option<Arc<ServiceCallSite>>>> {
        Box::pin(async move {
            self.invalidate_service_type_if_needed(identifier.service_type())
                .await;

            if let Some(overridden) = self.get_overridden_call_site(&identifier) {
                return Ok(Some(overridden));
            }

            let cache_key =
                ServiceCacheKey::new(identifier.clone(), ServiceCacheKey::DEFAULT_SLOT);
            if let Some(call_site) = self.call_site_cache.get(&cache_key) {
                return Ok(Some(call_site));
            }

            self.create_call_site(identifier, chain).await
        })
    }

    /// Compile (or fetch) the call site for one specific descriptor, at the
    /// slot that descriptor occupies among registrations of its identifier.
    pub(crate) async fn get_call_site_for_descriptor(
        &self,
        descriptor: &Arc<ServiceDescriptor>,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<ServiceCallSite>>> {
        self.invalidate_service_type_if_needed(descriptor.service_type())
            .await;

        let identifier = ServiceIdentifier::from_descriptor(descriptor);
        let slot = self.slot_of(&identifier, descriptor)?;
        self.try_create_exact(descriptor.clone(), identifier, chain, slot)
            .await
    }

    async fn create_call_site(
        &self,
        identifier: ServiceIdentifier,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<ServiceCallSite>>> {
        // Compilation of one identifier at a time: concurrent resolutions
        // of different roots that share a dependency must agree on a single
        // call-site instance, since singleton values memoize by its key.
        let lock = self
            .call_site_locks
            .get_or_add(identifier.clone(), |_| async {
                Ok(Arc::new(ReentrantAsyncLock::new()))
            })
            .await?;

        chain.check_circular_dependency(&identifier)?;

        let _guard = lock.acquire().await;

        #[cfg(feature = "logging")]
        trace!(target: "wirebox", identifier = ?identifier, "compiling call site");

        if let Some(call_site) = self
            .try_create_exact_from_identifier(identifier.clone(), chain)
            .await?
        {
            return Ok(Some(call_site));
        }

        self.try_create_sequence(identifier, chain).await
    }

    async fn try_create_exact_from_identifier(
        &self,
        identifier: ServiceIdentifier,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<ServiceCallSite>>> {
        if let Some(descriptor) = self.last_descriptor(&identifier) {
            return self
                .try_create_exact(
                    descriptor,
                    identifier,
                    chain,
                    ServiceCacheKey::DEFAULT_SLOT,
                )
                .await;
        }

        // A catch-all registration can satisfy any keyed lookup of the type.
        if let Some(catch_all) = identifier.catch_all() {
            if let Some(descriptor) = self.last_descriptor(&catch_all) {
                return self
                    .try_create_exact(
                        descriptor,
                        identifier,
                        chain,
                        ServiceCacheKey::DEFAULT_SLOT,
                    )
                    .await;
            }
        }

        Ok(None)
    }

    async fn try_create_exact(
        &self,
        descriptor: Arc<ServiceDescriptor>,
        identifier: ServiceIdentifier,
        chain: &mut CallSiteChain,
        slot: usize,
    ) -> DiResult<Option<Arc<ServiceCallSite>>> {
        if descriptor.service_type() != identifier.service_type() {
            return Ok(None);
        }

        self.create_exact(descriptor, identifier, chain, slot)
            .await
            .map(Some)
    }

    async fn create_exact(
        &self,
        descriptor: Arc<ServiceDescriptor>,
        identifier: ServiceIdentifier,
        chain: &mut CallSiteChain,
        slot: usize,
    ) -> DiResult<Arc<ServiceCallSite>> {
        let call_site_key = ServiceCacheKey::new(identifier.clone(), slot);
        if let Some(call_site) = self.call_site_cache.get(&call_site_key) {
            return Ok(call_site);
        }

        let cache = ResultCache::from_lifetime(descriptor.lifetime(), identifier.clone(), slot);
        let service_type = descriptor.service_type().clone();
        let service_key = identifier.service_key().cloned();

        let call_site = match descriptor.implementation() {
            Implementation::Instance(value) => ServiceCallSite::constant(
                service_type,
                service_key,
                Some(value.clone()),
                slot,
            ),
            Implementation::SyncFactory(factory) => Arc::new(ServiceCallSite {
                cache,
                service_type,
                service_key,
                variant: CallSiteVariant::SyncFactory {
                    factory: factory.clone(),
                },
            }),
            Implementation::AsyncFactory(factory) => Arc::new(ServiceCallSite {
                cache,
                service_type,
                service_key,
                variant: CallSiteVariant::AsyncFactory {
                    factory: factory.clone(),
                },
            }),
            Implementation::SyncSetupFactory(factory) => Arc::new(ServiceCallSite {
                cache,
                service_type,
                service_key,
                variant: CallSiteVariant::SyncSetupFactory {
                    factory: factory.clone(),
                },
            }),
            Implementation::AsyncSetupFactory(factory) => Arc::new(ServiceCallSite {
                cache,
                service_type,
                service_key,
                variant: CallSiteVariant::AsyncSetupFactory {
                    factory: factory.clone(),
                },
            }),
            Implementation::Type(constructor) => {
                self.create_constructor_call_site(cache, identifier.clone(), constructor.clone(), chain)
                    .await?
            }
        };

        self.call_site_cache
            .upsert(call_site_key.clone(), call_site.clone())
            .await;
        self.track_cache_key(identifier.service_type().clone(), call_site_key);
        Ok(call_site)
    }

    async fn create_constructor_call_site(
        &self,
        cache: ResultCache,
        identifier: ServiceIdentifier,
        constructor: Arc<ConstructorInfo>,
        chain: &mut CallSiteChain,
    ) -> DiResult<Arc<ServiceCallSite>> {
        chain.add(
            identifier.clone(),
            Some(constructor.implementation_type().clone()),
        );

        let parameters = self
            .create_argument_call_sites(&identifier, &constructor, chain)
            .await;

        chain.remove(&identifier);
        let parameters = parameters?;

        Ok(Arc::new(ServiceCallSite {
            cache,
            service_type: identifier.service_type().clone(),
            service_key: identifier.service_key().cloned(),
            variant: CallSiteVariant::Constructor {
                constructor,
                parameters,
            },
        }))
    }

    async fn create_argument_call_sites(
        &self,
        identifier: &ServiceIdentifier,
        constructor: &Arc<ConstructorInfo>,
        chain: &mut CallSiteChain,
    ) -> DiResult<Vec<Option<Arc<ServiceCallSite>>>> {
        let mut parameter_call_sites = Vec::with_capacity(constructor.parameters().len());

        for parameter in constructor.parameters() {
            let mut call_site: Option<Arc<ServiceCallSite>> = None;
            let mut is_keyed_parameter = false;
            let mut parameter_type = parameter.parameter_type().clone();

            match parameter.binding() {
                ParameterBinding::ServiceKey if identifier.service_key().is_some() => {
                    let key = identifier.service_key().cloned().unwrap_or(ServiceKey::Any);
                    let erased = TypedType::of::<ServiceKey>();

                    match &key {
                        // A catch-all registration cannot know its caller's
                        // key type; the parameter is weakened to the erased
                        // form.
                        ServiceKey::Any => {
                            parameter_type = erased.clone();
                            call_site = Some(ServiceCallSite::constant(
                                erased,
                                None,
                                Some(Arc::new(ServiceKey::Any) as AnyArc),
                                ServiceCacheKey::DEFAULT_SLOT,
                            ));
                        }
                        ServiceKey::Value(_) => {
                            if parameter_type == erased {
                                call_site = Some(ServiceCallSite::constant(
                                    parameter_type.clone(),
                                    None,
                                    Some(Arc::new(key.clone()) as AnyArc),
                                    ServiceCacheKey::DEFAULT_SLOT,
                                ));
                            } else if key.value_type_id() == Some(parameter_type.origin_id())
                                && !parameter_type.is_generic()
                            {
                                call_site = Some(ServiceCallSite::constant(
                                    parameter_type.clone(),
                                    None,
                                    key.value_any(),
                                    ServiceCacheKey::DEFAULT_SLOT,
                                ));
                            } else {
                                return Err(DiError::InvalidServiceKeyType);
                            }
                        }
                    }
                }
                ParameterBinding::FromKeyed(mode) => {
                    let service_key = match mode {
                        KeyLookupMode::InheritKey => identifier.service_key().cloned(),
                        KeyLookupMode::ExplicitKey(key) => Some(key.clone()),
                        KeyLookupMode::NullKey => None,
                    };

                    if let Some(service_key) = service_key {
                        call_site = self
                            .get_call_site(
                                ServiceIdentifier::keyed(parameter_type.clone(), service_key),
                                chain,
                            )
                            .await?;
                        is_keyed_parameter = true;
                    }
                }
                _ => {}
            }

            if !is_keyed_parameter && call_site.is_none() {
                call_site = self
                    .get_call_site(
                        ServiceIdentifier::from_service_type(parameter_type.clone()),
                        chain,
                    )
                    .await?;
            }

            if call_site.is_none() {
                if let Some(default) = parameter.default_value() {
                    if parameter.is_optional() {
                        parameter_call_sites.push(None);
                        continue;
                    }

                    call_site = Some(ServiceCallSite::constant(
                        parameter_type.clone(),
                        None,
                        Some(default.clone()),
                        ServiceCacheKey::DEFAULT_SLOT,
                    ));
                } else if parameter.is_optional() {
                    parameter_call_sites.push(None);
                    continue;
                }
            }

            match call_site {
                Some(call_site) => parameter_call_sites.push(Some(call_site)),
                None => {
                    return Err(DiError::CannotResolveService {
                        parameter_type,
                        implementation_type: constructor.implementation_type().clone(),
                    })
                }
            }
        }

        Ok(parameter_call_sites)
    }

    // ----- Sequences -----

    pub(crate) async fn try_create_sequence(
        &self,
        identifier: ServiceIdentifier,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<ServiceCallSite>>> {
        let call_site_key =
            ServiceCacheKey::new(identifier.clone(), ServiceCacheKey::DEFAULT_SLOT);
        if let Some(call_site) = self.call_site_cache.get(&call_site_key) {
            return Ok(Some(call_site));
        }

        chain.add(identifier.clone(), None);
        let result = self
            .build_sequence(identifier.clone(), call_site_key, chain)
            .await;
        chain.remove(&identifier);
        result
    }

    async fn build_sequence(
        &self,
        identifier: ServiceIdentifier,
        call_site_key: ServiceCacheKey,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<ServiceCallSite>>> {
        let service_type = identifier.service_type().clone();
        if !service_type.is_sequence() {
            return Ok(None);
        }

        let item_type = service_type.generic_arguments()[0].clone();
        let cache_identifier =
            ServiceIdentifier::new(item_type.clone(), identifier.service_key().cloned());
        let is_any_key_lookup = matches!(identifier.service_key(), Some(ServiceKey::Any));

        // Per the cache-location ordering, the sequence is memoized where
        // its most durable element is.
        let mut cache_location = CacheLocation::None;
        let mut call_sites: Vec<Arc<ServiceCallSite>> = Vec::new();

        let exact_descriptors = if !item_type.is_generic() && !is_any_key_lookup {
            self.lookup_descriptors(&cache_identifier)
        } else {
            None
        };

        if let Some(descriptors) = exact_descriptors {
            // The last-declared descriptor gets slot 0, matching the
            // single-service lookup.
            let mut slot = descriptors.len();

            for descriptor in descriptors {
                slot -= 1;
                let call_site = self
                    .create_exact(descriptor, cache_identifier.clone(), chain, slot)
                    .await?;
                cache_location = cache_location.max(call_site.cache.location);
                call_sites.push(call_site);
            }
        } else {
            // Enumerate every registration in reverse declaration order so
            // slots count up from the most recent, then restore declaration
            // order in the output.
            let mut call_sites_by_index: Vec<(usize, Arc<ServiceCallSite>)> = Vec::new();
            let mut keyed_slot_assignment: HashMap<ServiceIdentifier, usize> = HashMap::new();
            let mut slot = 0usize;

            let descriptors = self.snapshot_descriptors();
            for (index, descriptor) in descriptors.iter().enumerate().rev() {
                if !Self::keys_match(cache_identifier.service_key(), descriptor.key()) {
                    continue;
                }
                if descriptor.service_type() != &item_type {
                    continue;
                }

                // For `Any` lookups, slots follow each registration's own
                // identifier so every distinct key gets its own 0,1,2..
                let registration_key = if is_any_key_lookup {
                    ServiceIdentifier::from_descriptor(descriptor)
                } else {
                    cache_identifier.clone()
                };

                let use_slot = if is_any_key_lookup {
                    *keyed_slot_assignment
                        .entry(registration_key.clone())
                        .or_insert(0)
                } else {
                    slot
                };

                let call_site = self
                    .create_exact(descriptor.clone(), registration_key.clone(), chain, use_slot)
                    .await?;
                cache_location = cache_location.max(call_site.cache.location);
                call_sites_by_index.push((index, call_site));

                if is_any_key_lookup {
                    keyed_slot_assignment.insert(registration_key, use_slot + 1);
                } else {
                    slot += 1;
                }
            }

            call_sites_by_index.sort_by_key(|(index, _)| *index);
            call_sites = call_sites_by_index
                .into_iter()
                .map(|(_, call_site)| call_site)
                .collect();
        }

        let sequence = Arc::new(ServiceCallSite {
            cache: ResultCache {
                location: cache_location,
                key: call_site_key.clone(),
            },
            service_type: service_type.clone(),
            service_key: identifier.service_key().cloned(),
            variant: CallSiteVariant::Sequence {
                item_type: item_type.clone(),
                call_sites,
            },
        });

        self.call_site_cache
            .upsert(call_site_key.clone(), sequence.clone())
            .await;
        // Track under the item type so adding a descriptor for it
        // invalidates the fan-out as well.
        self.track_cache_key(item_type, call_site_key.clone());
        self.track_cache_key(service_type, call_site_key);
        Ok(Some(sequence))
    }

    fn keys_match(lookup_key: Option<&ServiceKey>, descriptor_key: Option<&ServiceKey>) -> bool {
        match (lookup_key, descriptor_key) {
            // Both are unkeyed registrations.
            (None, None) => true,
            // Both keyed: a catch-all registration never matches an
            // enumeration, and an `Any` lookup matches every concrete key.
            (Some(lookup), Some(descriptor)) => {
                if descriptor.is_any() {
                    return false;
                }
                lookup == descriptor || lookup.is_any()
            }
            _ => false,
        }
    }

    // ----- Dirty-type invalidation -----

    async fn invalidate_service_type_if_needed(&self, service_type: &TypedType) {
        let needs_invalidation = self
            .state
            .lock()
            .unwrap()
            .dirty_service_types
            .contains(service_type);
        if !needs_invalidation {
            return;
        }

        let _guard = self.invalidation_lock.acquire().await;

        let cache_keys = {
            let mut state = self.state.lock().unwrap();
            if !state.dirty_service_types.remove(service_type) {
                return;
            }
            state
                .service_type_to_cache_keys
                .remove(service_type)
                .unwrap_or_default()
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "wirebox",
            service_type = %service_type,
            invalidated = cache_keys.len(),
            "invalidating call sites for dirty service type"
        );

        for cache_key in cache_keys {
            self.call_site_cache.try_remove(&cache_key).await;
        }
    }

    // ----- State helpers -----

    fn populate(&self, descriptors: Vec<Arc<ServiceDescriptor>>) {
        let mut state = self.state.lock().unwrap();
        for descriptor in descriptors {
            let identifier = ServiceIdentifier::from_descriptor(&descriptor);
            state
                .descriptor_lookup
                .entry(identifier)
                .or_default()
                .push(descriptor.clone());
            state.descriptors.push(descriptor);
        }
    }

    fn lookup_descriptors(
        &self,
        identifier: &ServiceIdentifier,
    ) -> Option<Vec<Arc<ServiceDescriptor>>> {
        self.state
            .lock()
            .unwrap()
            .descriptor_lookup
            .get(identifier)
            .cloned()
    }

    fn last_descriptor(&self, identifier: &ServiceIdentifier) -> Option<Arc<ServiceDescriptor>> {
        self.state
            .lock()
            .unwrap()
            .descriptor_lookup
            .get(identifier)
            .and_then(|descriptors| descriptors.last().cloned())
    }

    fn snapshot_descriptors(&self) -> Vec<Arc<ServiceDescriptor>> {
        self.state.lock().unwrap().descriptors.clone()
    }

    // Slot of one descriptor among registrations of its identifier: the
    // last-declared descriptor owns slot 0.
    fn slot_of(
        &self,
        identifier: &ServiceIdentifier,
        descriptor: &Arc<ServiceDescriptor>,
    ) -> DiResult<usize> {
        let state = self.state.lock().unwrap();
        let descriptors = state
            .descriptor_lookup
            .get(identifier)
            .ok_or(DiError::ServiceDescriptorDoesNotExist)?;
        let position = descriptors
            .iter()
            .position(|candidate| Arc::ptr_eq(candidate, descriptor))
            .ok_or(DiError::ServiceDescriptorDoesNotExist)?;
        Ok(descriptors.len() - 1 - position)
    }

    fn track_cache_key(&self, service_type: TypedType, cache_key: ServiceCacheKey) {
        self.state
            .lock()
            .unwrap()
            .service_type_to_cache_keys
            .entry(service_type)
            .or_default()
            .insert(cache_key);
    }

    fn is_registered(&self, identifier: &ServiceIdentifier) -> bool {
        {
            let state = self.state.lock().unwrap();
            if state.descriptor_lookup.contains_key(identifier) {
                return true;
            }

            if let Some(catch_all) = identifier.catch_all() {
                if state.descriptor_lookup.contains_key(&catch_all) {
                    return true;
                }
            }
        }

        let service_type = identifier.service_type();
        *service_type == TypedType::of::<Scope>()
            || *service_type == TypedType::of::<ScopeFactory>()
            || *service_type == TypedType::of::<ServiceProviderIsService>()
            || *service_type == TypedType::of::<ServiceProviderIsKeyedService>()
    }
}
