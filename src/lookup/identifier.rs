//! Service identifiers and cache keys.

use std::fmt;

use crate::descriptors::ServiceDescriptor;
use crate::key::ServiceKey;
use crate::typed_type::TypedType;

/// A registered or requested service: a type plus an optional key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceIdentifier {
    service_type: TypedType,
    service_key: Option<ServiceKey>,
}

impl ServiceIdentifier {
    /// Identifier for an unkeyed lookup of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_service_type(TypedType::of::<T>())
    }

    /// Identifier for an unkeyed lookup of a `TypedType`.
    pub fn from_service_type(service_type: TypedType) -> Self {
        Self {
            service_type,
            service_key: None,
        }
    }

    /// Identifier for a keyed lookup.
    pub fn keyed(service_type: TypedType, service_key: ServiceKey) -> Self {
        Self {
            service_type,
            service_key: Some(service_key),
        }
    }

    /// Identifier with an optional key.
    pub fn new(service_type: TypedType, service_key: Option<ServiceKey>) -> Self {
        Self {
            service_type,
            service_key,
        }
    }

    /// The identifier a descriptor registers under.
    pub fn from_descriptor(descriptor: &ServiceDescriptor) -> Self {
        Self {
            service_type: descriptor.service_type().clone(),
            service_key: descriptor.key().cloned(),
        }
    }

    /// The requested service type.
    pub fn service_type(&self) -> &TypedType {
        &self.service_type
    }

    /// The requested key, if any.
    pub fn service_key(&self) -> Option<&ServiceKey> {
        self.service_key.as_ref()
    }

    /// The `(type, ServiceKey::Any)` catch-all identifier, when this
    /// identifier is keyed with a concrete key.
    pub(crate) fn catch_all(&self) -> Option<ServiceIdentifier> {
        match &self.service_key {
            Some(key) if !key.is_any() => Some(ServiceIdentifier {
                service_type: self.service_type.clone(),
                service_key: Some(ServiceKey::Any),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for ServiceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service_key {
            Some(key) => write!(f, "{} (key: {:?})", self.service_type, key),
            None => write!(f, "{}", self.service_type),
        }
    }
}

/// Key of a compiled call site: an identifier plus a slot.
///
/// Slots distinguish multiple registrations of the same identifier; the
/// last registration owns slot 0.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ServiceCacheKey {
    identifier: ServiceIdentifier,
    slot: usize,
}

impl ServiceCacheKey {
    /// Slot owned by the most recent registration of an identifier.
    pub const DEFAULT_SLOT: usize = 0;

    pub fn new(identifier: ServiceIdentifier, slot: usize) -> Self {
        Self { identifier, slot }
    }

    pub fn identifier(&self) -> &ServiceIdentifier {
        &self.identifier
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}
