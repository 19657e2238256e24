//! Service key values for keyed registrations.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::descriptors::AnyArc;

/// Key attached to a keyed service registration or lookup.
///
/// A key is any `Eq + Hash + Debug` value, boxed behind `ServiceKey::of`.
/// Equality and hashing are type-aware: `ServiceKey::of(1u32)` never equals
/// `ServiceKey::of(1u64)`. The [`ServiceKey::Any`] sentinel matches any
/// descriptor key in enumeration contexts and acts as a catch-all
/// registration key; it cannot be used to resolve a single service.
///
/// # Examples
///
/// ```rust
/// use wirebox::ServiceKey;
///
/// let email = ServiceKey::of("email");
/// assert_eq!(email, ServiceKey::of("email"));
/// assert_ne!(email, ServiceKey::of("sms"));
/// assert_ne!(email, ServiceKey::Any);
/// assert_eq!(email.downcast_ref::<&str>(), Some(&"email"));
/// ```
#[derive(Clone)]
pub enum ServiceKey {
    /// Sentinel matching any registration key; only meaningful in
    /// enumeration contexts and catch-all registrations.
    Any,
    /// A concrete key value.
    Value(KeyValue),
}

/// Type-erased key payload with monomorphized equality and hashing.
#[derive(Clone)]
pub struct KeyValue {
    value: AnyArc,
    type_id: TypeId,
    type_name: &'static str,
    eq_fn: fn(&AnyArc, &AnyArc) -> bool,
    hash_fn: fn(&AnyArc, &mut dyn Hasher),
    fmt_fn: fn(&AnyArc, &mut fmt::Formatter<'_>) -> fmt::Result,
}

impl ServiceKey {
    /// Wraps a concrete key value.
    pub fn of<K>(key: K) -> Self
    where
        K: Any + Eq + Hash + fmt::Debug + Send + Sync,
    {
        fn eq_impl<K: Any + Eq>(a: &AnyArc, b: &AnyArc) -> bool {
            match (a.downcast_ref::<K>(), b.downcast_ref::<K>()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        fn hash_impl<K: Any + Hash>(v: &AnyArc, mut state: &mut dyn Hasher) {
            if let Some(k) = v.downcast_ref::<K>() {
                k.hash(&mut state);
            }
        }
        fn fmt_impl<K: Any + fmt::Debug>(v: &AnyArc, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match v.downcast_ref::<K>() {
                Some(k) => write!(f, "{:?}", k),
                None => f.write_str("<key>"),
            }
        }

        ServiceKey::Value(KeyValue {
            value: Arc::new(key),
            type_id: TypeId::of::<K>(),
            type_name: std::any::type_name::<K>(),
            eq_fn: eq_impl::<K>,
            hash_fn: hash_impl::<K>,
            fmt_fn: fmt_impl::<K>,
        })
    }

    /// Whether this is the [`ServiceKey::Any`] sentinel.
    pub fn is_any(&self) -> bool {
        matches!(self, ServiceKey::Any)
    }

    /// Borrows the key as a concrete type, if it is one.
    pub fn downcast_ref<K: Any>(&self) -> Option<&K> {
        match self {
            ServiceKey::Any => None,
            ServiceKey::Value(v) => v.value.downcast_ref::<K>(),
        }
    }

    /// The `TypeId` of the key value, if this is a concrete key.
    pub fn value_type_id(&self) -> Option<TypeId> {
        match self {
            ServiceKey::Any => None,
            ServiceKey::Value(v) => Some(v.type_id),
        }
    }

    /// The type name of the key value, for diagnostics.
    pub fn value_type_name(&self) -> &'static str {
        match self {
            ServiceKey::Any => "AnyKey",
            ServiceKey::Value(v) => v.type_name,
        }
    }

    /// The raw erased value, for injection as a constant.
    pub(crate) fn value_any(&self) -> Option<AnyArc> {
        match self {
            ServiceKey::Any => None,
            ServiceKey::Value(v) => Some(v.value.clone()),
        }
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ServiceKey::Any, ServiceKey::Any) => true,
            (ServiceKey::Value(a), ServiceKey::Value(b)) => {
                a.type_id == b.type_id && (a.eq_fn)(&a.value, &b.value)
            }
            _ => false,
        }
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ServiceKey::Any => {
                0u8.hash(state);
            }
            ServiceKey::Value(v) => {
                1u8.hash(state);
                v.type_id.hash(state);
                (v.hash_fn)(&v.value, state);
            }
        }
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKey::Any => f.write_str("AnyKey"),
            ServiceKey::Value(v) => (v.fmt_fn)(&v.value, f),
        }
    }
}
