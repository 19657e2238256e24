//! Structural type identity with generic arguments.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

// Marker origin for `Sequence[T]` service identifiers.
enum SequenceMarker {}

/// Canonical identity for a service type, including generic arguments.
///
/// A `TypedType` is the pair of an origin type and an ordered list of type
/// arguments. Two values are equal when both parts are equal, so
/// `Sequence[u32]` is distinct from `Sequence[String]` and from the raw
/// origin. All registry and cache lookups key on this identity.
///
/// # Examples
///
/// ```rust
/// use wirebox::TypedType;
///
/// let a = TypedType::of::<String>();
/// let b = TypedType::of::<String>();
/// assert_eq!(a, b);
/// assert!(!a.is_generic());
///
/// let seq = TypedType::sequence_of(TypedType::of::<String>());
/// assert!(seq.is_generic());
/// assert_eq!(seq.generic_arguments()[0], TypedType::of::<String>());
/// assert_ne!(seq, TypedType::sequence_of(TypedType::of::<u32>()));
/// ```
#[derive(Clone)]
pub struct TypedType {
    origin: TypeId,
    origin_name: &'static str,
    args: Arc<[TypedType]>,
}

impl TypedType {
    /// Identity of a plain (non-generic) type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            origin: TypeId::of::<T>(),
            origin_name: std::any::type_name::<T>(),
            args: Arc::from(Vec::new()),
        }
    }

    /// Identity of a constructed generic type with explicit arguments.
    pub fn generic<T: ?Sized + 'static>(args: Vec<TypedType>) -> Self {
        Self {
            origin: TypeId::of::<T>(),
            origin_name: std::any::type_name::<T>(),
            args: args.into(),
        }
    }

    /// Identity of a `Sequence[item]` service type, the target of
    /// `get_services` lookups.
    pub fn sequence_of(item: TypedType) -> Self {
        Self {
            origin: TypeId::of::<SequenceMarker>(),
            origin_name: "Sequence",
            args: Arc::from(vec![item]),
        }
    }

    /// Whether this is a constructed generic type (has type arguments).
    pub fn is_generic(&self) -> bool {
        !self.args.is_empty()
    }

    /// The generic definition this type was constructed from: the origin
    /// with no arguments. `Sequence[u32].generic_definition()` equals the
    /// definition of every other `Sequence[..]`.
    pub fn generic_definition(&self) -> TypedType {
        Self {
            origin: self.origin,
            origin_name: self.origin_name,
            args: Arc::from(Vec::new()),
        }
    }

    /// The generic type arguments, empty for non-generic types.
    pub fn generic_arguments(&self) -> &[TypedType] {
        &self.args
    }

    pub(crate) fn is_sequence(&self) -> bool {
        self.origin == TypeId::of::<SequenceMarker>() && self.args.len() == 1
    }

    /// The origin's `TypeId`.
    pub fn origin_id(&self) -> TypeId {
        self.origin
    }

    /// The origin's `std::any::type_name`, without arguments.
    pub fn origin_name(&self) -> &'static str {
        self.origin_name
    }
}

// TypeId-only comparison; the name is carried for diagnostics.
impl PartialEq for TypedType {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && *self.args == *other.args
    }
}

impl Eq for TypedType {}

impl std::hash::Hash for TypedType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
        for arg in self.args.iter() {
            arg.hash(state);
        }
    }
}

impl fmt::Display for TypedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.origin_name)?;
        if !self.args.is_empty() {
            f.write_str("[")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedType({})", self)
    }
}
