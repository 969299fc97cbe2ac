//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable domain objects defined entirely by their
/// attribute values — two with the same values are the same value. To
/// "modify" one, build a new one. Contrast with [`crate::Entity`], where
/// identity persists across state changes.
///
/// The bounds are deliberate: value objects are cheap to copy, compared by
/// value, and debuggable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
