//! The record walker contract.
//!
//! [`Secrets`] is implemented by `#[derive(Secrets)]` and yields the
//! annotated fields of a record in declaration order, each as a
//! [`FieldBinding`] holding a type-erased mutable slot. The derive also
//! emits a static [`FieldSpec`] description used by
//! [`Resolver::validate`](crate::Resolver::validate), which needs no record
//! instance and allocates no subrecords.

use std::any::Any;

use crate::error::ConvertError;
use crate::provider::Versioned;
use crate::SecretValue;

/// A record whose annotated fields can be resolved.
///
/// Implemented by `#[derive(Secrets)]`. Both methods traverse fields in
/// declaration order; nested subrecords (`#[secret(nested)]`) contribute
/// their fields under a dotted name prefix, and a `None` subrecord is
/// allocated via `Default` before recursing.
pub trait Secrets {
    /// Mutable bindings for every annotated field, in declaration order.
    fn secret_fields(&mut self) -> Vec<FieldBinding<'_>>;

    /// Static description of every annotated field, in declaration order.
    fn field_specs(prefix: &str) -> Vec<FieldSpec>
    where
        Self: Sized;
}

/// A single annotated field, bound to its live storage slot.
pub struct FieldBinding<'a> {
    /// Declared field name, dotted from the record root.
    pub name: String,
    /// The raw `secret` tag.
    pub tag: &'static str,
    /// Type-erased access to the field's storage.
    pub slot: &'a mut dyn SecretSlot,
}

impl<'a> FieldBinding<'a> {
    pub fn new(name: impl Into<String>, tag: &'static str, slot: &'a mut dyn SecretSlot) -> Self {
        FieldBinding {
            name: name.into(),
            tag,
            slot,
        }
    }
}

/// Static description of an annotated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Declared field name, dotted from the record root.
    pub name: String,
    /// The raw `secret` tag.
    pub tag: &'static str,
    /// Whether the field is a `Versioned<T>` pair.
    pub versioned: bool,
}

/// Compile-time slot metadata, implemented alongside [`SecretSlot`].
pub trait SlotInfo {
    /// Whether the slot is a `Versioned<T>` pair.
    const VERSIONED: bool;
}

/// Type-erased storage of one annotated field.
///
/// Implemented for every supported field type; custom [`SecretValue`] types
/// opt in with [`value_slot!`](crate::value_slot).
pub trait SecretSlot: Send {
    /// Borrows the slot for assignment or rendering.
    fn access(&mut self) -> SlotAccess<'_>;

    /// Swaps this slot's value with `other`'s, a no-op on type mismatch.
    ///
    /// The watcher uses this to move freshly resolved values from a shadow
    /// record into the live one without touching unannotated fields.
    fn swap_with(&mut self, other: &mut dyn SecretSlot);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The shape of a slot: a single value or a current/previous pair.
pub enum SlotAccess<'a> {
    Value(&'a mut dyn RawSlot),
    Pair {
        current: &'a mut dyn RawSlot,
        previous: &'a mut dyn RawSlot,
    },
}

/// Conversion-level operations on one storage location.
pub trait RawSlot: Send {
    /// Parses and stores the raw bytes.
    fn assign(&mut self, raw: &[u8]) -> Result<(), ConvertError>;

    /// Renders the current value for snapshot comparison.
    fn render(&self) -> Vec<u8>;

    /// The declared type name, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: SecretValue + Send> RawSlot for T {
    fn assign(&mut self, raw: &[u8]) -> Result<(), ConvertError> {
        *self = T::from_bytes(raw)?;
        Ok(())
    }

    fn render(&self) -> Vec<u8> {
        self.to_bytes()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Implements [`SecretSlot`] (and [`SlotInfo`]) for value types.
///
/// The crate registers every built-in field type through this macro; apply
/// it to your own [`SecretValue`](crate::SecretValue) implementors to use
/// them as annotated fields. `Option<T>` and
/// [`Versioned<T>`](crate::Versioned) of a registered type work without
/// further registration.
#[macro_export]
macro_rules! value_slot {
    ($($t:ty),+ $(,)?) => {$(
        impl $crate::record::SlotInfo for $t {
            const VERSIONED: bool = false;
        }

        impl $crate::record::SecretSlot for $t {
            fn access(&mut self) -> $crate::record::SlotAccess<'_> {
                $crate::record::SlotAccess::Value(self)
            }

            fn swap_with(&mut self, other: &mut dyn $crate::record::SecretSlot) {
                if let Some(other) = other.as_any_mut().downcast_mut::<Self>() {
                    ::core::mem::swap(self, other);
                }
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }
        }
    )+};
}

crate::value_slot!(
    String,
    Vec<u8>,
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    std::time::Duration,
);

impl<T: SecretValue + Send + 'static> SlotInfo for Option<T> {
    const VERSIONED: bool = false;
}

impl<T: SecretValue + Send + 'static> SecretSlot for Option<T> {
    fn access(&mut self) -> SlotAccess<'_> {
        SlotAccess::Value(self)
    }

    fn swap_with(&mut self, other: &mut dyn SecretSlot) {
        if let Some(other) = other.as_any_mut().downcast_mut::<Self>() {
            std::mem::swap(self, other);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: SecretValue + Send + 'static> SlotInfo for Versioned<T> {
    const VERSIONED: bool = true;
}

impl<T: SecretValue + Send + 'static> SecretSlot for Versioned<T> {
    fn access(&mut self) -> SlotAccess<'_> {
        SlotAccess::Pair {
            current: &mut self.current,
            previous: &mut self.previous,
        }
    }

    fn swap_with(&mut self, other: &mut dyn SecretSlot) {
        if let Some(other) = other.as_any_mut().downcast_mut::<Self>() {
            std::mem::swap(self, other);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Whether the slot is a `Versioned<T>` pair.
pub(crate) fn slot_is_versioned(slot: &mut dyn SecretSlot) -> bool {
    matches!(slot.access(), SlotAccess::Pair { .. })
}

/// Post-fragment snapshot bytes for the slot (the current value of a pair).
pub(crate) fn slot_render(slot: &mut dyn SecretSlot) -> Vec<u8> {
    match slot.access() {
        SlotAccess::Value(value) => value.render(),
        SlotAccess::Pair { current, .. } => current.render(),
    }
}

/// Joins a name onto a dotted path prefix.
#[doc(hidden)]
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
