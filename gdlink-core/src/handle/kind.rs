/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use crate::sys;

/// Category of engine resource a handle refers to.
///
/// Determines how the raw bits are laid out, how many words are passed in a call frame, and how a host-owned resource is
/// destroyed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum HandleKind {
    /// Engine object. Bits are `[object pointer, instance ID, refcounted flag]`.
    Object,
    String,
    StringName,
    NodePath,
    Callable,
    Signal,
    Dictionary,
    Array,
    Variant,
    PackedArray(PackedElement),
}

/// Element type of a packed array.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PackedElement {
    Byte,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Vector2,
    Vector3,
    Color,
    Vector4,
}

impl HandleKind {
    /// Number of 64-bit words the value occupies when passed by pointer through the ABI.
    ///
    /// Objects pass only their pointer; builtins pass their full opaque payload.
    pub const fn abi_words(self) -> usize {
        match self {
            Self::Object
            | Self::String
            | Self::StringName
            | Self::NodePath
            | Self::Dictionary
            | Self::Array => 1,
            Self::Callable | Self::Signal | Self::PackedArray(_) => 2,
            Self::Variant => 3,
        }
    }

    pub const fn is_object(self) -> bool {
        matches!(self, Self::Object)
    }

    pub const fn variant_type(self) -> sys::VariantType {
        match self {
            Self::Object => sys::VARIANT_TYPE_OBJECT,
            Self::String => sys::VARIANT_TYPE_STRING,
            Self::StringName => sys::VARIANT_TYPE_STRING_NAME,
            Self::NodePath => sys::VARIANT_TYPE_NODE_PATH,
            Self::Callable => sys::VARIANT_TYPE_CALLABLE,
            Self::Signal => sys::VARIANT_TYPE_SIGNAL,
            Self::Dictionary => sys::VARIANT_TYPE_DICTIONARY,
            Self::Array => sys::VARIANT_TYPE_ARRAY,
            // A Variant is not a variant type of its own; NIL stands in for "any".
            Self::Variant => sys::VARIANT_TYPE_NIL,
            Self::PackedArray(element) => match element {
                PackedElement::Byte => sys::VARIANT_TYPE_PACKED_BYTE_ARRAY,
                PackedElement::Int32 => sys::VARIANT_TYPE_PACKED_INT32_ARRAY,
                PackedElement::Int64 => sys::VARIANT_TYPE_PACKED_INT64_ARRAY,
                PackedElement::Float32 => sys::VARIANT_TYPE_PACKED_FLOAT32_ARRAY,
                PackedElement::Float64 => sys::VARIANT_TYPE_PACKED_FLOAT64_ARRAY,
                PackedElement::String => sys::VARIANT_TYPE_PACKED_STRING_ARRAY,
                PackedElement::Vector2 => sys::VARIANT_TYPE_PACKED_VECTOR2_ARRAY,
                PackedElement::Vector3 => sys::VARIANT_TYPE_PACKED_VECTOR3_ARRAY,
                PackedElement::Color => sys::VARIANT_TYPE_PACKED_COLOR_ARRAY,
                PackedElement::Vector4 => sys::VARIANT_TYPE_PACKED_VECTOR4_ARRAY,
            },
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PackedArray(element) => write!(f, "Packed{element:?}Array"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_words_fit_raw_bits() {
        let kinds = [
            HandleKind::Object,
            HandleKind::String,
            HandleKind::Callable,
            HandleKind::Variant,
            HandleKind::PackedArray(PackedElement::Vector3),
        ];

        for kind in kinds {
            assert!(kind.abi_words() <= super::super::RAW_WORDS, "{kind}");
        }
    }

    #[test]
    fn display() {
        assert_eq!(HandleKind::Dictionary.to_string(), "Dictionary");
        assert_eq!(
            HandleKind::PackedArray(PackedElement::Float32).to_string(),
            "PackedFloat32Array"
        );
    }

    #[test]
    fn packed_variant_types() {
        assert_eq!(HandleKind::PackedArray(PackedElement::Byte).variant_type(), 29);
        assert_eq!(HandleKind::PackedArray(PackedElement::Vector4).variant_type(), 38);
        assert_eq!(HandleKind::String.variant_type(), 4);
    }
}
