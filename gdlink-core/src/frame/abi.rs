/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::error::ErrorCode;
use crate::sys;

/// Words per call-frame slot. Every by-value argument and return value must fit.
pub const SLOT_WORDS: usize = 4;
pub const SLOT_BYTES: usize = SLOT_WORDS * 8;

/// Storage for one argument or return value. 8-byte aligned, zero-initialized.
pub type Slot = [u64; SLOT_WORDS];

/// Implemented for types which can be passed as arguments and return values through the engine's `ptrcall` ABI.
///
/// The encoding is the engine's, not Rust's: all integers travel as 64-bit, all floats as `f64`, and `bool` as a single byte.
pub trait AbiValue: Sized {
    /// Size of the encoded value in bytes; at most [`SLOT_BYTES`].
    const ABI_SIZE: usize;

    /// Type name as spelled in the engine's reflection data (`"int"`, `"Vector2"`, ...).
    const TYPE_NAME: &'static str;

    /// Read a value from a ptrcall argument or return slot.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a value in this type's ABI encoding, as provided by the engine.
    unsafe fn abi_read(ptr: sys::ConstTypePtr) -> Self;

    /// Write a value to a ptrcall argument or return slot.
    ///
    /// # Safety
    ///
    /// `ptr` must point to writable storage of at least [`ABI_SIZE`](Self::ABI_SIZE) bytes.
    unsafe fn abi_write(self, ptr: sys::TypePtr);
}

macro_rules! impl_abi_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl AbiValue for $t {
                const ABI_SIZE: usize = 8;
                const TYPE_NAME: &'static str = "int";

                unsafe fn abi_read(ptr: sys::ConstTypePtr) -> Self {
                    (ptr as *const i64).read_unaligned() as $t
                }

                unsafe fn abi_write(self, ptr: sys::TypePtr) {
                    (ptr as *mut i64).write_unaligned(self as i64)
                }
            }
        )*
    };
}

macro_rules! impl_abi_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl AbiValue for $t {
                const ABI_SIZE: usize = 8;
                const TYPE_NAME: &'static str = "float";

                unsafe fn abi_read(ptr: sys::ConstTypePtr) -> Self {
                    (ptr as *const f64).read_unaligned() as $t
                }

                unsafe fn abi_write(self, ptr: sys::TypePtr) {
                    (ptr as *mut f64).write_unaligned(self as f64)
                }
            }
        )*
    };
}

/// Plain-old-data types whose in-memory layout is already the engine's (single-precision math types).
macro_rules! impl_abi_pod {
    ($($t:ty => $name:literal),* $(,)?) => {
        $(
            impl AbiValue for $t {
                const ABI_SIZE: usize = std::mem::size_of::<$t>();
                const TYPE_NAME: &'static str = $name;

                unsafe fn abi_read(ptr: sys::ConstTypePtr) -> Self {
                    (ptr as *const $t).read_unaligned()
                }

                unsafe fn abi_write(self, ptr: sys::TypePtr) {
                    (ptr as *mut $t).write_unaligned(self)
                }
            }
        )*
    };
}

impl_abi_int!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_abi_float!(f32, f64);
impl_abi_pod!(
    glam::Vec2 => "Vector2",
    glam::Vec3 => "Vector3",
    glam::Vec4 => "Vector4",
    glam::IVec2 => "Vector2i",
    glam::IVec3 => "Vector3i",
    glam::IVec4 => "Vector4i",
);

impl AbiValue for bool {
    const ABI_SIZE: usize = 1;
    const TYPE_NAME: &'static str = "bool";

    unsafe fn abi_read(ptr: sys::ConstTypePtr) -> Self {
        *(ptr as *const sys::SysBool) != sys::conv::SYS_FALSE
    }

    unsafe fn abi_write(self, ptr: sys::TypePtr) {
        *(ptr as *mut sys::SysBool) = sys::conv::bool_to_sys(self);
    }
}

impl AbiValue for () {
    const ABI_SIZE: usize = 0;
    const TYPE_NAME: &'static str = "void";

    unsafe fn abi_read(_ptr: sys::ConstTypePtr) -> Self {}

    unsafe fn abi_write(self, _ptr: sys::TypePtr) {
        // do nothing
    }
}

impl AbiValue for ErrorCode {
    const ABI_SIZE: usize = 8;
    const TYPE_NAME: &'static str = "enum::Error";

    unsafe fn abi_read(ptr: sys::ConstTypePtr) -> Self {
        ErrorCode::from_ord(i64::abi_read(ptr) as i32)
    }

    unsafe fn abi_write(self, ptr: sys::TypePtr) {
        i64::from(self.ord()).abi_write(ptr)
    }
}

/// Untracked object pointer as it crosses the ABI.
///
/// Used at the lowest level (virtual callbacks, custom calls). Tracked objects should go through a
/// [`Borrowed`][crate::handle::Borrowed] view instead.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RawObject(pub sys::ObjectPtr);

impl RawObject {
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl AbiValue for RawObject {
    const ABI_SIZE: usize = 8;
    const TYPE_NAME: &'static str = "Object";

    unsafe fn abi_read(ptr: sys::ConstTypePtr) -> Self {
        RawObject((ptr as *const u64).read_unaligned() as sys::ObjectPtr)
    }

    unsafe fn abi_write(self, ptr: sys::TypePtr) {
        (ptr as *mut u64).write_unaligned(self.0 as u64)
    }
}

/// Whether a value of `abi` type may be passed where the engine declares `declared`.
///
/// Enums and bitfields travel as integers; any class type travels as an object pointer.
pub(crate) fn abi_type_matches(abi: &str, declared: &str) -> bool {
    if abi == declared {
        return true;
    }

    match abi {
        "int" => declared.starts_with("enum::") || declared.starts_with("bitfield::"),
        "Object" => is_class_type(declared),
        _ => false,
    }
}

fn is_class_type(declared: &str) -> bool {
    const BUILTINS: &[&str] = &[
        "Nil", "bool", "int", "float", "String", "Vector2", "Vector2i", "Rect2", "Rect2i", "Vector3", "Vector3i",
        "Transform2D", "Vector4", "Vector4i", "Plane", "Quaternion", "AABB", "Basis", "Transform3D", "Projection",
        "Color", "StringName", "NodePath", "RID", "Callable", "Signal", "Dictionary", "Array", "Variant", "void",
    ];

    !declared.contains("::")
        && !declared.starts_with("Packed")
        && !declared.contains('*')
        && !BUILTINS.contains(&declared)
}

/// Encodes `value` into a fresh zeroed slot.
pub(crate) fn encode<T: AbiValue>(value: T) -> Slot {
    const { assert!(T::ABI_SIZE <= SLOT_BYTES, "value does not fit into a call-frame slot") };

    let mut slot: Slot = [0; SLOT_WORDS];
    // SAFETY: the slot has SLOT_BYTES writable bytes, checked above.
    unsafe { value.abi_write(slot.as_mut_ptr() as sys::TypePtr) };
    slot
}

/// Decodes a value previously written into `slot`.
///
/// # Safety
/// The slot must hold a `T` in ABI encoding.
pub(crate) unsafe fn decode<T: AbiValue>(slot: &Slot) -> T {
    const { assert!(T::ABI_SIZE <= SLOT_BYTES, "value does not fit into a call-frame slot") };

    T::abi_read(slot.as_ptr() as sys::ConstTypePtr)
}
