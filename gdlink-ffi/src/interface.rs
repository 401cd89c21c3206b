/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! C-compatible declarations of the engine interface table handed to the library at load time.
//!
//! Layouts in this module are part of the ABI contract: field order and types must not change.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void};

pub type ObjectPtr = *mut c_void;
pub type ConstObjectPtr = *const c_void;
pub type TypePtr = *mut c_void;
pub type ConstTypePtr = *const c_void;
pub type UninitTypePtr = *mut c_void;
pub type MethodBindPtr = *const c_void;
pub type StringNamePtr = *mut c_void;
pub type ConstStringNamePtr = *const c_void;
pub type UninitStringNamePtr = *mut c_void;
pub type StringPtr = *mut c_void;
pub type ConstStringPtr = *const c_void;
pub type UninitStringPtr = *mut c_void;
pub type VariantPtr = *mut c_void;
pub type ClassLibraryPtr = *mut c_void;
pub type ClassInstancePtr = *mut c_void;

pub type InstanceId = u64;
pub type VariantType = u32;
pub type InitializationLevel = u32;

/// Engine-side `bool` as it crosses the ABI.
pub type SysBool = u8;

/// Engine-side `int` as it crosses the ABI.
pub type SysInt = i64;

pub type PtrDestructor = Option<unsafe extern "C" fn(p_base: TypePtr)>;

// ----------------------------------------------------------------------------------------------------------------------------------------------
// Variant type ids (subset relevant for handle-typed values)

pub const VARIANT_TYPE_NIL: VariantType = 0;
pub const VARIANT_TYPE_STRING: VariantType = 4;
pub const VARIANT_TYPE_STRING_NAME: VariantType = 21;
pub const VARIANT_TYPE_NODE_PATH: VariantType = 22;
pub const VARIANT_TYPE_OBJECT: VariantType = 24;
pub const VARIANT_TYPE_CALLABLE: VariantType = 25;
pub const VARIANT_TYPE_SIGNAL: VariantType = 26;
pub const VARIANT_TYPE_DICTIONARY: VariantType = 27;
pub const VARIANT_TYPE_ARRAY: VariantType = 28;
pub const VARIANT_TYPE_PACKED_BYTE_ARRAY: VariantType = 29;
pub const VARIANT_TYPE_PACKED_INT32_ARRAY: VariantType = 30;
pub const VARIANT_TYPE_PACKED_INT64_ARRAY: VariantType = 31;
pub const VARIANT_TYPE_PACKED_FLOAT32_ARRAY: VariantType = 32;
pub const VARIANT_TYPE_PACKED_FLOAT64_ARRAY: VariantType = 33;
pub const VARIANT_TYPE_PACKED_STRING_ARRAY: VariantType = 34;
pub const VARIANT_TYPE_PACKED_VECTOR2_ARRAY: VariantType = 35;
pub const VARIANT_TYPE_PACKED_VECTOR3_ARRAY: VariantType = 36;
pub const VARIANT_TYPE_PACKED_COLOR_ARRAY: VariantType = 37;
pub const VARIANT_TYPE_PACKED_VECTOR4_ARRAY: VariantType = 38;

pub const INITIALIZATION_CORE: InitializationLevel = 0;
pub const INITIALIZATION_SERVERS: InitializationLevel = 1;
pub const INITIALIZATION_SCENE: InitializationLevel = 2;
pub const INITIALIZATION_EDITOR: InitializationLevel = 3;

// ----------------------------------------------------------------------------------------------------------------------------------------------
// Function table

/// Function-pointer table supplied by the engine when the library is loaded.
///
/// Every entry is optional on the C side; see [`interface_fn!`][crate::interface_fn] for checked access.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct EngineInterface {
    pub version_major: u32,
    pub version_minor: u32,
    pub version_patch: u32,
    pub version_string: *const c_char,

    pub print_error: Option<
        unsafe extern "C" fn(
            p_description: *const c_char,
            p_function: *const c_char,
            p_file: *const c_char,
            p_line: i32,
            p_editor_notify: SysBool,
        ),
    >,
    pub print_warning: Option<
        unsafe extern "C" fn(
            p_description: *const c_char,
            p_function: *const c_char,
            p_file: *const c_char,
            p_line: i32,
            p_editor_notify: SysBool,
        ),
    >,

    pub variant_get_ptr_destructor: Option<unsafe extern "C" fn(p_type: VariantType) -> PtrDestructor>,
    pub variant_destroy: Option<unsafe extern "C" fn(p_self: VariantPtr)>,

    pub string_new_with_utf8_chars_and_len:
        Option<unsafe extern "C" fn(r_dest: UninitStringPtr, p_contents: *const c_char, p_size: SysInt)>,
    pub string_to_utf8_chars: Option<
        unsafe extern "C" fn(p_self: ConstStringPtr, r_text: *mut c_char, p_max_write_length: SysInt) -> SysInt,
    >,
    pub string_name_new_with_utf8_chars_and_len:
        Option<unsafe extern "C" fn(r_dest: UninitStringNamePtr, p_contents: *const c_char, p_size: SysInt)>,

    pub object_method_bind_ptrcall: Option<
        unsafe extern "C" fn(
            p_method_bind: MethodBindPtr,
            p_instance: ObjectPtr,
            p_args: *const ConstTypePtr,
            r_ret: TypePtr,
        ),
    >,
    pub object_destroy: Option<unsafe extern "C" fn(p_o: ObjectPtr)>,
    pub object_get_instance_id: Option<unsafe extern "C" fn(p_object: ConstObjectPtr) -> InstanceId>,
    pub object_set_instance: Option<
        unsafe extern "C" fn(p_o: ObjectPtr, p_classname: ConstStringNamePtr, p_instance: ClassInstancePtr),
    >,
    /// Null if the object is not an instance of the class behind `p_class_tag`.
    pub object_cast_to: Option<unsafe extern "C" fn(p_object: ConstObjectPtr, p_class_tag: *mut c_void) -> ObjectPtr>,

    pub classdb_construct_object: Option<unsafe extern "C" fn(p_classname: ConstStringNamePtr) -> ObjectPtr>,
    pub classdb_get_class_tag: Option<unsafe extern "C" fn(p_classname: ConstStringNamePtr) -> *mut c_void>,
    pub classdb_get_method_bind: Option<
        unsafe extern "C" fn(
            p_classname: ConstStringNamePtr,
            p_methodname: ConstStringNamePtr,
            p_hash: SysInt,
        ) -> MethodBindPtr,
    >,
    pub classdb_register_extension_class: Option<
        unsafe extern "C" fn(
            p_library: ClassLibraryPtr,
            p_class_name: ConstStringNamePtr,
            p_parent_class_name: ConstStringNamePtr,
            p_extension_funcs: *const ClassCreationInfo,
        ),
    >,
    pub classdb_register_extension_class_method: Option<
        unsafe extern "C" fn(
            p_library: ClassLibraryPtr,
            p_class_name: ConstStringNamePtr,
            p_method_info: *const ClassMethodInfo,
        ),
    >,
    pub classdb_unregister_extension_class:
        Option<unsafe extern "C" fn(p_library: ClassLibraryPtr, p_class_name: ConstStringNamePtr)>,
}

// ----------------------------------------------------------------------------------------------------------------------------------------------
// Class registration

pub type ClassCreateInstance = unsafe extern "C" fn(p_class_userdata: *mut c_void) -> ObjectPtr;
pub type ClassFreeInstance = unsafe extern "C" fn(p_class_userdata: *mut c_void, p_instance: ClassInstancePtr);

/// Looks up per-method data for a virtual `p_name` (NUL-terminated UTF-8). Null means "not overridden".
pub type ClassGetVirtualCallData =
    unsafe extern "C" fn(p_class_userdata: *mut c_void, p_name: *const c_char) -> *mut c_void;

pub type ClassCallVirtualWithData = unsafe extern "C" fn(
    p_instance: ClassInstancePtr,
    p_name: *const c_char,
    p_virtual_call_userdata: *mut c_void,
    p_args: *const ConstTypePtr,
    r_ret: TypePtr,
);

/// Engine notification `p_what` sent to an instance. `p_reversed` is set for notifications delivered derived-first.
pub type ClassNotification = unsafe extern "C" fn(p_instance: ClassInstancePtr, p_what: i32, p_reversed: SysBool);

/// Writes the instance's text representation into the uninitialized `String` at `r_out` and sets `r_is_valid`, or leaves
/// `r_out` untouched and clears `r_is_valid` to keep the engine's default.
pub type ClassToString = unsafe extern "C" fn(p_instance: ClassInstancePtr, r_is_valid: *mut SysBool, r_out: StringPtr);

#[repr(C)]
#[derive(Copy, Clone)]
pub struct ClassCreationInfo {
    pub is_virtual: SysBool,
    pub is_abstract: SysBool,
    pub notification_func: Option<ClassNotification>,
    pub to_string_func: Option<ClassToString>,
    pub create_instance_func: Option<ClassCreateInstance>,
    pub free_instance_func: Option<ClassFreeInstance>,
    pub get_virtual_call_data_func: Option<ClassGetVirtualCallData>,
    pub call_virtual_with_data_func: Option<ClassCallVirtualWithData>,
    pub class_userdata: *mut c_void,
}

pub type ClassMethodPtrCall = unsafe extern "C" fn(
    p_method_userdata: *mut c_void,
    p_instance: ClassInstancePtr,
    p_args: *const ConstTypePtr,
    r_ret: TypePtr,
);

pub type MethodFlags = u32;

pub const METHOD_FLAG_NORMAL: MethodFlags = 1;
pub const METHOD_FLAG_EDITOR: MethodFlags = 2;
pub const METHOD_FLAG_CONST: MethodFlags = 4;
pub const METHOD_FLAG_VIRTUAL: MethodFlags = 8;
pub const METHOD_FLAG_VARARG: MethodFlags = 16;
pub const METHOD_FLAG_STATIC: MethodFlags = 32;
pub const METHOD_FLAGS_DEFAULT: MethodFlags = METHOD_FLAG_NORMAL;

/// Host method exposed on an extension class. The engine copies what it needs during registration.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct ClassMethodInfo {
    pub name: ConstStringNamePtr,
    pub method_userdata: *mut c_void,
    pub ptrcall_func: Option<ClassMethodPtrCall>,
    pub method_flags: MethodFlags,
    pub has_return_value: SysBool,
    pub argument_count: u32,
}

// ----------------------------------------------------------------------------------------------------------------------------------------------
// Library initialization

#[repr(C)]
#[derive(Copy, Clone)]
pub struct Initialization {
    pub minimum_initialization_level: InitializationLevel,
    pub userdata: *mut c_void,
    pub initialize: Option<unsafe extern "C" fn(userdata: *mut c_void, p_level: InitializationLevel)>,
    pub deinitialize: Option<unsafe extern "C" fn(userdata: *mut c_void, p_level: InitializationLevel)>,
}

/// Signature of the symbol the engine looks up when loading the library.
pub type InitializationFunction = unsafe extern "C" fn(
    p_interface: *const EngineInterface,
    p_library: ClassLibraryPtr,
    r_initialization: *mut Initialization,
) -> SysBool;
