/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::ffi::{c_char, c_void, CStr, CString};
use std::fmt;

use crate as sys;
use sys::interface::*;

/// Checked access to an entry of the [`EngineInterface`] table.
///
/// Evaluates to the function pointer, or panics naming the entry if the engine did not provide it.
#[macro_export]
macro_rules! interface_fn {
    ($engine:expr, $name:ident) => {
        match $engine.interface().$name {
            Some(function) => function,
            None => $crate::engine::missing_interface_fn(stringify!($name)),
        }
    };
}

#[cold]
#[doc(hidden)]
pub fn missing_interface_fn(name: &str) -> ! {
    panic!("engine interface function `{name}` is not available; incompatible engine version?")
}

/// Copyable capability to call into the engine.
///
/// Holds the interface table and the library token received at load time. All methods forward to the table; the ones that
/// take raw pointers are `unsafe` and carry the engine's own preconditions.
#[derive(Copy, Clone)]
pub struct Engine {
    interface: &'static EngineInterface,
    library: ClassLibraryPtr,
}

impl Engine {
    /// # Safety
    ///
    /// - `interface` must point to a table that stays valid and unchanged until the library is unloaded.
    /// - `library` must be the token the engine passed to the entry point.
    pub unsafe fn from_raw(interface: *const EngineInterface, library: ClassLibraryPtr) -> Option<Self> {
        let interface = interface.as_ref()?;
        Some(Self { interface, library })
    }

    pub fn interface(&self) -> &'static EngineInterface {
        self.interface
    }

    pub fn library(&self) -> ClassLibraryPtr {
        self.library
    }

    pub fn version(&self) -> (u32, u32, u32) {
        let i = self.interface;
        (i.version_major, i.version_minor, i.version_patch)
    }

    /// Human-readable version string, or the numeric triple if the engine left it empty.
    pub fn version_string(&self) -> String {
        let ptr = self.interface.version_string;
        if ptr.is_null() {
            let (major, minor, patch) = self.version();
            return format!("{major}.{minor}.{patch}");
        }

        // SAFETY: non-null version string is NUL-terminated and static, per interface contract.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Objects

    /// # Safety
    /// `class_name` must point to a live engine `StringName`.
    pub unsafe fn construct_object(&self, class_name: ConstStringNamePtr) -> ObjectPtr {
        interface_fn!(self, classdb_construct_object)(class_name)
    }

    /// # Safety
    /// `object` must be a live object that is not referenced anywhere else afterwards.
    pub unsafe fn destroy_object(&self, object: ObjectPtr) {
        interface_fn!(self, object_destroy)(object)
    }

    /// # Safety
    /// `object` must be a live object.
    pub unsafe fn instance_id(&self, object: ConstObjectPtr) -> InstanceId {
        interface_fn!(self, object_get_instance_id)(object)
    }

    /// # Safety
    /// `object` must be a live object whose class derives from the extension class `class_name`.
    pub unsafe fn set_instance(&self, object: ObjectPtr, class_name: ConstStringNamePtr, instance: ClassInstancePtr) {
        interface_fn!(self, object_set_instance)(object, class_name, instance)
    }

    /// Opaque tag identifying `class_name` for [`cast_to`](Self::cast_to). Null if the engine doesn't know the class.
    ///
    /// # Safety
    /// `class_name` must point to a live engine `StringName`.
    pub unsafe fn class_tag(&self, class_name: ConstStringNamePtr) -> *mut c_void {
        interface_fn!(self, classdb_get_class_tag)(class_name)
    }

    /// Returns `object` if it is an instance of the tagged class (or a subclass), null otherwise.
    ///
    /// # Safety
    /// `object` must be a live object, `class_tag` must come from [`class_tag`](Self::class_tag).
    pub unsafe fn cast_to(&self, object: ConstObjectPtr, class_tag: *mut c_void) -> ObjectPtr {
        interface_fn!(self, object_cast_to)(object, class_tag)
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Method binds

    /// Returns null if the engine does not know the method under this hash.
    ///
    /// # Safety
    /// Both pointers must point to live engine `StringName`s.
    pub unsafe fn method_bind(
        &self,
        class_name: ConstStringNamePtr,
        method_name: ConstStringNamePtr,
        hash: i64,
    ) -> MethodBindPtr {
        interface_fn!(self, classdb_get_method_bind)(class_name, method_name, hash)
    }

    /// The ABI trampoline: the single point where control passes into engine code for a method call.
    ///
    /// # Safety
    /// - `bind` must have been obtained from [`method_bind`](Self::method_bind).
    /// - `args` must hold exactly the parameters the method declares, each in its ABI encoding and in declared order.
    /// - `ret` must point to storage large enough for the declared return type (or be null for `void`).
    pub unsafe fn ptrcall(&self, bind: MethodBindPtr, object: ObjectPtr, args: *const ConstTypePtr, ret: TypePtr) {
        interface_fn!(self, object_method_bind_ptrcall)(bind, object, args, ret)
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Builtin values

    /// # Safety
    /// `value` must point to a live value of `variant_type`, which is left uninitialized afterwards.
    pub unsafe fn destroy_builtin(&self, variant_type: VariantType, value: TypePtr) {
        let get_destructor = interface_fn!(self, variant_get_ptr_destructor);
        if let Some(destructor) = get_destructor(variant_type) {
            destructor(value);
        }
    }

    /// # Safety
    /// `variant` must point to a live `Variant`.
    pub unsafe fn destroy_variant(&self, variant: VariantPtr) {
        interface_fn!(self, variant_destroy)(variant)
    }

    /// # Safety
    /// `dest` must point to writable, uninitialized storage for a `StringName`.
    pub unsafe fn new_string_name(&self, dest: UninitStringNamePtr, text: &str) {
        // There is no latin1 variant that takes a length, so always go through UTF-8.
        interface_fn!(self, string_name_new_with_utf8_chars_and_len)(
            dest,
            text.as_ptr() as *const c_char,
            text.len() as SysInt,
        )
    }

    /// # Safety
    /// `dest` must point to writable, uninitialized storage for a `String`.
    pub unsafe fn new_string(&self, dest: UninitStringPtr, text: &str) {
        interface_fn!(self, string_new_with_utf8_chars_and_len)(
            dest,
            text.as_ptr() as *const c_char,
            text.len() as SysInt,
        )
    }

    /// Copies an engine `String` into a Rust `String`.
    ///
    /// # Safety
    /// `string` must point to a live engine `String`.
    pub unsafe fn string_to_rust(&self, string: ConstStringPtr) -> String {
        let to_utf8 = interface_fn!(self, string_to_utf8_chars);

        let len = to_utf8(string, std::ptr::null_mut(), 0);
        let len = sys::conv::i64_to_usize(len);

        let mut buf = vec![0u8; len];
        to_utf8(string, buf.as_mut_ptr() as *mut c_char, len as SysInt);

        match String::from_utf8(buf) {
            Ok(s) => s,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Diagnostics

    pub fn print_error(&self, description: &str, function: &str, file: &str, line: u32) {
        if let Some(print_error) = self.interface.print_error {
            print_with(print_error, description, function, file, line);
        } else {
            eprintln!("ERROR: {description}\n   at: {function} ({file}:{line})");
        }
    }

    pub fn print_warning(&self, description: &str, function: &str, file: &str, line: u32) {
        if let Some(print_warning) = self.interface.print_warning {
            print_with(print_warning, description, function, file, line);
        } else {
            eprintln!("WARNING: {description}\n   at: {function} ({file}:{line})");
        }
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Class registration

    /// # Safety
    /// - Name pointers must point to live `StringName`s.
    /// - `info` and everything it references (in particular `class_userdata`) must stay valid until the class is
    ///   unregistered.
    pub unsafe fn register_extension_class(
        &self,
        class_name: ConstStringNamePtr,
        parent_class_name: ConstStringNamePtr,
        info: *const ClassCreationInfo,
    ) {
        interface_fn!(self, classdb_register_extension_class)(self.library, class_name, parent_class_name, info)
    }

    /// # Safety
    /// - `class_name` must have been registered through [`register_extension_class`](Self::register_extension_class).
    /// - `info` must describe a live method name, and `method_userdata` must stay valid until the class is unregistered.
    pub unsafe fn register_extension_class_method(&self, class_name: ConstStringNamePtr, info: &ClassMethodInfo) {
        interface_fn!(self, classdb_register_extension_class_method)(self.library, class_name, info)
    }

    /// # Safety
    /// `class_name` must have been registered through [`register_extension_class`](Self::register_extension_class).
    pub unsafe fn unregister_extension_class(&self, class_name: ConstStringNamePtr) {
        interface_fn!(self, classdb_unregister_extension_class)(self.library, class_name)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("version", &self.version())
            .field("library", &self.library)
            .finish()
    }
}

// SAFETY: the interface table is immutable after load, and the library token is an opaque value. Which engine calls are
// allowed from which thread is governed by the (unsafe) call sites, not by holding an `Engine`.
unsafe impl Send for Engine {}
// SAFETY: see above.
unsafe impl Sync for Engine {}

type PrintFn = unsafe extern "C" fn(*const c_char, *const c_char, *const c_char, i32, SysBool);

fn print_with(print: PrintFn, description: &str, function: &str, file: &str, line: u32) {
    // Interior NULs would truncate the message; make them visible instead.
    let description = CString::new(description.replace('\0', "\\0")).unwrap_or_default();
    let function = CString::new(function.replace('\0', "\\0")).unwrap_or_default();
    let file = CString::new(file.replace('\0', "\\0")).unwrap_or_default();
    let line = i32::try_from(line).unwrap_or(i32::MAX);

    // SAFETY: all strings are NUL-terminated and outlive the call.
    unsafe {
        print(
            description.as_ptr(),
            function.as_ptr(),
            file.as_ptr(),
            line,
            sys::conv::SYS_FALSE,
        )
    }
}
