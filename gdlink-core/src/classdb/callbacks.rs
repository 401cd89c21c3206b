/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Callbacks that are passed as function pointers to the engine upon class registration.
#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_void};
use std::panic::AssertUnwindSafe;
use std::ptr;

use super::class_db::ClassTable;
use super::host_method::HostMethod;
use super::storage::InstanceStorage;
use super::virtuals::VirtualTarget;
use crate::frame::{VirtualArgs, VirtualReturn};
use crate::private::handle_panic;
use crate::sys;

/// Per-class userdata handed to the engine at registration.
pub(crate) struct ClassUserdata {
    pub table: *const ClassTable,
    pub class: usize,
}

unsafe fn userdata<'a>(class_userdata: *mut c_void) -> (&'a ClassTable, usize) {
    let userdata = &*(class_userdata as *const ClassUserdata);
    (&*userdata.table, userdata.class)
}

/// Engine-side constructor. Returns null if the host constructor panics.
pub(crate) unsafe extern "C" fn create_instance(class_userdata: *mut c_void) -> sys::ObjectPtr {
    let (table, class) = userdata(class_userdata);

    let ctx = || format!("error when creating instance of `{}`", table.class_name(class));
    handle_panic(ctx, AssertUnwindSafe(|| create_instance_impl(table, class))).unwrap_or(ptr::null_mut())
}

fn create_instance_impl(table: &ClassTable, class: usize) -> sys::ObjectPtr {
    let Some((constructor, engine_ancestor)) = table.extension_parts(class) else {
        crate::godot_error!("`{}` is not an extension class", table.class_name(class));
        return ptr::null_mut();
    };

    let engine = table.engine();

    // SAFETY: the ancestor name is a live StringName owned by the registry.
    let object = unsafe { engine.construct_object(table.name_ptr(engine_ancestor)) };
    if object.is_null() {
        crate::godot_error!(
            "engine failed to construct `{}` as base of `{}`",
            table.class_name(engine_ancestor),
            table.class_name(class)
        );
        return ptr::null_mut();
    }

    // SAFETY: `object` was just created.
    let instance_id = unsafe { engine.instance_id(object) };

    // Host constructor can panic, which crashes the engine if unhandled.
    let ctx = || format!("panic during {}::init() constructor", table.class_name(class));
    // SAFETY: `object` is live and of the class' nearest engine ancestor.
    let instance = match handle_panic(ctx, AssertUnwindSafe(|| unsafe { constructor(object, instance_id) })) {
        Ok(instance) => instance,
        Err(_) => {
            // Creation of the host part failed; destroy the engine part to avoid a leak.
            // SAFETY: `object` was just created above and is not referenced anywhere else.
            unsafe { engine.destroy_object(object) };
            return ptr::null_mut();
        }
    };

    let storage = InstanceStorage::new(table.class_name(class), object, engine, instance).into_raw();

    // SAFETY: `object` derives from the registered extension class; storage stays valid until `free_instance`.
    unsafe { engine.set_instance(object, table.name_ptr(class), storage) };
    table.track_instance(object, storage);

    sys::out!("create: {} -> {object:?}", table.class_name(class));
    object
}

pub(crate) unsafe extern "C" fn free_instance(class_userdata: *mut c_void, instance: sys::ClassInstancePtr) {
    let (table, class) = userdata(class_userdata);

    let ctx = || format!("error when freeing instance of `{}`", table.class_name(class));
    let _ = handle_panic(
        ctx,
        AssertUnwindSafe(|| {
            {
                let storage = InstanceStorage::from_raw(instance);
                table.untrack_instance(storage.object());
                sys::out!("free: {} {:?}", storage.class_name(), storage.object());
            } // Ref no longer valid once next statement is executed.

            InstanceStorage::destroy(instance);
        }),
    );
}

/// Looks up the override for a virtual name. Null means the engine uses its own implementation.
pub(crate) unsafe extern "C" fn get_virtual_call_data(class_userdata: *mut c_void, name: *const c_char) -> *mut c_void {
    let (table, class) = userdata(class_userdata);

    // Names are owned by the engine; only borrowed here.
    let Some(method_name) = sys::c_str_to_str(name) else {
        return ptr::null_mut();
    };

    match table.virtual_target(class, method_name) {
        Some(target) => target as *const VirtualTarget as *mut c_void,
        None => ptr::null_mut(),
    }
}

pub(crate) unsafe extern "C" fn call_virtual_with_data(
    instance: sys::ClassInstancePtr,
    _name: *const c_char,
    virtual_call_userdata: *mut c_void,
    args: *const sys::ConstTypePtr,
    ret: sys::TypePtr,
) {
    let target = &*(virtual_call_userdata as *const VirtualTarget);
    let storage = InstanceStorage::from_raw(instance);

    let ctx = || format!("virtual call {}::{}", storage.class_name(), target.name());
    let _ = handle_panic(
        ctx,
        AssertUnwindSafe(|| {
            let args = VirtualArgs::from_sys(args);
            let ret = VirtualReturn::from_sys(ret);

            let called = storage.with_mut(|instance| target.call(instance, args, ret));
            if called.is_none() {
                crate::godot_error!(
                    "{}::{}: instance is already in use (re-entrant virtual call)",
                    storage.class_name(),
                    target.name()
                );
            }
        }),
    );
}

pub(crate) unsafe extern "C" fn call_host_method(
    method_userdata: *mut c_void,
    instance: sys::ClassInstancePtr,
    args: *const sys::ConstTypePtr,
    ret: sys::TypePtr,
) {
    let method = &*(method_userdata as *const HostMethod);
    let storage = InstanceStorage::from_raw(instance);

    let ctx = || format!("method call {}::{}", storage.class_name(), method.name());
    let _ = handle_panic(
        ctx,
        AssertUnwindSafe(|| {
            let args = VirtualArgs::from_sys(args);
            let ret = VirtualReturn::from_sys(ret);

            let called = storage.with_mut(|instance| method.call(instance, args, ret));
            if called.is_none() {
                crate::godot_error!(
                    "{}::{}: instance is already in use (re-entrant method call)",
                    storage.class_name(),
                    method.name()
                );
            }
        }),
    );
}

// Only the outermost host instance receives notifications, so `reversed` has no effect.
pub(crate) unsafe extern "C" fn on_notification(instance: sys::ClassInstancePtr, what: i32, _reversed: sys::SysBool) {
    let storage = InstanceStorage::from_raw(instance);

    let ctx = || format!("notification {what} on {}", storage.class_name());
    let _ = handle_panic(
        ctx,
        AssertUnwindSafe(|| {
            if storage.with_mut(|instance| instance.on_notification(what)).is_none() {
                sys::out!("notification {what} dropped: {} is in use", storage.class_name());
            }
        }),
    );
}

pub(crate) unsafe extern "C" fn to_string(
    instance: sys::ClassInstancePtr,
    is_valid: *mut sys::SysBool,
    out_string: sys::StringPtr,
) {
    let storage = InstanceStorage::from_raw(instance);

    let ctx = || format!("to_string on {}", storage.class_name());
    let text = handle_panic(ctx, AssertUnwindSafe(|| storage.with_ref(|instance| instance.display_string())));

    // is_valid comes uninitialized and must be set either way.
    match text {
        Ok(Some(Some(text))) => {
            // SAFETY: the engine passes storage for a String, which it takes over.
            storage.engine().new_string(out_string, &text);
            *is_valid = sys::conv::SYS_TRUE;
        }
        _ => *is_valid = sys::conv::SYS_FALSE,
    }
}
