/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::ffi::c_void;
use std::ptr;

use super::{HandleKind, RawBits};
use crate::sys;

/// Engine-side lifecycle hooks used by a [`HandleRegistry`][super::HandleRegistry].
///
/// The registry decides *when* a resource dies; implementors decide *how*.
pub trait Finalize {
    /// Destroys a host-owned resource.
    ///
    /// # Safety
    /// `bits` must describe a live resource of `kind` that the host owns, and that nobody uses afterwards.
    unsafe fn finalize(&self, kind: HandleKind, bits: &RawBits);

    /// Takes a reference on a resource that the engine returned without one (refcounted objects from ptrcalls).
    ///
    /// # Safety
    /// `bits` must describe a live resource of `kind`.
    unsafe fn retain(&self, kind: HandleKind, bits: &RawBits) {
        let _ = (kind, bits);
    }

    /// Whether `object` is an instance of `RefCounted`, for objects whose static class doesn't say.
    ///
    /// # Safety
    /// `object` must be a live object.
    unsafe fn is_refcounted(&self, object: sys::ObjectPtr) -> bool {
        let _ = object;
        false
    }
}

/// Pure bookkeeping: nothing is freed.
impl Finalize for () {
    unsafe fn finalize(&self, _kind: HandleKind, _bits: &RawBits) {}
}

/// Frees resources through the engine interface.
///
/// Plain objects are destroyed with `object_destroy`. Refcounted objects drop one reference through
/// `RefCounted.unreference` and are destroyed once the engine reports that it was the last one. Builtin values go through
/// their variant destructor.
#[derive(Copy, Clone, Debug)]
pub struct EngineFinalizer {
    engine: sys::Engine,
    reference: sys::MethodBindPtr,
    unreference: sys::MethodBindPtr,
    refcounted_tag: *mut c_void,
}

impl EngineFinalizer {
    /// Either bind may be null if the engine doesn't provide it; refcounted objects are then leaked with a warning.
    pub fn new(engine: sys::Engine, reference: sys::MethodBindPtr, unreference: sys::MethodBindPtr) -> Self {
        Self {
            engine,
            reference,
            unreference,
            refcounted_tag: ptr::null_mut(),
        }
    }

    /// Class tag of `RefCounted`, used to recognize refcounted objects returned under a plain `Object` type.
    pub fn with_refcounted_tag(mut self, tag: *mut c_void) -> Self {
        self.refcounted_tag = tag;
        self
    }

    pub fn engine(&self) -> sys::Engine {
        self.engine
    }

    /// Calls a `bool ()` method on `object`.
    unsafe fn call_bool(&self, bind: sys::MethodBindPtr, object: sys::ObjectPtr) -> bool {
        let mut ret: sys::SysBool = sys::conv::SYS_FALSE;
        let args: [sys::ConstTypePtr; 0] = [];

        self.engine.ptrcall(
            bind,
            object,
            args.as_ptr(),
            ptr::addr_of_mut!(ret) as sys::TypePtr,
        );
        ret != sys::conv::SYS_FALSE
    }
}

// SAFETY: method binds and class tags are immutable engine data, valid for the library lifetime.
unsafe impl Send for EngineFinalizer {}
// SAFETY: see above.
unsafe impl Sync for EngineFinalizer {}

impl Finalize for EngineFinalizer {
    unsafe fn finalize(&self, kind: HandleKind, bits: &RawBits) {
        match kind {
            HandleKind::Object => {
                let object = bits[0] as sys::ObjectPtr;
                let refcounted = bits[2] != 0;

                if !refcounted {
                    self.engine.destroy_object(object);
                } else if self.unreference.is_null() {
                    crate::godot_warn!("RefCounted.unreference unavailable; object {object:?} is leaked");
                } else if self.call_bool(self.unreference, object) {
                    // Last reference gone.
                    self.engine.destroy_object(object);
                }
            }
            HandleKind::Variant => {
                let mut payload = *bits;
                self.engine
                    .destroy_variant(payload.as_mut_ptr() as sys::VariantPtr);
            }
            builtin => {
                let mut payload = *bits;
                self.engine
                    .destroy_builtin(builtin.variant_type(), payload.as_mut_ptr() as sys::TypePtr);
            }
        }
    }

    unsafe fn retain(&self, kind: HandleKind, bits: &RawBits) {
        let refcounted_object = kind.is_object() && bits[2] != 0;
        if refcounted_object && !self.reference.is_null() {
            // Returns false only for a refcount coming back from zero, which cannot happen for a live object.
            self.call_bool(self.reference, bits[0] as sys::ObjectPtr);
        }
    }

    unsafe fn is_refcounted(&self, object: sys::ObjectPtr) -> bool {
        !self.refcounted_tag.is_null() && !self.engine.cast_to(object, self.refcounted_tag).is_null()
    }
}
