/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::cell::RefCell;
use std::fmt;

use crate::obj::ExtensionInstance;
use crate::sys;

/// Host part of an extension object, reachable from the engine's instance pointer.
///
/// Lives from the create callback until the engine calls the free callback.
pub(crate) struct InstanceStorage {
    class_name: String,
    object: sys::ObjectPtr,
    engine: sys::Engine,
    instance: RefCell<Box<dyn ExtensionInstance>>,
}

impl InstanceStorage {
    pub fn new(
        class_name: &str,
        object: sys::ObjectPtr,
        engine: sys::Engine,
        instance: Box<dyn ExtensionInstance>,
    ) -> Self {
        Self {
            class_name: class_name.to_owned(),
            object,
            engine,
            instance: RefCell::new(instance),
        }
    }

    pub fn into_raw(self) -> sys::ClassInstancePtr {
        Box::into_raw(Box::new(self)) as sys::ClassInstancePtr
    }

    /// # Safety
    /// `ptr` must come from [`into_raw`](Self::into_raw) and not yet be destroyed. The reference must not outlive it.
    pub unsafe fn from_raw<'a>(ptr: sys::ClassInstancePtr) -> &'a Self {
        &*(ptr as *const Self)
    }

    /// # Safety
    /// `ptr` must come from [`into_raw`](Self::into_raw); no references obtained through [`from_raw`](Self::from_raw) may
    /// be used afterwards.
    pub unsafe fn destroy(ptr: sys::ClassInstancePtr) {
        drop(Box::from_raw(ptr as *mut Self));
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn object(&self) -> sys::ObjectPtr {
        self.object
    }

    pub fn engine(&self) -> sys::Engine {
        self.engine
    }

    /// Runs `f` on the instance. `None` if the instance is already borrowed (re-entrant call).
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut dyn ExtensionInstance) -> R) -> Option<R> {
        let mut guard = self.instance.try_borrow_mut().ok()?;
        Some(f(&mut **guard))
    }

    /// Runs `f` on the instance. `None` if the instance is mutably borrowed further up the call stack.
    pub fn with_ref<R>(&self, f: impl FnOnce(&dyn ExtensionInstance) -> R) -> Option<R> {
        let guard = self.instance.try_borrow().ok()?;
        Some(f(&**guard))
    }
}

impl fmt::Debug for InstanceStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceStorage")
            .field("class", &self.class_name)
            .field("object", &self.object)
            .finish()
    }
}
