/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::marker::PhantomData;

use super::{GodotClass, Inherits};
use crate::sys;

/// Engine part of an extension instance, handed to [`ExtensionClass::init`][super::ExtensionClass::init].
///
/// Non-owning: the engine object owns the extension instance, not vice versa. Do not use it after the object is freed.
pub struct Base<T: GodotClass> {
    object: sys::ObjectPtr,
    instance_id: sys::InstanceId,
    _class: PhantomData<fn() -> T>,
}

impl<T: GodotClass> Base<T> {
    /// # Safety
    /// `object` must be a live engine object whose class is `T` or derived from it.
    pub(crate) unsafe fn from_sys(object: sys::ObjectPtr, instance_id: sys::InstanceId) -> Self {
        assert!(!object.is_null(), "instance base is null pointer");

        Self {
            object,
            instance_id,
            _class: PhantomData,
        }
    }

    pub fn object_ptr(&self) -> sys::ObjectPtr {
        self.object
    }

    pub fn instance_id(&self) -> sys::InstanceId {
        self.instance_id
    }

    /// The same object, typed as an ancestor class. Used to initialize an embedded parent extension class.
    pub fn upcast<U>(&self) -> Base<U>
    where
        T: Inherits<U>,
        U: GodotClass,
    {
        Base {
            object: self.object,
            instance_id: self.instance_id,
            _class: PhantomData,
        }
    }
}

impl<T: GodotClass> fmt::Debug for Base<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Base<{}>({:?}, id={})", T::CLASS_NAME, self.object, self.instance_id)
    }
}
