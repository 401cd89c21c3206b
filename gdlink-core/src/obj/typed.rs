/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use super::{GodotClass, Inherits};
use crate::error::HandleError;
use crate::handle::{Borrowed, Finalize, Handle, HandleKind, HandleRegistry};

/// Object handle carrying its static class.
///
/// Like [`Handle`], `Obj<T>` is a `Copy` token: copying it does not copy ownership, and all access goes through the
/// [`HandleRegistry`] that issued it.
pub struct Obj<T: GodotClass> {
    handle: Handle,
    _class: PhantomData<fn() -> T>,
}

impl<T: GodotClass> Obj<T> {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        debug_assert_eq!(handle.kind(), HandleKind::Object);

        Self {
            handle,
            _class: PhantomData,
        }
    }

    pub fn handle(self) -> Handle {
        self.handle
    }

    pub fn class_name() -> &'static str {
        T::CLASS_NAME
    }

    pub fn is_refcounted() -> bool {
        T::IS_REFCOUNTED
    }

    /// Views the object as one of its ancestors. Same handle, same ownership.
    pub fn upcast<U>(self) -> Obj<U>
    where
        T: Inherits<U>,
        U: GodotClass,
    {
        Obj::from_handle(self.handle)
    }

    /// Borrows the object for one call. See [`HandleRegistry::borrow`].
    #[track_caller]
    pub fn borrow<F: Finalize>(self, registry: &HandleRegistry<F>) -> Borrowed<'_> {
        registry.borrow(self.handle)
    }

    pub fn try_borrow<F: Finalize>(self, registry: &HandleRegistry<F>) -> Result<Borrowed<'_>, HandleError> {
        registry.try_borrow(self.handle)
    }

    /// Ends the handle. See [`HandleRegistry::release`].
    #[track_caller]
    pub fn release<F: Finalize>(self, registry: &mut HandleRegistry<F>) {
        registry.release(self.handle)
    }

    pub fn is_live<F: Finalize>(self, registry: &HandleRegistry<F>) -> bool {
        registry.is_live(self.handle)
    }
}

impl<T: GodotClass> Clone for Obj<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: GodotClass> Copy for Obj<T> {}

impl<T: GodotClass> PartialEq for Obj<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T: GodotClass> Eq for Obj<T> {}

impl<T: GodotClass> Hash for Obj<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state)
    }
}

impl<T: GodotClass> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj<{}>({:?})", T::CLASS_NAME, self.handle)
    }
}
