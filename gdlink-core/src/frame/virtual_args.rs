/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::marker::PhantomData;

use super::abi::{AbiValue, RawObject};
use super::params::InParamTuple;
use crate::sys;

/// Arguments of an engine → host virtual call, valid for the duration of the callback.
///
/// The engine does not pass an argument count; the reading side relies on the virtual's declared signature.
pub struct VirtualArgs<'c> {
    args: *const sys::ConstTypePtr,
    _call: PhantomData<&'c ()>,
}

impl VirtualArgs<'_> {
    /// # Safety
    /// `args` must be the argument array of the ongoing callback.
    pub unsafe fn from_sys(args: *const sys::ConstTypePtr) -> Self {
        Self {
            args,
            _call: PhantomData,
        }
    }

    /// Reads the argument at `index`.
    ///
    /// # Safety
    /// The virtual must declare a parameter at `index`, of type `T`.
    pub unsafe fn get<T: AbiValue>(&self, index: usize) -> T {
        T::abi_read(self.raw(index))
    }

    /// Reads an object argument. May be null.
    ///
    /// # Safety
    /// See [`get`](Self::get).
    pub unsafe fn object(&self, index: usize) -> RawObject {
        self.get::<RawObject>(index)
    }

    /// Reads all arguments at once, in declared order.
    ///
    /// # Safety
    /// `P` must match the virtual's declared parameters.
    pub unsafe fn read_tuple<P: InParamTuple>(&self) -> P {
        P::read_from(self.args)
    }

    /// Pointer to the argument at `index`.
    ///
    /// # Safety
    /// The virtual must declare a parameter at `index`.
    pub unsafe fn raw(&self, index: usize) -> sys::ConstTypePtr {
        *self.args.add(index)
    }
}

/// Return slot of an engine → host virtual call.
pub struct VirtualReturn<'c> {
    ret: sys::TypePtr,
    _call: PhantomData<&'c mut ()>,
}

impl VirtualReturn<'_> {
    /// # Safety
    /// `ret` must be the return pointer of the ongoing callback (null for `void` virtuals).
    pub unsafe fn from_sys(ret: sys::TypePtr) -> Self {
        Self {
            ret,
            _call: PhantomData,
        }
    }

    pub fn is_void(&self) -> bool {
        self.ret.is_null()
    }

    /// Writes the return value. Ignored for `void` virtuals.
    ///
    /// # Safety
    /// `T` must be the virtual's declared return type.
    pub unsafe fn set<T: AbiValue>(self, value: T) {
        if !self.ret.is_null() {
            value.abi_write(self.ret);
        }
    }
}
