/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use crate::frame::{AbiValue, CallFrame, ParamTuple};
use crate::handle::Borrowed;
use crate::sys;

/// Resolved engine method: one entry of the binding table.
///
/// Obtained from [`ClassDb::resolve_method`][super::ClassDb::resolve_method]; lives as long as the class registry.
pub struct MethodBind {
    class: String,
    method: String,
    hash: i64,
    ptr: sys::MethodBindPtr,
    engine: sys::Engine,
    arg_count: Option<usize>,
}

impl MethodBind {
    pub(crate) fn new(
        class: &str,
        method: &str,
        hash: i64,
        ptr: sys::MethodBindPtr,
        engine: sys::Engine,
        arg_count: Option<usize>,
    ) -> Self {
        Self {
            class: class.to_owned(),
            method: method.to_owned(),
            hash,
            ptr,
            engine,
            arg_count,
        }
    }

    /// Class declaring the method (which may be an ancestor of the class it was resolved on).
    pub fn class_name(&self) -> &str {
        &self.class
    }

    pub fn method_name(&self) -> &str {
        &self.method
    }

    pub fn hash(&self) -> i64 {
        self.hash
    }

    /// Declared parameter count, if known.
    pub fn arg_count(&self) -> Option<usize> {
        self.arg_count
    }

    pub fn as_ptr(&self) -> sys::MethodBindPtr {
        self.ptr
    }

    pub fn engine(&self) -> sys::Engine {
        self.engine
    }

    /// Typed call on `receiver`: pushes `args` in tuple order and decodes the return value.
    ///
    /// # Safety
    /// `P` and `R` must match the method's declared parameters and return type.
    pub unsafe fn call<'a, P, R>(&self, receiver: &Borrowed<'_>, args: P) -> R
    where
        P: ParamTuple<'a>,
        R: AbiValue,
    {
        let mut frame = CallFrame::with_capacity(P::LEN);
        frame.push_args(args);
        frame.invoke(self, receiver).read()
    }

    /// Typed call of a static method.
    ///
    /// # Safety
    /// See [`call`](Self::call).
    pub unsafe fn call_static<'a, P, R>(&self, args: P) -> R
    where
        P: ParamTuple<'a>,
        R: AbiValue,
    {
        let mut frame = CallFrame::with_capacity(P::LEN);
        frame.push_args(args);
        frame.invoke_static(self).read()
    }
}

impl fmt::Debug for MethodBind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBind")
            .field("method", &format_args!("{}::{}", self.class, self.method))
            .field("hash", &self.hash)
            .field("ptr", &self.ptr)
            .finish()
    }
}

// SAFETY: method binds are immutable engine data, valid for the library lifetime. Thread-safety of the called method is the
// caller's responsibility, as for every engine call.
unsafe impl Send for MethodBind {}
// SAFETY: see above.
unsafe impl Sync for MethodBind {}
