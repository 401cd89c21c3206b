/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::marker::PhantomData;

use super::{Handle, HandleKind, RawBits};
use crate::sys;

/// Read-only view of a handle's raw bits, valid while the registry stays borrowed.
///
/// Obtained from [`HandleRegistry::borrow()`][super::HandleRegistry::borrow]. The view shares the registry borrow, so no
/// handle can be released or transferred while it exists. It is neither `Copy` nor `Clone`: pushing it into a
/// [`CallFrame`][crate::frame::CallFrame] moves it there, and it dies with the frame.
pub struct Borrowed<'r> {
    handle: Handle,
    bits: RawBits,
    _registry: PhantomData<&'r ()>,
}

impl<'r> Borrowed<'r> {
    pub(super) fn new(handle: Handle, bits: RawBits) -> Self {
        Self {
            handle,
            bits,
            _registry: PhantomData,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn kind(&self) -> HandleKind {
        self.handle.kind()
    }

    pub fn bits(&self) -> &RawBits {
        &self.bits
    }

    /// The leading words passed through the ABI for this kind.
    pub fn abi_words(&self) -> &[u64] {
        &self.bits[..self.kind().abi_words()]
    }

    /// Object pointer, or null if this is not an object handle.
    pub fn object_ptr(&self) -> sys::ObjectPtr {
        if self.kind().is_object() {
            self.bits[0] as sys::ObjectPtr
        } else {
            std::ptr::null_mut()
        }
    }

    pub fn instance_id(&self) -> Option<sys::InstanceId> {
        match self.kind() {
            HandleKind::Object if self.bits[1] != 0 => Some(self.bits[1]),
            _ => None,
        }
    }
}

impl fmt::Debug for Borrowed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Borrowed")
            .field("handle", &self.handle)
            .field("bits", &format_args!("{:#x?}", self.bits))
            .finish()
    }
}
