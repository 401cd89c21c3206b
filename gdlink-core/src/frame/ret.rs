/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use super::abi::{decode, AbiValue, Slot, SLOT_WORDS};
use crate::error::HandleError;
use crate::handle::{object_bits, Finalize, Handle, HandleKind, HandleRegistry, Ownership, RawBits, RAW_WORDS};
use crate::obj::{GodotClass, Obj};
use crate::sys;

/// How the engine hands over a returned resource.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ReturnConvention {
    /// The caller takes ownership; the handle becomes [`Ownership::Host`].
    ///
    /// Refcounted objects get an extra reference, since ptrcalls return them without one.
    CallerOwns,

    /// Valid as long as the given receiver lives; the handle becomes [`Ownership::Shared`] and is released with it.
    BoundToReceiver(Handle),

    /// The engine keeps ownership; the handle becomes an [`Ownership::Borrowed`] view.
    EngineRetains,
}

/// Return slot of a finished engine call. Read it exactly once.
#[must_use = "the return value of an engine call must be read or explicitly discarded"]
pub struct RawReturn {
    slot: Slot,
    engine: sys::Engine,
}

impl RawReturn {
    pub(crate) fn new(engine: sys::Engine) -> Self {
        Self {
            slot: [0; SLOT_WORDS],
            engine,
        }
    }

    pub(crate) fn slot_ptr(&mut self) -> sys::TypePtr {
        self.slot.as_mut_ptr() as sys::TypePtr
    }

    pub fn words(&self) -> &Slot {
        &self.slot
    }

    /// Decodes a by-value return.
    ///
    /// # Safety
    /// `R` must be the method's declared return type.
    pub unsafe fn read<R: AbiValue>(self) -> R {
        decode(&self.slot)
    }

    /// Explicitly ignores the returned value. Only valid for by-value returns; resources must be registered.
    pub fn discard(self) {}

    /// Registers a returned resource of `kind` according to `convention`.
    ///
    /// Objects are asked whether they are refcounted, so a `RefCounted` returned as plain `Object` still gets its reference
    /// taken and given back. Returns `Ok(None)` for null objects. Fails without registering anything if a `BoundToReceiver` receiver is dead.
    pub fn read_handle<F: Finalize>(
        self,
        registry: &mut HandleRegistry<F>,
        kind: HandleKind,
        convention: ReturnConvention,
    ) -> Result<Option<Handle>, HandleError> {
        self.read_handle_impl(registry, kind, convention, false)
    }

    /// Registers a returned object of static class `T`.
    pub fn read_object<T: GodotClass, F: Finalize>(
        self,
        registry: &mut HandleRegistry<F>,
        convention: ReturnConvention,
    ) -> Result<Option<Obj<T>>, HandleError> {
        let handle = self.read_handle_impl(registry, HandleKind::Object, convention, T::IS_REFCOUNTED)?;
        Ok(handle.map(Obj::from_handle))
    }

    fn read_handle_impl<F: Finalize>(
        self,
        registry: &mut HandleRegistry<F>,
        kind: HandleKind,
        convention: ReturnConvention,
        statically_refcounted: bool,
    ) -> Result<Option<Handle>, HandleError> {
        let bits: RawBits = if kind.is_object() {
            let object = self.slot[0] as sys::ObjectPtr;
            if object.is_null() {
                return Ok(None);
            }

            // SAFETY: the engine just returned this object, so it is alive.
            let (instance_id, refcounted) = unsafe {
                let refcounted = statically_refcounted || registry.finalizer().is_refcounted(object);
                (self.engine.instance_id(object), refcounted)
            };
            object_bits(object, instance_id, refcounted)
        } else {
            let words = kind.abi_words();
            let mut bits = [0; RAW_WORDS];
            bits[..words].copy_from_slice(&self.slot[..words]);
            bits
        };

        let handle = match convention {
            ReturnConvention::CallerOwns => {
                // SAFETY: bits describe a live resource of `kind`, see above.
                unsafe { registry.finalizer().retain(kind, &bits) };
                registry.acquire_with(kind, bits, Ownership::Host)
            }
            ReturnConvention::BoundToReceiver(receiver) => {
                // Check first, so that a dead receiver doesn't leave a dangling entry behind.
                registry.try_inspect(receiver)?;

                let handle = registry.acquire_with(kind, bits, Ownership::Shared);
                registry.try_bind_to_receiver(handle, receiver)?;
                handle
            }
            ReturnConvention::EngineRetains => registry.acquire_with(kind, bits, Ownership::Borrowed),
        };

        Ok(Some(handle))
    }
}

impl fmt::Debug for RawReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawReturn({:#x?})", self.slot)
    }
}
