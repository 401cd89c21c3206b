/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::marker::PhantomData;

use super::abi::{encode, AbiValue, Slot, SLOT_WORDS};
use super::params::ParamTuple;
use super::ret::RawReturn;
use crate::classdb::MethodBind;
use crate::error::HandleError;
use crate::handle::{Borrowed, Finalize, Handle, HandleKind, HandleRegistry};
use crate::sys;

/// Transient argument buffer for one engine call.
///
/// Arguments are pushed in the method's declared parameter order; each occupies one zeroed, 8-byte aligned slot holding its
/// ABI encoding. [`invoke`](Self::invoke) consumes the frame, so its buffer is freed as soon as the call returns, on every
/// path including unwinding.
///
/// `'a` is the lifetime of the registry borrows held by pushed handles. While the frame lives, none of those handles can be
/// released:
///
/// ```compile_fail
/// use gdlink_core::frame::CallFrame;
/// use gdlink_core::handle::{HandleKind, HandleRegistry};
///
/// let mut registry = HandleRegistry::new(());
/// let handle = registry.acquire(HandleKind::Object);
///
/// let mut frame = CallFrame::new();
/// frame.push_handle(&registry, handle).unwrap();
/// registry.release(handle); // error: `registry` is still borrowed by `frame`
/// drop(frame);
/// ```
pub struct CallFrame<'a> {
    slots: Vec<Slot>,
    // Holds the kinds of pushed handles for diagnostics; `None` for plain values.
    kinds: Vec<Option<HandleKind>>,
    _borrows: PhantomData<&'a ()>,
}

impl<'a> CallFrame<'a> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(args: usize) -> Self {
        Self {
            slots: Vec::with_capacity(args),
            kinds: Vec::with_capacity(args),
            _borrows: PhantomData,
        }
    }

    /// Appends a by-value argument.
    pub fn push<T: AbiValue>(&mut self, value: T) -> &mut Self {
        self.slots.push(encode(value));
        self.kinds.push(None);
        self
    }

    /// Appends a borrowed handle's raw bits. The view moves into the frame and dies with it.
    pub fn push_borrowed(&mut self, view: Borrowed<'a>) -> &mut Self {
        let words = view.abi_words();

        let mut slot: Slot = [0; SLOT_WORDS];
        slot[..words.len()].copy_from_slice(words);

        self.slots.push(slot);
        self.kinds.push(Some(view.kind()));
        self
    }

    /// Borrows `handle` from `registry` and appends it.
    pub fn push_handle<F: Finalize>(
        &mut self,
        registry: &'a HandleRegistry<F>,
        handle: Handle,
    ) -> Result<&mut Self, HandleError> {
        let view = registry.try_borrow(handle)?;
        Ok(self.push_borrowed(view))
    }

    /// Appends every element of a tuple, in order.
    pub fn push_args<P: ParamTuple<'a>>(&mut self, args: P) -> &mut Self {
        args.push_into(self);
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Encoded words of the argument at `index`.
    pub fn arg_words(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Calls `method` on the object behind `receiver`, consuming the frame.
    ///
    /// # Safety
    /// The pushed arguments must match the method's declared parameters in number, order and type.
    ///
    /// # Panics
    /// If `receiver` is not an object handle.
    pub unsafe fn invoke(self, method: &MethodBind, receiver: &Borrowed<'_>) -> RawReturn {
        assert!(
            receiver.kind().is_object(),
            "{}::{}: receiver {} is not an object",
            method.class_name(),
            method.method_name(),
            receiver.handle()
        );

        self.invoke_raw(method, receiver.object_ptr())
    }

    /// Calls a static `method`, consuming the frame.
    ///
    /// # Safety
    /// See [`invoke`](Self::invoke).
    pub unsafe fn invoke_static(self, method: &MethodBind) -> RawReturn {
        self.invoke_raw(method, std::ptr::null_mut())
    }

    /// The ABI trampoline proper.
    ///
    /// # Safety
    /// See [`invoke`](Self::invoke); additionally `receiver` must be a live object (or null for static methods).
    pub unsafe fn invoke_raw(self, method: &MethodBind, receiver: sys::ObjectPtr) -> RawReturn {
        if let Some(expected) = method.arg_count() {
            debug_assert_eq!(
                self.len(),
                expected,
                "{}::{}: wrong number of arguments pushed",
                method.class_name(),
                method.method_name()
            );
        }

        let args: Vec<sys::ConstTypePtr> = self
            .slots
            .iter()
            .map(|slot| slot.as_ptr() as sys::ConstTypePtr)
            .collect();

        sys::out!(
            "ptrcall {}::{} ({} args) on {receiver:?}",
            method.class_name(),
            method.method_name(),
            args.len()
        );

        let mut ret = RawReturn::new(method.engine());
        method
            .engine()
            .ptrcall(method.as_ptr(), receiver, args.as_ptr(), ret.slot_ptr());

        ret
    }
}

impl Default for CallFrame<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (slot, kind) in self.slots.iter().zip(&self.kinds) {
            match kind {
                Some(kind) => list.entry(&format_args!("{kind} {:#x?}", &slot[..kind.abi_words()])),
                None => list.entry(&format_args!("{:#x?}", slot)),
            };
        }
        list.finish()
    }
}

// ----------------------------------------------------------------------------------------------------------------------------------------------

/// Anything that can be pushed as one argument: by-value [`AbiValue`]s and borrowed handles.
pub trait FrameArg<'a> {
    fn push_to(self, frame: &mut CallFrame<'a>);
}

impl<'a, T: AbiValue> FrameArg<'a> for T {
    fn push_to(self, frame: &mut CallFrame<'a>) {
        frame.push(self);
    }
}

impl<'a> FrameArg<'a> for Borrowed<'a> {
    fn push_to(self, frame: &mut CallFrame<'a>) {
        frame.push_borrowed(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{object_bits, Ownership, PackedElement};

    #[test]
    fn pushes_keep_order_and_encoding() {
        let mut frame = CallFrame::new();
        frame.push(7i32).push(2.5f32).push(true);

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.arg_words(0).unwrap()[0] as i64, 7);
        assert_eq!(f64::from_bits(frame.arg_words(1).unwrap()[0]), 2.5);
        assert_eq!(frame.arg_words(2).unwrap()[0], 1);
        assert!(frame.arg_words(3).is_none());
    }

    #[test]
    fn handles_push_abi_words_only() {
        let mut registry = HandleRegistry::new(());
        let object = registry.acquire_with(
            HandleKind::Object,
            object_bits(0xbeef as sys::ObjectPtr, 12, false),
            Ownership::Engine,
        );
        let packed = registry.acquire_with(
            HandleKind::PackedArray(PackedElement::Byte),
            [0x10, 0x20, 0x30],
            Ownership::Host,
        );

        let mut frame = CallFrame::new();
        frame.push_handle(&registry, object).unwrap();
        frame.push_handle(&registry, packed).unwrap();

        // Objects pass their pointer only; the instance ID stays on the host side.
        assert_eq!(frame.arg_words(0).unwrap(), &[0xbeef, 0, 0, 0]);
        assert_eq!(frame.arg_words(1).unwrap(), &[0x10, 0x20, 0, 0]);
    }

    #[test]
    fn dead_handles_are_not_pushed() {
        let mut registry = HandleRegistry::new(());
        let h = registry.acquire(HandleKind::Object);
        registry.release(h);

        let mut frame = CallFrame::new();
        assert!(frame.push_handle(&registry, h).is_err());
        assert!(frame.is_empty());
    }

    #[test]
    fn tuples_push_in_declared_order() {
        let mut frame = CallFrame::new();
        frame.push_args((1u8, -2i64, 3.0f64));

        let words: Vec<u64> = (0..frame.len()).map(|i| frame.arg_words(i).unwrap()[0]).collect();
        assert_eq!(words, vec![1, (-2i64) as u64, 3.0f64.to_bits()]);
    }
}
