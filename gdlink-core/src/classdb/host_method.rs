/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::virtuals::{ErasedVirtual, VirtualSignature};
use crate::frame::{AbiValue, InParamTuple, VirtualArgs, VirtualReturn};
use crate::obj::{downcast_instance, ExtensionClass, ExtensionInstance};
use crate::sys;

/// One exposed method, as declared in [`ExtensionClass::register_methods`].
#[derive(Clone)]
pub(crate) struct MethodEntry {
    pub name: String,
    pub signature: VirtualSignature,
    pub flags: sys::MethodFlags,
    pub call: ErasedVirtual,
}

/// Methods an extension class exposes to the engine.
///
/// Handed to [`ExtensionClass::register_methods`]. Once the class is registered, the engine (and scripts) call them through
/// `ptrcall`, exactly like engine methods.
pub struct MethodTable<T: ExtensionClass> {
    entries: Vec<MethodEntry>,
    _class: PhantomData<fn(T)>,
}

impl<T: ExtensionClass> MethodTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            _class: PhantomData,
        }
    }

    /// Exposes `method` under `name`. Parameters arrive as a tuple in declared order.
    pub fn func<P, R>(&mut self, name: &str, method: fn(&mut T, P) -> R) -> &mut Self
    where
        P: InParamTuple + 'static,
        R: AbiValue + 'static,
    {
        let call = move |instance: &mut dyn ExtensionInstance, args: VirtualArgs<'_>, ret: VirtualReturn<'_>| {
            let Some(this) = downcast_instance::<T>(instance) else {
                crate::godot_error!("method call on an instance that does not contain `{}`", T::CLASS_NAME);
                return;
            };

            // SAFETY: the engine passes arguments as registered, i.e. according to P and R.
            let params = unsafe { args.read_tuple::<P>() };
            let result = method(this, params);
            unsafe { ret.set(result) };
        };

        // A later method of the same name replaces the earlier one.
        self.entries.retain(|existing| existing.name != name);
        self.entries.push(MethodEntry {
            name: name.to_owned(),
            signature: VirtualSignature::from_static(P::TYPE_NAMES, R::TYPE_NAME),
            flags: sys::METHOD_FLAGS_DEFAULT,
            call: Arc::new(call),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<MethodEntry> {
        self.entries
    }
}

/// Exposed method of an extension class, after registration. Its address is the engine's method userdata.
pub struct HostMethod {
    name: String,
    pub(crate) name_ptr: sys::ConstStringNamePtr,
    signature: VirtualSignature,
    flags: sys::MethodFlags,
    call: ErasedVirtual,
}

impl HostMethod {
    pub(crate) fn new(entry: &MethodEntry, name_ptr: sys::ConstStringNamePtr) -> Self {
        Self {
            name: entry.name.clone(),
            name_ptr,
            signature: entry.signature.clone(),
            flags: entry.flags,
            call: entry.call.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &VirtualSignature {
        &self.signature
    }

    pub fn argument_count(&self) -> usize {
        self.signature.params.len()
    }

    pub fn has_return_value(&self) -> bool {
        self.signature.ret != <() as AbiValue>::TYPE_NAME
    }

    pub(crate) fn method_info(&self) -> sys::ClassMethodInfo {
        sys::ClassMethodInfo {
            name: self.name_ptr,
            method_userdata: self as *const HostMethod as *mut std::ffi::c_void,
            ptrcall_func: Some(super::callbacks::call_host_method),
            method_flags: self.flags,
            has_return_value: sys::conv::bool_to_sys(self.has_return_value()),
            argument_count: self.argument_count() as u32,
        }
    }

    /// Runs the method on `instance`.
    ///
    /// # Safety
    /// `args` and `ret` must match the method's signature.
    pub(crate) unsafe fn call(&self, instance: &mut dyn ExtensionInstance, args: VirtualArgs<'_>, ret: VirtualReturn<'_>) {
        (self.call)(instance, args, ret)
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMethod")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}
