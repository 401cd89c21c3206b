/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::frame::{AbiValue, InParamTuple, VirtualArgs, VirtualReturn};
use crate::obj::{downcast_instance, ExtensionClass, ExtensionInstance};

pub(crate) type ErasedVirtual =
    Arc<dyn Fn(&mut dyn ExtensionInstance, VirtualArgs<'_>, VirtualReturn<'_>) + Send + Sync>;

/// Parameter and return types of a virtual, as reflection type names.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct VirtualSignature {
    pub params: Vec<String>,
    pub ret: String,
}

impl VirtualSignature {
    pub(crate) fn from_static(params: &[&str], ret: &str) -> Self {
        Self {
            params: params.iter().map(|&p| p.to_owned()).collect(),
            ret: ret.to_owned(),
        }
    }
}

impl fmt::Display for VirtualSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) -> {}", self.params.join(", "), self.ret)
    }
}

/// One override, as declared by a class in [`ExtensionClass::register_virtuals`].
#[derive(Clone)]
pub(crate) struct VirtualEntry {
    pub name: String,
    /// `None` for raw overrides, which read their arguments themselves.
    pub signature: Option<VirtualSignature>,
    pub call: ErasedVirtual,
}

/// Overrides of engine virtuals declared by one extension class.
///
/// Handed to [`ExtensionClass::register_virtuals`]. Each override is keyed by the engine's virtual name (e.g. `"_process"`).
pub struct VirtualTable<T: ExtensionClass> {
    entries: Vec<VirtualEntry>,
    _class: PhantomData<fn(T)>,
}

impl<T: ExtensionClass> VirtualTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            _class: PhantomData,
        }
    }

    /// Overrides `name` with a typed method.
    ///
    /// Parameters arrive as a tuple in declared order. The parameter and return types are checked against the engine's
    /// declaration while the registry is built; a virtual declared without types cannot be overridden this way.
    pub fn method<P, R>(&mut self, name: &str, method: fn(&mut T, P) -> R) -> &mut Self
    where
        P: InParamTuple + 'static,
        R: AbiValue + 'static,
    {
        let call = move |instance: &mut dyn ExtensionInstance, args: VirtualArgs<'_>, ret: VirtualReturn<'_>| {
            let Some(this) = downcast_instance::<T>(instance) else {
                crate::godot_error!("virtual call on an instance that does not contain `{}`", T::CLASS_NAME);
                return;
            };

            // SAFETY: the engine passes arguments according to its declaration, which P and R were checked against.
            let params = unsafe { args.read_tuple::<P>() };
            let result = method(this, params);
            unsafe { ret.set(result) };
        };

        self.push(VirtualEntry {
            name: name.to_owned(),
            signature: Some(VirtualSignature::from_static(P::TYPE_NAMES, R::TYPE_NAME)),
            call: Arc::new(call),
        })
    }

    /// Overrides `name` with a function that reads arguments and writes the return value itself.
    ///
    /// # Safety
    /// `function` must access arguments and the return slot according to the engine's declaration of the virtual.
    pub unsafe fn raw<F>(&mut self, name: &str, function: F) -> &mut Self
    where
        F: Fn(&mut T, VirtualArgs<'_>, VirtualReturn<'_>) + Send + Sync + 'static,
    {
        let call = move |instance: &mut dyn ExtensionInstance, args: VirtualArgs<'_>, ret: VirtualReturn<'_>| {
            match downcast_instance::<T>(instance) {
                Some(this) => function(this, args, ret),
                None => crate::godot_error!("virtual call on an instance that does not contain `{}`", T::CLASS_NAME),
            }
        };

        self.push(VirtualEntry {
            name: name.to_owned(),
            signature: None,
            call: Arc::new(call),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<VirtualEntry> {
        self.entries
    }

    // A later override of the same name replaces the earlier one.
    fn push(&mut self, entry: VirtualEntry) -> &mut Self {
        self.entries.retain(|existing| existing.name != entry.name);
        self.entries.push(entry);
        self
    }
}

/// Dispatch target of an engine → host virtual call, from the flattened virtual table of a class.
pub struct VirtualTarget {
    name: String,
    declared_in: String,
    signature: Option<VirtualSignature>,
    call: ErasedVirtual,
}

impl VirtualTarget {
    pub(crate) fn new(entry: &VirtualEntry, declared_in: &str) -> Self {
        Self {
            name: entry.name.clone(),
            declared_in: declared_in.to_owned(),
            signature: entry.signature.clone(),
            call: entry.call.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class whose override this is. Differs from the resolved class when the override is inherited.
    pub fn declared_in(&self) -> &str {
        &self.declared_in
    }

    pub fn signature(&self) -> Option<&VirtualSignature> {
        self.signature.as_ref()
    }

    /// Runs the override on `instance`.
    ///
    /// # Safety
    /// `args` and `ret` must come from an engine call of this virtual.
    pub unsafe fn call(&self, instance: &mut dyn ExtensionInstance, args: VirtualArgs<'_>, ret: VirtualReturn<'_>) {
        (self.call)(instance, args, ret)
    }
}

impl fmt::Debug for VirtualTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTarget")
            .field("name", &self.name)
            .field("declared_in", &self.declared_in)
            .field("signature", &self.signature)
            .finish()
    }
}
