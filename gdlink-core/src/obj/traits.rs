/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::any::Any;

use super::Base;
use crate::classdb::{MethodTable, VirtualTable};

/// Makes `T` known to the class registry: engine classes and extension classes alike.
pub trait GodotClass: 'static {
    /// Name under which the class is registered in the engine.
    const CLASS_NAME: &'static str;

    /// The immediate superclass. [`NoBase`] for `Object`.
    type Base: GodotClass;

    /// Whether instances are reference-counted, i.e. whether `RefCounted` is an ancestor.
    const IS_REFCOUNTED: bool = <Self::Base as GodotClass>::IS_REFCOUNTED;
}

/// Type representing the absence of a base class, at the root of the hierarchy.
///
/// This is an enum without any variants, as no instance of it ever exists.
#[derive(Debug)]
pub enum NoBase {}

impl GodotClass for NoBase {
    const CLASS_NAME: &'static str = "";
    type Base = NoBase;
    const IS_REFCOUNTED: bool = false;
}

/// Classes implemented by the engine itself.
pub trait EngineClass: GodotClass {}

/// Non-strict inheritance: `Derived: Inherits<Base>` means `Derived` is `Base` or one of its subclasses.
///
/// Implemented for all declared engine classes, and for extension classes through their `Base`.
pub trait Inherits<Base: GodotClass>: GodotClass {}

impl<T, U> Inherits<U> for T
where
    T: ExtensionClass,
    T::Base: Inherits<U>,
    U: GodotClass,
{
}

/// Host-defined class that extends an engine class (or another extension class).
///
/// The engine creates instances through the class registry: it constructs the nearest engine ancestor, then calls
/// [`init`](Self::init) with a [`Base`] pointing to it.
pub trait ExtensionClass: GodotClass + Sized {
    fn init(base: Base<Self::Base>) -> Self;

    /// Declares the engine virtuals this class overrides.
    fn register_virtuals(table: &mut VirtualTable<Self>) {
        let _ = table;
    }

    /// Declares the methods this class exposes to the engine, callable like any engine method.
    fn register_methods(table: &mut MethodTable<Self>) {
        let _ = table;
    }

    /// Called for every notification the engine sends to the object, e.g. `NOTIFICATION_READY` (13).
    fn on_notification(&mut self, what: i32) {
        let _ = what;
    }

    /// Text the engine shows for the object, e.g. in `str(object)`. `None` keeps the engine's default.
    fn display_string(&self) -> Option<String> {
        None
    }

    /// Instance of the parent extension class embedded in `self`, if `Base` is an extension class.
    ///
    /// Needed so that inherited overrides dispatch to the right part of the object.
    fn parent_instance(&mut self) -> Option<&mut dyn ExtensionInstance> {
        None
    }
}

/// Object-safe view on an [`ExtensionClass`] instance, as stored behind the engine's instance pointer.
pub trait ExtensionInstance: Any {
    fn class_name(&self) -> &'static str;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn parent_instance(&mut self) -> Option<&mut dyn ExtensionInstance>;

    fn on_notification(&mut self, what: i32);

    fn display_string(&self) -> Option<String>;
}

impl<T: ExtensionClass> ExtensionInstance for T {
    fn class_name(&self) -> &'static str {
        T::CLASS_NAME
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn parent_instance(&mut self) -> Option<&mut dyn ExtensionInstance> {
        ExtensionClass::parent_instance(self)
    }

    fn on_notification(&mut self, what: i32) {
        ExtensionClass::on_notification(self, what)
    }

    fn display_string(&self) -> Option<String> {
        ExtensionClass::display_string(self)
    }
}

/// Finds the part of `instance` that is a `T`: the instance itself, or one of its embedded parents.
pub(crate) fn downcast_instance<T: 'static>(
    mut instance: &mut dyn ExtensionInstance,
) -> Option<&mut T> {
    loop {
        if instance.as_any_mut().is::<T>() {
            return instance.as_any_mut().downcast_mut::<T>();
        }

        instance = instance.parent_instance()?;
    }
}
