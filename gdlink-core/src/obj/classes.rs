/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Engine classes known to this crate.
//!
//! Each class is an uninhabited marker type; instances are always accessed through [`Obj<T>`][super::Obj] handles.

use super::{EngineClass, GodotClass, Inherits, NoBase};

macro_rules! engine_class {
    (
        $( #[$attr:meta] )*
        $Class:ident : $Base:ident $( , $Ancestor:ident )* $( ; refcounted = $refcounted:literal )?
    ) => {
        $( #[$attr] )*
        #[derive(Debug)]
        pub enum $Class {}

        impl GodotClass for $Class {
            const CLASS_NAME: &'static str = stringify!($Class);
            type Base = $Base;
            $( const IS_REFCOUNTED: bool = $refcounted; )?
        }

        impl EngineClass for $Class {}
        impl Inherits<$Class> for $Class {}
        impl Inherits<$Base> for $Class {}
        $( impl Inherits<$Ancestor> for $Class {} )*
    };
}

/// Root of the class hierarchy.
#[derive(Debug)]
pub enum Object {}

impl GodotClass for Object {
    const CLASS_NAME: &'static str = "Object";
    type Base = NoBase;
}

impl EngineClass for Object {}
impl Inherits<Object> for Object {}

engine_class!(
    /// Base of all reference-counted classes.
    RefCounted: Object; refcounted = true
);
engine_class!(Resource: RefCounted, Object);
engine_class!(Node: Object);
engine_class!(CanvasItem: Node, Object);
engine_class!(Control: CanvasItem, Node, Object);
engine_class!(
    /// Control that arranges its children; `queue_sort` requests a re-layout.
    Container: Control, CanvasItem, Node, Object
);
engine_class!(Label: Control, CanvasItem, Node, Object);

#[cfg(test)]
mod tests {
    use super::*;

    fn is_refcounted<T: GodotClass>() -> bool {
        T::IS_REFCOUNTED
    }

    #[test]
    fn refcounted_is_inherited() {
        assert!(!is_refcounted::<Object>());
        assert!(is_refcounted::<RefCounted>());
        assert!(is_refcounted::<Resource>());
        assert!(!is_refcounted::<Label>());
    }

    #[test]
    fn class_names() {
        assert_eq!(Container::CLASS_NAME, "Container");
        assert_eq!(<<Container as GodotClass>::Base as GodotClass>::CLASS_NAME, "Control");
    }
}
