/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Typed object handles and the class traits they are built on.

mod base;
mod classes;
mod traits;
mod typed;

pub use base::Base;
pub use classes::*;
pub use traits::{EngineClass, ExtensionClass, ExtensionInstance, GodotClass, Inherits, NoBase};
pub use typed::Obj;

pub(crate) use traits::downcast_instance;
