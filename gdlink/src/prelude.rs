/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub use super::classdb::{ClassDb, ClassDbBuilder, MethodBind, MethodTable, VirtualTable};
pub use super::config::LinkConfig;
pub use super::error::{ErrorCode, HandleError, RegistryError};
pub use super::frame::{CallFrame, ReturnConvention, VirtualArgs, VirtualReturn};
pub use super::gdlink_entry;
pub use super::handle::{Borrowed, Handle, HandleKind, HandleRegistry, Ownership};
pub use super::init::{ExtensionLibrary, InitLevel, Runtime};
pub use super::log::{godot_error, godot_print, godot_warn};
pub use super::obj::{
    Base, Container, Control, ExtensionClass, GodotClass, Inherits, Label, Node, Obj, Object, RefCounted, Resource,
};
