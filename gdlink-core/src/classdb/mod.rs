/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Class and method binding registry.
//!
//! Two states: a [`ClassDbBuilder`] collects declarations, and [`ClassDbBuilder::finish`] turns it into an immutable
//! [`ClassDb`] that resolves methods for outgoing calls, and virtuals and exposed methods for incoming ones.

mod builder;
mod callbacks;
mod class_db;
mod host_method;
mod method;
pub mod reflection;
mod storage;
mod virtuals;

pub use builder::ClassDbBuilder;
pub use class_db::{ClassDb, ClassInfo};
pub use host_method::{HostMethod, MethodTable};
pub use method::MethodBind;
pub use virtuals::{VirtualSignature, VirtualTable, VirtualTarget};
