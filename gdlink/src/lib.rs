/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The **gdlink** library is the ownership and call layer of a GDExtension binding for [Godot 4](https://godotengine.org).
//!
//! It sits between Rust code and the engine's C interface and is responsible for three things:
//!
//! 1. **Handle ownership.** Every engine value reachable from Rust (objects, strings, arrays, ...) is represented by a
//!    [`Handle`][handle::Handle] in a [`HandleRegistry`][handle::HandleRegistry]. A handle records who is responsible for
//!    destroying the value: Rust ([`Host`][handle::Ownership::Host]), the engine ([`Engine`][handle::Ownership::Engine]),
//!    or the lifetime of another object ([`Shared`][handle::Ownership::Shared]). Handles are generational: using one after
//!    release yields [`HandleError`][error::HandleError] instead of touching freed memory.<br><br>
//!
//! 2. **Call frames.** Arguments for engine methods are marshaled into a [`CallFrame`][frame::CallFrame], whose slots have
//!    exactly the layout that the `ptrcall` ABI expects. Borrowed handles placed into a frame keep the registry borrowed
//!    until the call is done, so a value cannot be released while the engine reads it.<br><br>
//!
//! 3. **Class registry.** Engine classes, their method binds and virtual methods, as well as Rust-defined extension classes,
//!    are declared on a [`ClassDbBuilder`][classdb::ClassDbBuilder] and frozen into a [`ClassDb`][classdb::ClassDb].
//!    Method lookups walk the inheritance chain; virtual calls from the engine are routed to the most derived override.
//!
//! # Runtime
//!
//! There is no global state besides the engine interface table. The [`Runtime`][init::Runtime] is built when the engine
//! reaches the library's minimum init level, and handed to the [`ExtensionLibrary`][init::ExtensionLibrary] callbacks.
//!
//! # Cargo features
//!
//! The following features can be enabled for this crate. All of them are off by default.
//!
//! * **`serde`**
//!
//!   Implement the [serde](https://docs.rs/serde) traits `Serialize` and `Deserialize` for [`LinkConfig`][config::LinkConfig]
//!   and handle statistics.
//!   <br><br>
//!
//! # Public API
//!
//! The following API symbols are considered private:
//!
//! * Symbols annotated with `#[doc(hidden)]`.
//! * Any of the dependency crates (crate `gdlink` is the only public interface).
//! * Modules named `private` and all their contents.

#[doc(inline)]
pub use gdlink_core::{classdb, config, error, frame, handle, init, log, obj};

#[doc(hidden)]
pub use gdlink_core::private;

/// Entry point and global init/shutdown of the library.
pub use gdlink_core::gdlink_entry;

/// Low-level engine interface.
///
/// Only needed to implement mock engines or to call interface functions not covered by this crate.
pub use gdlink_core::sys;

/// Often-imported symbols.
pub mod prelude;
