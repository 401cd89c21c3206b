/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Low level bindings to the engine's C interface.
//!
//! # Internal crate
//!
//! Do not depend on this crate directly, use the `gdlink` crate instead.

#![cfg_attr(test, allow(unused))]

pub mod binding;
pub mod conv;
pub mod engine;
mod init_level;
pub mod interface;
mod string_cache;
mod toolbox;

pub use engine::Engine;
pub use init_level::InitLevel;
pub use interface::*;
pub use string_cache::StringCache;
pub use toolbox::{c_str, c_str_to_str};

/// Opaque storage for an engine `StringName` (one pointer-sized word).
pub type OpaqueStringName = [u64; 1];

/// Opaque storage for an engine `String` (one pointer-sized word).
pub type OpaqueString = [u64; 1];

static_assert!(std::mem::size_of::<*const ()>() <= std::mem::size_of::<u64>(), "gdlink requires pointers of at most 64 bits");
