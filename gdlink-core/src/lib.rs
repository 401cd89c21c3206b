/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! # Internal crate of [**gdlink**](https://docs.rs/gdlink)
//!
//! Do not depend on this crate directly, instead use the `gdlink` crate.
//! No SemVer or other guarantees are provided.

#![cfg_attr(test, allow(unused))]

pub mod classdb;
pub mod config;
pub mod error;
pub mod frame;
pub mod handle;
pub mod init;
pub mod log;
pub mod obj;

#[doc(hidden)]
pub mod private;

pub use gdlink_ffi as sys;
