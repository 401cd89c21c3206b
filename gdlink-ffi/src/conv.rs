/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Conversions from some rust-types into appropriate engine types.

use std::mem::size_of;

use crate::interface::{SysBool, SysInt};
use crate::static_assert;

/// Infallibly convert `u32` into a `usize`.
///
/// gdlink only supports targets where `u32` can be infallibly converted into a `usize`.
pub fn u32_to_usize(i: u32) -> usize {
    static_assert!(
        size_of::<u32>() <= size_of::<usize>(),
        "gdlink only supports targets where u32 <= usize"
    );

    // SAFETY: The above static assert ensures that this can never fail.
    unsafe { i.try_into().unwrap_unchecked() }
}

/// Converts an engine length/count into a `usize`. Negative values (used by the engine as "none") map to 0.
pub fn i64_to_usize(i: SysInt) -> usize {
    usize::try_from(i).unwrap_or(0)
}

/// Converts a rust-bool into a sys-bool.
pub const fn bool_to_sys(value: bool) -> SysBool {
    value as SysBool
}

pub const SYS_TRUE: SysBool = bool_to_sys(true);
pub const SYS_FALSE: SysBool = bool_to_sys(false);
