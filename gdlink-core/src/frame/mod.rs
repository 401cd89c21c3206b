/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Marshaling of arguments and return values across the `ptrcall` ABI.
//!
//! Outgoing calls go through a [`CallFrame`]: arguments are pushed in declared order, [`CallFrame::invoke`] crosses into the
//! engine, and the resulting [`RawReturn`] is decoded by value or registered as a handle under a [`ReturnConvention`].
//! Incoming virtual calls mirror this with [`VirtualArgs`] and [`VirtualReturn`]. Engine strings are created and read back
//! with [`new_string`] and [`read_string`].

mod abi;
mod call_frame;
mod params;
mod ret;
mod string;
mod virtual_args;

pub use abi::{AbiValue, RawObject, Slot, SLOT_BYTES, SLOT_WORDS};
pub use call_frame::{CallFrame, FrameArg};
pub use params::{InParamTuple, ParamTuple};
pub use ret::{RawReturn, ReturnConvention};
pub use string::{new_string, read_string};
pub use virtual_args::{VirtualArgs, VirtualReturn};

pub(crate) use abi::abi_type_matches;
