/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Errors in the gdlink library.

mod error_code;
mod handle_error;
mod registry_error;

pub use error_code::*;
pub use handle_error::*;
pub use registry_error::*;
