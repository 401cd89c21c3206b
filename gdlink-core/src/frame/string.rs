/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Conversion between Rust text and engine `String` values.
//!
//! Engine strings are opaque: their storage is one pointer-sized word, created and read back through the interface's UTF-8
//! functions. A string crossing a call is a [`HandleKind::String`] handle like any other builtin.

use crate::error::{HandleError, HandleErrorKind};
use crate::handle::{Borrowed, Finalize, Handle, HandleKind, HandleRegistry, Ownership, RAW_WORDS};
use crate::sys;

const OP_READ_STRING: &str = "read_string";

/// Creates an engine `String` holding `text`. The host owns it; releasing the handle destroys the string.
pub fn new_string<F: Finalize>(engine: sys::Engine, registry: &mut HandleRegistry<F>, text: &str) -> Handle {
    let mut bits = [0; RAW_WORDS];

    // SAFETY: the bits provide zeroed storage for a String, which the constructor overwrites.
    unsafe { engine.new_string(bits.as_mut_ptr() as sys::UninitStringPtr, text) };

    registry.acquire_with(HandleKind::String, bits, Ownership::Host)
}

/// Copies the text of the engine `String` behind `view`.
///
/// Invalid UTF-8 is replaced, not rejected. Fails if the handle is not a string.
pub fn read_string(engine: sys::Engine, view: &Borrowed<'_>) -> Result<String, HandleError> {
    if view.kind() != HandleKind::String {
        return Err(HandleError::new(
            HandleErrorKind::KindMismatch { actual: view.kind() },
            view.handle(),
            OP_READ_STRING,
        ));
    }

    // SAFETY: the view borrows a live String handle, whose bits are the engine's String storage.
    let text = unsafe { engine.string_to_rust(view.bits().as_ptr() as sys::ConstStringPtr) };
    Ok(text)
}
