/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Internals shared between modules and the `gdlink_entry!` macro. Not part of the public API.

use std::fmt;
use std::panic::UnwindSafe;

/// Executes `code`. If a panic is thrown, it is caught and an error message is printed to the engine.
///
/// Returns `Err(message)` if a panic occurred, and `Ok(result)` with the result of `code` otherwise. Every `extern "C"`
/// function called by the engine goes through this, since unwinding into engine frames is not allowed.
pub fn handle_panic<E, F, R, S>(error_context: E, code: F) -> Result<R, String>
where
    E: FnOnce() -> S,
    F: FnOnce() -> R + UnwindSafe,
    S: fmt::Display,
{
    match std::panic::catch_unwind(code) {
        Ok(result) => Ok(result),
        Err(err) => {
            let msg = format_panic_message(extract_panic_message(err));

            crate::godot_error!("Rust function panicked.\n  Context: {}", error_context());
            crate::godot_error!("{msg}");
            Err(msg)
        }
    }
}

pub fn extract_panic_message(err: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = err.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        format!("(panic of type ID {:?})", err.type_id())
    }
}

fn format_panic_message(msg: String) -> String {
    // If the message contains newlines, print all of the lines after a line break, and indent them.
    let lbegin = "\n  ";
    let indented = msg.replace('\n', lbegin);

    if indented.len() != msg.len() {
        format!("[panic]{lbegin}{indented}")
    } else {
        format!("[panic]  {msg}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_become_errors() {
        let result: Result<(), String> = handle_panic(|| "test context", || panic!("boom"));
        assert_eq!(result, Err("[panic]  boom".to_string()));

        let result: Result<i32, String> = handle_panic(|| "test context", || panic!("{}\n{}", "first", "second"));
        assert_eq!(result, Err("[panic]\n  first\n  second".to_string()));
    }

    #[test]
    fn results_pass_through() {
        assert_eq!(handle_panic(|| "unused", || 42), Ok(42));
    }
}
