/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Printing and logging functionality.
//!
//! Messages go to the engine's console when an engine is bound, and to stderr/stdout otherwise (unit tests, or calls made
//! before load and after unload).

use std::fmt;

use crate::sys;

/// Pushes a warning message to the engine's output, like `format!` would format it.
#[macro_export]
macro_rules! godot_warn {
    ($fmt:literal $(, $args:expr)* $(,)?) => {
        $crate::log::print_message(
            $crate::log::Severity::Warning,
            format_args!($fmt $(, $args)*),
            file!(),
            line!(),
        )
    };
}

/// Pushes an error message to the engine's output, like `format!` would format it.
#[macro_export]
macro_rules! godot_error {
    ($fmt:literal $(, $args:expr)* $(,)?) => {
        $crate::log::print_message(
            $crate::log::Severity::Error,
            format_args!($fmt $(, $args)*),
            file!(),
            line!(),
        )
    };
}

/// Prints a plain message. Without a bound engine this goes to stdout.
#[macro_export]
macro_rules! godot_print {
    ($fmt:literal $(, $args:expr)* $(,)?) => {
        $crate::log::print_message(
            $crate::log::Severity::Info,
            format_args!($fmt $(, $args)*),
            file!(),
            line!(),
        )
    };
}

pub use crate::{godot_error, godot_print, godot_warn};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[doc(hidden)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[doc(hidden)]
pub fn print_message(severity: Severity, message: fmt::Arguments<'_>, file: &str, line: u32) {
    let message = message.to_string();

    match (severity, sys::binding::try_engine()) {
        (Severity::Warning, Some(engine)) => engine.print_warning(&message, "<gdlink>", file, line),
        (Severity::Error, Some(engine)) => engine.print_error(&message, "<gdlink>", file, line),
        (Severity::Warning, None) => eprintln!("WARNING: {message}\n   at {file}:{line}"),
        (Severity::Error, None) => eprintln!("ERROR: {message}\n   at {file}:{line}"),

        // The interface table has no plain print function; stdout is what the engine itself uses.
        (Severity::Info, _) => println!("{message}"),
    }
}
