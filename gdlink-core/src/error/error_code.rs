/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::error::Error;
use std::fmt;

/// Error code returned by engine methods (the engine's global `Error` enum).
///
/// Codes are passed through exactly as the engine returned them, including ordinals this library does not know.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ErrorCode {
    ord: i32,
}

macro_rules! error_codes {
    ($( $name:ident = $ord:literal, )*) => {
        impl ErrorCode {
            $(
                pub const $name: Self = Self { ord: $ord };
            )*

            /// Name of the enumerator as the engine spells it, or `None` for unknown ordinals.
            pub fn as_str(self) -> Option<&'static str> {
                match self.ord {
                    $( $ord => Some(stringify!($name)), )*
                    _ => None,
                }
            }
        }
    };
}

error_codes! {
    OK = 0,
    FAILED = 1,
    ERR_UNAVAILABLE = 2,
    ERR_UNCONFIGURED = 3,
    ERR_UNAUTHORIZED = 4,
    ERR_PARAMETER_RANGE_ERROR = 5,
    ERR_OUT_OF_MEMORY = 6,
    ERR_FILE_NOT_FOUND = 7,
    ERR_FILE_BAD_DRIVE = 8,
    ERR_FILE_BAD_PATH = 9,
    ERR_FILE_NO_PERMISSION = 10,
    ERR_FILE_ALREADY_IN_USE = 11,
    ERR_FILE_CANT_OPEN = 12,
    ERR_FILE_CANT_WRITE = 13,
    ERR_FILE_CANT_READ = 14,
    ERR_FILE_UNRECOGNIZED = 15,
    ERR_FILE_CORRUPT = 16,
    ERR_FILE_MISSING_DEPENDENCIES = 17,
    ERR_FILE_EOF = 18,
    ERR_CANT_OPEN = 19,
    ERR_CANT_CREATE = 20,
    ERR_QUERY_FAILED = 21,
    ERR_ALREADY_IN_USE = 22,
    ERR_LOCKED = 23,
    ERR_TIMEOUT = 24,
    ERR_CANT_CONNECT = 25,
    ERR_CANT_RESOLVE = 26,
    ERR_CONNECTION_ERROR = 27,
    ERR_CANT_ACQUIRE_RESOURCE = 28,
    ERR_CANT_FORK = 29,
    ERR_INVALID_DATA = 30,
    ERR_INVALID_PARAMETER = 31,
    ERR_ALREADY_EXISTS = 32,
    ERR_DOES_NOT_EXIST = 33,
    ERR_DATABASE_CANT_READ = 34,
    ERR_DATABASE_CANT_WRITE = 35,
    ERR_COMPILATION_FAILED = 36,
    ERR_METHOD_NOT_FOUND = 37,
    ERR_LINK_FAILED = 38,
    ERR_SCRIPT_FAILED = 39,
    ERR_CYCLIC_LINK = 40,
    ERR_INVALID_DECLARATION = 41,
    ERR_DUPLICATE_SYMBOL = 42,
    ERR_PARSE_ERROR = 43,
    ERR_BUSY = 44,
    ERR_SKIP = 45,
    ERR_HELP = 46,
    ERR_BUG = 47,
    ERR_PRINTER_ON_FIRE = 48,
}

impl ErrorCode {
    /// Wraps any ordinal; unknown values are preserved.
    pub const fn from_ord(ord: i32) -> Self {
        Self { ord }
    }

    pub const fn ord(self) -> i32 {
        self.ord
    }

    pub const fn is_ok(self) -> bool {
        self.ord == Self::OK.ord
    }

    /// `Ok(())` for [`ErrorCode::OK`], otherwise the code wrapped in an [`EngineError`].
    pub fn into_result(self) -> Result<(), EngineError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(EngineError { code: self })
        }
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::OK
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(name) => write!(f, "ErrorCode::{name}"),
            None => write!(f, "ErrorCode({})", self.ord),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(name) => write!(f, "{name} ({})", self.ord),
            None => write!(f, "unknown error ({})", self.ord),
        }
    }
}

/// A non-`OK` [`ErrorCode`], usable with `?`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct EngineError {
    code: ErrorCode,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine reported {}", self.code)
    }
}

impl Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_names() {
        assert_eq!(ErrorCode::OK.as_str(), Some("OK"));
        assert_eq!(ErrorCode::from_ord(7), ErrorCode::ERR_FILE_NOT_FOUND);
        assert_eq!(ErrorCode::ERR_PRINTER_ON_FIRE.ord(), 48);
        assert_eq!(ErrorCode::from_ord(48).as_str(), Some("ERR_PRINTER_ON_FIRE"));
    }

    #[test]
    fn unknown_codes_pass_through() {
        let code = ErrorCode::from_ord(1234);

        assert_eq!(code.ord(), 1234);
        assert_eq!(code.as_str(), None);
        assert_eq!(code.to_string(), "unknown error (1234)");
        assert_eq!(code.into_result().unwrap_err().code(), code);
    }

    #[test]
    fn into_result() {
        assert_eq!(ErrorCode::OK.into_result(), Ok(()));

        let err = ErrorCode::ERR_CANT_OPEN.into_result().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ERR_CANT_OPEN);
        assert_eq!(err.to_string(), "engine reported ERR_CANT_OPEN (19)");
    }
}
