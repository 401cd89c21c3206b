/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::error::Error;
use std::fmt;

use crate::handle::{Handle, HandleKind};

/// Misuse of a [`Handle`] detected by the registry.
///
/// These are programming errors. The panicking registry operations turn them into panics; the `try_*` variants return them.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct HandleError {
    kind: HandleErrorKind,
    handle: Handle,
    operation: &'static str,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[non_exhaustive]
pub enum HandleErrorKind {
    /// The handle was already released.
    DoubleRelease,

    /// The handle was released, and is now used for something other than release.
    UseAfterRelease,

    /// Ownership was moved to the engine with `transfer_to_foreign`; the handle is no longer tracked.
    UseAfterTransfer,

    /// The handle's slot has since been reused by a newer handle.
    Stale,

    /// Pinned handles live until unpinned (or shutdown) and cannot be released or transferred.
    Pinned,

    /// The slot is live, but holds a resource of a different kind.
    KindMismatch { actual: HandleKind },

    /// The handle was never issued by this registry.
    Invalid,

    /// Binding a handle to this receiver would create a cycle.
    ReceiverCycle,
}

impl HandleError {
    pub(crate) fn new(kind: HandleErrorKind, handle: Handle, operation: &'static str) -> Self {
        Self {
            kind,
            handle,
            operation,
        }
    }

    pub fn kind(&self) -> HandleErrorKind {
        self.kind
    }

    /// The handle that was misused.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Name of the registry operation that detected the misuse, e.g. `"release"`.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            handle, operation, ..
        } = self;

        match self.kind {
            HandleErrorKind::DoubleRelease => write!(f, "double release of {handle}"),
            HandleErrorKind::UseAfterRelease => write!(f, "{operation}: {handle} was already released"),
            HandleErrorKind::UseAfterTransfer => {
                write!(f, "{operation}: {handle} was transferred to the engine and is no longer tracked")
            }
            HandleErrorKind::Stale => write!(f, "{operation}: {handle} is stale (its slot was reused)"),
            HandleErrorKind::Pinned => write!(f, "{operation}: {handle} is pinned"),
            HandleErrorKind::KindMismatch { actual } => {
                write!(f, "{operation}: {handle} refers to a slot holding {actual}")
            }
            HandleErrorKind::Invalid => write!(f, "{operation}: {handle} was not issued by this registry"),
            HandleErrorKind::ReceiverCycle => {
                write!(f, "{operation}: binding {handle} would make it its own receiver")
            }
        }
    }
}

impl Error for HandleError {}
