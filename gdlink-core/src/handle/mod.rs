/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Ownership tracking for engine resources.
//!
//! Every engine resource the host touches (objects, strings, arrays, ...) is represented by a [`Handle`] issued by a
//! [`HandleRegistry`]. The registry records who owns the resource, and is the only place where the raw bits can be read.
//! Copying a `Handle` does not copy ownership; releasing, transferring and borrowing all go through the registry, which
//! detects use of dead handles through generation counters.

mod borrowed;
mod finalize;
mod kind;
mod registry;

use std::fmt;

use crate::sys;

pub use borrowed::Borrowed;
pub use finalize::{EngineFinalizer, Finalize};
pub use kind::{HandleKind, PackedElement};
pub use registry::{HandleRegistry, DEFAULT_CAPACITY};

/// Number of 64-bit words in [`RawBits`].
pub const RAW_WORDS: usize = 3;

/// Fixed-width representation of an engine resource as it crosses the ABI.
///
/// Objects store `[object pointer, instance ID, refcounted flag]`; builtin values store their opaque payload in the
/// leading words. All-zero bits mean "nothing allocated".
pub type RawBits = [u64; RAW_WORDS];

/// Builds the bits for an engine object.
pub fn object_bits(object: sys::ObjectPtr, instance_id: sys::InstanceId, refcounted: bool) -> RawBits {
    [object as u64, instance_id, refcounted as u64]
}

// ----------------------------------------------------------------------------------------------------------------------------------------------

/// Opaque reference to an engine resource, issued by a [`HandleRegistry`].
///
/// A handle is meaningless without the registry that issued it. It stays `Copy` so it can be stored freely; validity is
/// checked on every registry access.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
    kind: HandleKind,
}

impl Handle {
    pub(crate) fn new(index: u32, generation: u32, kind: HandleKind) -> Self {
        Self {
            index,
            generation,
            kind,
        }
    }

    pub fn kind(self) -> HandleKind {
        self.kind
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({} #{}/v{})", self.kind, self.index, self.generation)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ----------------------------------------------------------------------------------------------------------------------------------------------

/// Which side of the boundary is responsible for freeing a resource.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Ownership {
    /// The host must release it; releasing destroys the resource.
    Host,

    /// The engine frees it; releasing only ends tracking.
    Engine,

    /// Lifetime is bound to a receiver handle and ends with it.
    Shared,

    /// A view with no ownership at all.
    Borrowed,
}

/// Snapshot of a live handle's registry entry.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct HandleInfo {
    pub kind: HandleKind,
    pub ownership: Ownership,
    pub pinned: bool,
    pub receiver: Option<Handle>,
    pub dependents: usize,
    pub bits: RawBits,
}

/// Counters describing the registry's current state and history.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HandleStats {
    pub live: usize,
    pub host: usize,
    pub engine: usize,
    pub shared: usize,
    pub borrowed: usize,
    pub pinned: usize,
    pub acquired_total: u64,
    pub released_total: u64,
    pub transferred_total: u64,
}
