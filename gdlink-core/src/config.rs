/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::handle::DEFAULT_CAPACITY;

/// Library-wide settings, provided through [`ExtensionLibrary::config()`][crate::init::ExtensionLibrary::config].
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Maximum number of simultaneously live handles. Exceeding it aborts.
    pub handle_capacity: usize,

    /// Report host-owned handles that are still live at shutdown.
    pub warn_on_leaks: bool,

    /// Reject raw overrides of virtual methods that no engine ancestor declares.
    ///
    /// Typed overrides are checked regardless: the virtual must be declared with matching types.
    pub validate_virtuals: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            handle_capacity: DEFAULT_CAPACITY,
            warn_on_leaks: true,
            validate_virtuals: true,
        }
    }
}
