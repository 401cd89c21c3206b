/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::interface::*;

/// Stage of the engine's startup/shutdown sequence.
///
/// Levels are entered in ascending order on startup and left in descending order on shutdown.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum InitLevel {
    /// First level loaded, last unloaded. Core types only.
    Core,

    /// Server singletons (rendering, physics, text) are available.
    Servers,

    /// Scene classes are available. Usual level for registering extension classes.
    Scene,

    /// Editor-only classes; only entered when the editor runs.
    Editor,
}

impl InitLevel {
    #[doc(hidden)]
    pub fn from_sys(level: InitializationLevel) -> Option<Self> {
        match level {
            INITIALIZATION_CORE => Some(Self::Core),
            INITIALIZATION_SERVERS => Some(Self::Servers),
            INITIALIZATION_SCENE => Some(Self::Scene),
            INITIALIZATION_EDITOR => Some(Self::Editor),
            _ => None,
        }
    }

    #[doc(hidden)]
    pub fn to_sys(self) -> InitializationLevel {
        match self {
            Self::Core => INITIALIZATION_CORE,
            Self::Servers => INITIALIZATION_SERVERS,
            Self::Scene => INITIALIZATION_SCENE,
            Self::Editor => INITIALIZATION_EDITOR,
        }
    }
}
