/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Process-wide slot holding the engine received at load time.
//!
//! Only diagnostics and the library entry point reach for this slot; everything else receives an [`Engine`] explicitly.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::Engine;

struct BindingStorage {
    engine: Option<Engine>,
}

impl BindingStorage {
    fn lock() -> MutexGuard<'static, BindingStorage> {
        static BINDING: Mutex<BindingStorage> = Mutex::new(BindingStorage { engine: None });

        // Storage holds plain Copy data, a panic while locked cannot leave it half-written.
        BINDING.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Binds `engine` for the current process. Returns `None` if an engine is already bound.
#[must_use]
pub fn initialize(engine: Engine) -> Option<()> {
    let mut storage = BindingStorage::lock();
    if storage.engine.is_some() {
        return None;
    }

    storage.engine = Some(engine);
    Some(())
}

/// Unbinds the engine; afterwards [`try_engine`] returns `None` again.
pub fn deinitialize() {
    let mut storage = BindingStorage::lock();
    storage.engine = None;
}

pub fn is_initialized() -> bool {
    BindingStorage::lock().engine.is_some()
}

/// The bound engine, if any.
pub fn try_engine() -> Option<Engine> {
    BindingStorage::lock().engine
}
