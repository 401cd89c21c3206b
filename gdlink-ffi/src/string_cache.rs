/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;
use std::ptr;

use crate as sys;
use sys::interface::{ConstStringNamePtr, StringNamePtr, VARIANT_TYPE_STRING_NAME};
use sys::{Engine, OpaqueStringName};

/// Owns engine `StringName` instances, keyed by their Rust spelling.
///
/// Pointers handed out stay valid until the cache is dropped, which destroys every name it created.
pub struct StringCache {
    // Box is needed for element stability (new insertions don't move the name; i.e. pointers to it remain valid).
    instances_by_str: HashMap<String, Box<OpaqueStringName>>,
    engine: Engine,
}

impl StringCache {
    pub fn new(engine: Engine) -> Self {
        Self {
            instances_by_str: HashMap::new(),
            engine,
        }
    }

    /// Get a pointer to a `StringName`. Reuses cached instances, only deallocates on destruction of this cache.
    pub fn fetch(&mut self, key: &str) -> ConstStringNamePtr {
        if let Some(opaque_box) = self.instances_by_str.get_mut(key) {
            return box_to_sname_ptr(opaque_box) as ConstStringNamePtr;
        }

        let mut opaque_box = Box::new(OpaqueStringName::default());
        let sname_ptr = box_to_sname_ptr(&mut opaque_box);

        // SAFETY: the box provides writable storage of the right size; its content is overwritten by the constructor.
        unsafe { self.engine.new_string_name(sname_ptr, key) };

        sys::out!("StringCache: created StringName '{key}'");
        self.instances_by_str.insert(key.to_owned(), opaque_box);
        sname_ptr as ConstStringNamePtr
    }

    /// Pointer to an already cached name, without creating one.
    pub fn get(&self, key: &str) -> Option<ConstStringNamePtr> {
        self.instances_by_str
            .get(key)
            .map(|opaque_box| ptr::addr_of!(**opaque_box) as ConstStringNamePtr)
    }

    pub fn len(&self) -> usize {
        self.instances_by_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances_by_str.is_empty()
    }
}

/// Destroy all string names.
impl Drop for StringCache {
    fn drop(&mut self) {
        for (_, mut opaque_box) in self.instances_by_str.drain() {
            let sname_ptr = box_to_sname_ptr(&mut opaque_box);

            // SAFETY: every cached name was constructed by the engine in `fetch()` and is destroyed exactly once here.
            unsafe {
                self.engine.destroy_builtin(VARIANT_TYPE_STRING_NAME, sname_ptr);
            }
        }
    }
}

// Tiny wrapper to avoid exposed `as` casts (which are very easy to get wrong, i.e. extra dereference).
fn box_to_sname_ptr(boxed: &mut Box<OpaqueStringName>) -> StringNamePtr {
    let opaque_ptr = ptr::addr_of_mut!(**boxed);
    opaque_ptr as StringNamePtr
}
