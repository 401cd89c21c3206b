/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use super::callbacks::{self, ClassUserdata};
use super::host_method::HostMethod;
use super::method::MethodBind;
use super::reflection::JsonHeader;
use super::storage::InstanceStorage;
use super::virtuals::VirtualTarget;
use crate::error::RegistryError;
use crate::handle::{object_bits, Borrowed, EngineFinalizer, Finalize, Handle, HandleKind, HandleRegistry, Ownership};
use crate::obj::{downcast_instance, ExtensionClass, ExtensionInstance, GodotClass, Obj};
use crate::sys;

/// Builds the host part of an extension instance around an engine object.
pub(crate) type InstanceConstructor = unsafe fn(sys::ObjectPtr, sys::InstanceId) -> Box<dyn ExtensionInstance>;

pub(crate) struct ExtensionParts {
    pub constructor: InstanceConstructor,
    /// Index of the nearest engine class in the ancestor chain; constructed as the engine part of each instance.
    pub engine_ancestor: usize,
}

pub(crate) struct ClassEntry {
    pub name: String,
    pub parent: Option<usize>,
    pub is_refcounted: bool,
    pub is_instantiable: bool,
    pub name_ptr: sys::ConstStringNamePtr,
    pub methods: HashMap<String, MethodBind>,
    /// Flattened: contains inherited overrides too.
    pub virtuals: HashMap<String, VirtualTarget>,
    /// Methods exposed by this class itself; the engine resolves inherited ones.
    pub host_methods: Vec<HostMethod>,
    pub extension: Option<ExtensionParts>,
}

/// Immutable class data plus the live-instance index. Boxed, so callback userdata can point into it.
pub(crate) struct ClassTable {
    engine: sys::Engine,
    entries: Box<[ClassEntry]>,
    by_name: HashMap<String, usize>,
    // Object address -> InstanceStorage address.
    instances: Mutex<HashMap<usize, usize>>,
    // Thread that built the table; host instances are only lent out on it.
    owner_thread: ThreadId,
}

impl ClassTable {
    pub fn new(engine: sys::Engine, entries: Vec<ClassEntry>) -> Self {
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.name.clone(), index))
            .collect();

        Self {
            engine,
            entries: entries.into_boxed_slice(),
            by_name,
            instances: Mutex::new(HashMap::new()),
            owner_thread: std::thread::current().id(),
        }
    }

    pub fn engine(&self) -> sys::Engine {
        self.engine
    }

    pub fn class_name(&self, class: usize) -> &str {
        &self.entries[class].name
    }

    pub fn name_ptr(&self, class: usize) -> sys::ConstStringNamePtr {
        self.entries[class].name_ptr
    }

    pub fn extension_parts(&self, class: usize) -> Option<(InstanceConstructor, usize)> {
        self.entries[class]
            .extension
            .as_ref()
            .map(|ext| (ext.constructor, ext.engine_ancestor))
    }

    pub fn virtual_target(&self, class: usize, name: &str) -> Option<&VirtualTarget> {
        self.entries[class].virtuals.get(name)
    }

    pub fn track_instance(&self, object: sys::ObjectPtr, storage: sys::ClassInstancePtr) {
        self.lock_instances().insert(object as usize, storage as usize);
    }

    pub fn untrack_instance(&self, object: sys::ObjectPtr) {
        self.lock_instances().remove(&(object as usize));
    }

    fn find_instance(&self, object: sys::ObjectPtr) -> Option<sys::ClassInstancePtr> {
        self.lock_instances()
            .get(&(object as usize))
            .map(|&storage| storage as sys::ClassInstancePtr)
    }

    fn instance_count(&self) -> usize {
        self.lock_instances().len()
    }

    fn lock_instances(&self) -> MutexGuard<'_, HashMap<usize, usize>> {
        // Plain map of addresses; a panic while locked cannot leave it half-updated.
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn index_of(&self, class: &str) -> Result<usize, RegistryError> {
        self.by_name
            .get(class)
            .copied()
            .ok_or_else(|| RegistryError::ClassNotFound {
                class: class.to_owned(),
            })
    }
}

// ----------------------------------------------------------------------------------------------------------------------------------------------

/// Summary of one registered class.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ClassInfo<'a> {
    pub name: &'a str,
    pub parent: Option<&'a str>,
    pub is_refcounted: bool,
    pub is_instantiable: bool,
    pub is_extension: bool,
    /// Methods bound on this class itself, not counting ancestors.
    pub method_count: usize,
    /// Overrides in the flattened virtual table, inherited ones included.
    pub virtual_count: usize,
    /// Methods the class exposes to the engine, not counting ancestors.
    pub host_method_count: usize,
}

struct Registration {
    class: usize,
    // Both must stay valid until the class is unregistered.
    _info: Box<sys::ClassCreationInfo>,
    _userdata: Box<ClassUserdata>,
}

/// Class and method binding registry, initialized state.
///
/// Built once by [`ClassDbBuilder::finish`][super::ClassDbBuilder::finish] and immutable afterwards, so lookups need no
/// locking. There is no global instance; the registry is passed to whoever needs it.
///
/// Dropping the registry unregisters its extension classes from the engine, in reverse registration order.
pub struct ClassDb {
    table: Box<ClassTable>,
    registrations: Vec<Registration>,
    header: Option<JsonHeader>,
    // Owns the StringNames referenced by the table. Declared last: dropped after unregistration.
    _names: sys::StringCache,
}

impl ClassDb {
    pub(crate) fn new(table: ClassTable, names: sys::StringCache, header: Option<JsonHeader>) -> Self {
        Self {
            table: Box::new(table),
            registrations: Vec::new(),
            header,
            _names: names,
        }
    }

    pub fn engine(&self) -> sys::Engine {
        self.table.engine
    }

    /// Version header of the loaded `extension_api.json`, if any.
    pub fn api_header(&self) -> Option<&JsonHeader> {
        self.header.as_ref()
    }

    pub fn class_count(&self) -> usize {
        self.table.entries.len()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.table.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn class_info(&self, class: &str) -> Option<ClassInfo<'_>> {
        let index = self.table.index_of(class).ok()?;
        let entry = &self.table.entries[index];

        Some(ClassInfo {
            name: &entry.name,
            parent: entry.parent.map(|parent| self.table.class_name(parent)),
            is_refcounted: entry.is_refcounted,
            is_instantiable: entry.is_instantiable,
            is_extension: entry.extension.is_some(),
            method_count: entry.methods.len(),
            virtual_count: entry.virtuals.len(),
            host_method_count: entry.host_methods.len(),
        })
    }

    /// Whether `derived` is `base` or one of its subclasses. `false` if either is unknown.
    pub fn inherits(&self, derived: &str, base: &str) -> bool {
        let (Ok(mut current), Ok(base)) = (self.table.index_of(derived), self.table.index_of(base)) else {
            return false;
        };

        loop {
            if current == base {
                return true;
            }
            match self.table.entries[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Resolution

    /// Looks up `method` on `class` or its nearest ancestor declaring it.
    ///
    /// Method binds are resolved once while building the registry; repeated lookups return the same entry.
    pub fn resolve_method(&self, class: &str, method: &str) -> Result<&MethodBind, RegistryError> {
        let mut current = Some(self.table.index_of(class)?);

        while let Some(index) = current {
            let entry = &self.table.entries[index];
            if let Some(bind) = entry.methods.get(method) {
                return Ok(bind);
            }
            current = entry.parent;
        }

        Err(RegistryError::MethodNotFound {
            class: class.to_owned(),
            method: method.to_owned(),
        })
    }

    /// Host override of virtual `name` for instances of `class`.
    ///
    /// If `class` doesn't override it, the nearest overriding ancestor is used ([`VirtualTarget::declared_in`] tells which).
    /// `None` means the engine's own implementation applies.
    pub fn resolve_virtual(&self, class: &str, name: &str) -> Option<&VirtualTarget> {
        let index = self.table.index_of(class).ok()?;
        self.table.virtual_target(index, name)
    }

    /// Method `name` exposed to the engine by extension class `class` or its nearest extension ancestor.
    pub fn host_method(&self, class: &str, name: &str) -> Option<&HostMethod> {
        let mut current = self.table.index_of(class).ok();

        while let Some(index) = current {
            let entry = &self.table.entries[index];
            if let Some(method) = entry.host_methods.iter().find(|method| method.name() == name) {
                return Some(method);
            }
            current = entry.parent;
        }
        None
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Construction

    /// Constructs a new engine object of `class`. The caller owns it.
    ///
    /// Extension classes can only be constructed after [`register_with_engine`](Self::register_with_engine).
    pub fn construct(&self, class: &str) -> Result<sys::ObjectPtr, RegistryError> {
        let index = self.table.index_of(class)?;
        let entry = &self.table.entries[index];

        let registered = self.registrations.iter().any(|reg| reg.class == index);
        if !entry.is_instantiable || (entry.extension.is_some() && !registered) {
            return Err(RegistryError::NotInstantiable {
                class: class.to_owned(),
            });
        }

        // SAFETY: the name is a live StringName owned by this registry.
        let object = unsafe { self.table.engine.construct_object(entry.name_ptr) };
        if object.is_null() {
            return Err(RegistryError::NotInstantiable {
                class: class.to_owned(),
            });
        }

        sys::out!("construct: {class} -> {object:?}");
        Ok(object)
    }

    /// Constructs a new object of `class` and registers it as host-owned.
    pub fn construct_handle<F: Finalize>(
        &self,
        registry: &mut HandleRegistry<F>,
        class: &str,
    ) -> Result<Handle, RegistryError> {
        let object = self.construct(class)?;
        let is_refcounted = self
            .class_info(class)
            .is_some_and(|info| info.is_refcounted);

        // SAFETY: `object` was just constructed.
        let instance_id = unsafe { self.table.engine.instance_id(object) };

        Ok(registry.acquire_with(
            HandleKind::Object,
            object_bits(object, instance_id, is_refcounted),
            Ownership::Host,
        ))
    }

    /// Typed variant of [`construct_handle`](Self::construct_handle).
    pub fn instantiate<T: GodotClass, F: Finalize>(
        &self,
        registry: &mut HandleRegistry<F>,
    ) -> Result<Obj<T>, RegistryError> {
        self.construct_handle(registry, T::CLASS_NAME).map(Obj::from_handle)
    }

    /// Runs `f` on the host part of the extension object behind `object`.
    ///
    /// Returns `None` if the object has no host part containing a `T`, or if the instance is already in use further up the
    /// call stack.
    ///
    /// # Panics
    /// If called from another thread than the one that built the registry.
    pub fn with_instance<T, R>(&self, object: &Borrowed<'_>, f: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: ExtensionClass,
    {
        assert_eq!(
            std::thread::current().id(),
            self.table.owner_thread,
            "ClassDb::with_instance() called outside the thread that built the registry",
        );

        let storage = self.table.find_instance(object.object_ptr())?;

        // SAFETY: tracked storages are live until the engine's free callback untracks them, which cannot happen while the
        // caller borrows the object from a registry.
        let storage = unsafe { InstanceStorage::from_raw(storage) };
        storage
            .with_mut(|instance| downcast_instance::<T>(instance).map(f))
            .flatten()
    }

    /// Number of live extension instances.
    pub fn instance_count(&self) -> usize {
        self.table.instance_count()
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Engine integration

    /// Registers all extension classes with the engine, parents before children. Does nothing when called again.
    pub fn register_with_engine(&mut self) {
        if !self.registrations.is_empty() {
            return;
        }

        let mut order: Vec<(usize, usize)> = self
            .table
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.extension.is_some())
            .map(|(index, _)| (self.depth(index), index))
            .collect();
        order.sort();

        let table: *const ClassTable = &*self.table;
        for (_, class) in order {
            let entry = &self.table.entries[class];
            let Some(parent) = entry.parent else {
                continue;
            };

            let userdata = Box::new(ClassUserdata { table, class });
            let info = Box::new(sys::ClassCreationInfo {
                is_virtual: sys::conv::SYS_FALSE,
                is_abstract: sys::conv::bool_to_sys(!entry.is_instantiable),
                notification_func: Some(callbacks::on_notification),
                to_string_func: Some(callbacks::to_string),
                create_instance_func: Some(callbacks::create_instance),
                free_instance_func: Some(callbacks::free_instance),
                get_virtual_call_data_func: Some(callbacks::get_virtual_call_data),
                call_virtual_with_data_func: Some(callbacks::call_virtual_with_data),
                class_userdata: &*userdata as *const ClassUserdata as *mut c_void,
            });

            // SAFETY: names are live StringNames; info and userdata are kept in `registrations` until unregistration.
            unsafe {
                self.table
                    .engine
                    .register_extension_class(entry.name_ptr, self.table.name_ptr(parent), &*info)
            };

            for method in &entry.host_methods {
                // SAFETY: the class was just registered; method userdata lives in the table, which outlives registration.
                unsafe {
                    self.table
                        .engine
                        .register_extension_class_method(entry.name_ptr, &method.method_info())
                };
            }

            sys::out!(
                "register: {} extends {}, {} method(s)",
                entry.name,
                self.table.class_name(parent),
                entry.host_methods.len()
            );
            self.registrations.push(Registration {
                class,
                _info: info,
                _userdata: userdata,
            });
        }
    }

    pub fn is_registered_with_engine(&self) -> bool {
        !self.registrations.is_empty()
    }

    /// Finalizer releasing objects through this engine, using the `RefCounted` method binds if present.
    pub fn finalizer(&self) -> EngineFinalizer {
        let bind_ptr = |method: &str| {
            self.resolve_method("RefCounted", method)
                .map_or(std::ptr::null(), |bind| bind.as_ptr())
        };

        let refcounted_tag = match self.table.index_of("RefCounted") {
            // SAFETY: the name is a live StringName owned by this registry.
            Ok(index) => unsafe { self.table.engine.class_tag(self.table.name_ptr(index)) },
            Err(_) => std::ptr::null_mut(),
        };

        EngineFinalizer::new(self.table.engine, bind_ptr("reference"), bind_ptr("unreference"))
            .with_refcounted_tag(refcounted_tag)
    }

    fn depth(&self, class: usize) -> usize {
        let mut depth = 0;
        let mut current = self.table.entries[class].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.table.entries[parent].parent;
        }
        depth
    }
}

impl Drop for ClassDb {
    fn drop(&mut self) {
        let live = self.table.instance_count();
        if live > 0 {
            crate::godot_warn!("class registry dropped while {live} extension instance(s) are alive");
        }

        for registration in self.registrations.drain(..).rev() {
            // SAFETY: the class was registered in `register_with_engine` under this name.
            unsafe {
                self.table
                    .engine
                    .unregister_extension_class(self.table.name_ptr(registration.class))
            };
            sys::out!("unregister: {}", self.table.class_name(registration.class));
        }
    }
}

impl fmt::Debug for ClassDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDb")
            .field("classes", &self.class_count())
            .field("registered", &self.registrations.len())
            .field("instances", &self.instance_count())
            .finish()
    }
}

// SAFETY: after construction the table is read-only, except the instance index which is behind a mutex. Raw pointers refer to
// StringNames owned by `_names` and to boxed registration data, none of which is mutated. Extension instances are touched from
// engine callbacks under the engine's threading rules, and through `with_instance()` only on the thread that built the table.
unsafe impl Send for ClassDb {}
// SAFETY: see above.
unsafe impl Sync for ClassDb {}
