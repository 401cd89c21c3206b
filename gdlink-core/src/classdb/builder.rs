/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;

use super::class_db::{ClassDb, ClassEntry, ClassTable, ExtensionParts, InstanceConstructor};
use super::host_method::{HostMethod, MethodEntry, MethodTable};
use super::method::MethodBind;
use super::reflection::{parse_extension_api, JsonHeader};
use super::virtuals::{VirtualEntry, VirtualSignature, VirtualTable, VirtualTarget};
use crate::config::LinkConfig;
use crate::error::RegistryError;
use crate::frame::{abi_type_matches, AbiValue, InParamTuple};
use crate::obj::{Base, EngineClass, ExtensionClass, ExtensionInstance, GodotClass};
use crate::sys;

/// Hash of `bool RefCounted::reference()` and `bool RefCounted::unreference()`.
const REFCOUNT_METHOD_HASH: i64 = 2240911060;

struct ClassDecl {
    name: String,
    parent: Option<String>,
    is_refcounted: bool,
    is_instantiable: bool,
    /// Engine virtuals declared by this class; signature known only when loaded from reflection.
    declared_virtuals: HashMap<String, Option<VirtualSignature>>,
    extension: Option<ExtensionDecl>,
}

struct ExtensionDecl {
    constructor: InstanceConstructor,
    overrides: Vec<VirtualEntry>,
    methods: Vec<MethodEntry>,
}

struct MethodDecl {
    hash: i64,
    arg_count: Option<usize>,
    /// Explicitly bound methods must resolve; reflection-loaded ones are skipped if the engine lacks them.
    required: bool,
}

/// Class and method binding registry, uninitialized state.
///
/// Collects engine classes (declared by hand or loaded from `extension_api.json`), extension classes and method bindings.
/// [`finish`](Self::finish) validates everything, resolves all method binds once, and produces the immutable [`ClassDb`].
///
/// Declaration errors are collected and reported by `finish`, so calls can be chained.
pub struct ClassDbBuilder {
    classes: Vec<ClassDecl>,
    by_name: HashMap<String, usize>,
    methods: HashMap<(String, String), MethodDecl>,
    pending_virtuals: Vec<(String, String, Option<VirtualSignature>)>,
    validate_virtuals: bool,
    header: Option<JsonHeader>,
    errors: Vec<RegistryError>,
}

impl ClassDbBuilder {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            by_name: HashMap::new(),
            methods: HashMap::new(),
            pending_virtuals: Vec::new(),
            validate_virtuals: true,
            header: None,
            errors: Vec::new(),
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        let mut builder = Self::new();
        builder.validate_virtuals = config.validate_virtuals;
        builder
    }

    /// Whether raw overrides must match a virtual declared by an engine ancestor. On by default.
    ///
    /// Typed overrides are always checked: their parameter and return types must match the declaration.
    pub fn validate_virtuals(&mut self, validate: bool) -> &mut Self {
        self.validate_virtuals = validate;
        self
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Declarations

    /// Declares engine class `T` together with all its ancestors.
    pub fn engine_class<T: EngineClass>(&mut self) -> &mut Self {
        self.declare_chain::<T>();
        self
    }

    /// Declares an engine class by name. The parent must be declared as well before [`finish`](Self::finish).
    pub fn engine_class_named(&mut self, name: &str, parent: Option<&str>, is_refcounted: bool) -> &mut Self {
        self.declare_engine(name, parent, is_refcounted, true);
        self
    }

    /// Registers extension class `T`: its constructor, its virtual overrides and its exposed methods.
    pub fn register<T: ExtensionClass>(&mut self) -> &mut Self {
        if self.by_name.contains_key(T::CLASS_NAME) {
            self.errors.push(RegistryError::DuplicateClass {
                class: T::CLASS_NAME.to_owned(),
            });
            return self;
        }

        let mut table = VirtualTable::<T>::new();
        T::register_virtuals(&mut table);

        let mut methods = MethodTable::<T>::new();
        T::register_methods(&mut methods);

        let parent = <T::Base as GodotClass>::CLASS_NAME;
        self.push_class(ClassDecl {
            name: T::CLASS_NAME.to_owned(),
            parent: Some(parent.to_owned()),
            is_refcounted: T::IS_REFCOUNTED,
            is_instantiable: true,
            declared_virtuals: HashMap::new(),
            extension: Some(ExtensionDecl {
                constructor: construct_instance::<T>,
                overrides: table.into_entries(),
                methods: methods.into_entries(),
            }),
        });

        self
    }

    /// Binds engine method `class::method` under its API hash. Resolution failure makes [`finish`](Self::finish) fail.
    pub fn bind_method(&mut self, class: &str, method: &str, hash: i64, arg_count: usize) -> &mut Self {
        self.methods.insert(
            (class.to_owned(), method.to_owned()),
            MethodDecl {
                hash,
                arg_count: Some(arg_count),
                required: true,
            },
        );
        self
    }

    /// Declares that engine class `class` has virtual method `name`, without its types.
    ///
    /// Only raw overrides ([`VirtualTable::raw`]) can target such a virtual. Typed overrides need the types, from
    /// [`declare_virtual_typed`](Self::declare_virtual_typed) or from reflection data.
    pub fn declare_virtual(&mut self, class: &str, name: &str) -> &mut Self {
        self.pending_virtuals
            .push((class.to_owned(), name.to_owned(), None));
        self
    }

    /// Declares that engine class `class` has virtual method `name`, taking `P` and returning `R`.
    ///
    /// Declaring the same virtual again replaces the earlier declaration.
    pub fn declare_virtual_typed<P, R>(&mut self, class: &str, name: &str) -> &mut Self
    where
        P: InParamTuple,
        R: AbiValue,
    {
        let signature = VirtualSignature::from_static(P::TYPE_NAMES, R::TYPE_NAME);
        self.pending_virtuals
            .push((class.to_owned(), name.to_owned(), Some(signature)));
        self
    }

    /// Declares engine classes, their methods and virtuals from the engine's `extension_api.json`.
    ///
    /// Vararg methods are not bound; they cannot be called through `ptrcall`.
    pub fn load_reflection(&mut self, json: &str) -> Result<&mut Self, RegistryError> {
        let api = parse_extension_api(json)?;

        for class in &api.classes {
            self.declare_engine(
                &class.name,
                class.inherits.as_deref(),
                class.is_refcounted,
                class.is_instantiable,
            );

            for method in class.methods.iter().flatten() {
                if method.is_virtual {
                    let signature = VirtualSignature {
                        params: method.arg_types(),
                        ret: method.return_type(),
                    };
                    self.pending_virtuals
                        .push((class.name.clone(), method.name.clone(), Some(signature)));
                } else if let (Some(hash), false) = (method.hash, method.is_vararg) {
                    let arg_count = method.arguments.as_ref().map_or(0, Vec::len);

                    // Explicit bindings take precedence.
                    self.methods
                        .entry((class.name.clone(), method.name.clone()))
                        .or_insert(MethodDecl {
                            hash,
                            arg_count: Some(arg_count),
                            required: false,
                        });
                }
            }
        }

        sys::out!(
            "reflection: {} classes from {}",
            api.classes.len(),
            api.header.version_full_name
        );
        self.header = Some(api.header);
        Ok(self)
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Finishing

    /// Validates all declarations, resolves method binds through `engine`, and flattens virtual tables.
    ///
    /// Fails with the first declaration error, an unknown or cyclic parent, an override that no engine ancestor declares (or
    /// declares with different or unknown types), or an explicitly bound method the engine doesn't know.
    pub fn finish(self, engine: sys::Engine) -> Result<ClassDb, RegistryError> {
        let Self {
            mut classes,
            by_name,
            mut methods,
            pending_virtuals,
            validate_virtuals,
            header,
            errors,
        } = self;

        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }

        // Parents.
        let mut parents = Vec::with_capacity(classes.len());
        for decl in &classes {
            let parent = match &decl.parent {
                Some(parent) => Some(by_name.get(parent).copied().ok_or_else(|| RegistryError::UnknownParent {
                    class: decl.name.clone(),
                    parent: parent.clone(),
                })?),
                None => None,
            };
            parents.push(parent);
        }
        check_cycles(&classes, &parents)?;

        // Engine virtuals.
        for (class, name, signature) in pending_virtuals {
            let index = by_name
                .get(&class)
                .copied()
                .ok_or(RegistryError::ClassNotFound { class })?;

            classes[index].declared_virtuals.insert(name, signature);
        }

        for (index, decl) in classes.iter().enumerate() {
            if let Some(extension) = &decl.extension {
                for entry in &extension.overrides {
                    // Typed overrides reinterpret the engine's argument slots, so they are never let through unchecked.
                    if validate_virtuals || entry.signature.is_some() {
                        validate_override(&classes, &parents, index, entry)?;
                    }
                }
            }
        }

        // Method binds.
        if by_name.contains_key("RefCounted") {
            for method in ["reference", "unreference"] {
                methods
                    .entry(("RefCounted".to_owned(), method.to_owned()))
                    .or_insert(MethodDecl {
                        hash: REFCOUNT_METHOD_HASH,
                        arg_count: Some(0),
                        required: false,
                    });
            }
        }

        let mut names = sys::StringCache::new(engine);
        let name_ptrs: Vec<sys::ConstStringNamePtr> = classes.iter().map(|decl| names.fetch(&decl.name)).collect();

        let mut bound: Vec<HashMap<String, MethodBind>> = classes.iter().map(|_| HashMap::new()).collect();
        for ((class, method), decl) in methods {
            let index = by_name
                .get(&class)
                .copied()
                .ok_or_else(|| RegistryError::ClassNotFound { class: class.clone() })?;

            let method_name = names.fetch(&method);

            // SAFETY: both names are live StringNames owned by `names`.
            let ptr = unsafe { engine.method_bind(name_ptrs[index], method_name, decl.hash) };
            if ptr.is_null() {
                if decl.required {
                    return Err(RegistryError::MethodBindUnavailable {
                        class,
                        method,
                        hash: decl.hash,
                    });
                }

                sys::out!("method bind unavailable: {class}::{method}");
                continue;
            }

            let bind = MethodBind::new(&class, &method, decl.hash, ptr, engine, decl.arg_count);
            bound[index].insert(method, bind);
        }

        // Flattened virtual tables: walk from the root down, later (more derived) overrides replace earlier ones.
        let mut entries = Vec::with_capacity(classes.len());
        for (index, (decl, methods)) in classes.iter().zip(bound).enumerate() {
            let mut virtuals = HashMap::new();
            for ancestor in ancestry(&parents, index).into_iter().rev() {
                if let Some(extension) = &classes[ancestor].extension {
                    for entry in &extension.overrides {
                        let target = VirtualTarget::new(entry, &classes[ancestor].name);
                        virtuals.insert(entry.name.clone(), target);
                    }
                }
            }

            let host_methods = decl.extension.iter().flat_map(|ext| &ext.methods);
            let host_methods = host_methods
                .map(|entry| HostMethod::new(entry, names.fetch(&entry.name)))
                .collect();

            let extension = decl.extension.as_ref().map(|ext| ExtensionParts {
                constructor: ext.constructor,
                engine_ancestor: ancestry(&parents, index)
                    .into_iter()
                    .find(|&ancestor| classes[ancestor].extension.is_none())
                    .unwrap_or(index),
            });

            entries.push(ClassEntry {
                name: decl.name.clone(),
                parent: parents[index],
                is_refcounted: decl.is_refcounted,
                is_instantiable: decl.is_instantiable,
                name_ptr: name_ptrs[index],
                methods,
                virtuals,
                host_methods,
                extension,
            });
        }

        // An extension class is refcounted when its engine ancestor is, even if declared otherwise.
        for index in 0..entries.len() {
            if let Some(ancestor) = entries[index].extension.as_ref().map(|ext| ext.engine_ancestor) {
                entries[index].is_refcounted |= entries[ancestor].is_refcounted;
            }
        }

        Ok(ClassDb::new(ClassTable::new(engine, entries), names, header))
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Internals

    fn declare_chain<T: GodotClass>(&mut self) {
        // NoBase terminates the chain.
        if T::CLASS_NAME.is_empty() {
            return;
        }

        let parent = <T::Base as GodotClass>::CLASS_NAME;
        let parent = (!parent.is_empty()).then_some(parent);

        self.declare_engine(T::CLASS_NAME, parent, T::IS_REFCOUNTED, true);
        self.declare_chain::<T::Base>();
    }

    fn declare_engine(&mut self, name: &str, parent: Option<&str>, is_refcounted: bool, is_instantiable: bool) {
        if let Some(&index) = self.by_name.get(name) {
            let existing = &mut self.classes[index];

            if existing.extension.is_some() || existing.parent.as_deref() != parent {
                self.errors.push(RegistryError::DuplicateClass {
                    class: name.to_owned(),
                });
            } else {
                // Same class declared again (e.g. by hand and through reflection): reflection data is more precise.
                existing.is_refcounted |= is_refcounted;
                existing.is_instantiable &= is_instantiable;
            }
            return;
        }

        self.push_class(ClassDecl {
            name: name.to_owned(),
            parent: parent.map(str::to_owned),
            is_refcounted,
            is_instantiable,
            declared_virtuals: HashMap::new(),
            extension: None,
        });
    }

    fn push_class(&mut self, decl: ClassDecl) {
        self.by_name.insert(decl.name.clone(), self.classes.len());
        self.classes.push(decl);
    }
}

impl Default for ClassDbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Host constructor of an extension class, erased for storage in the class table.
///
/// # Safety
/// `object` must be a live object of `T`'s nearest engine ancestor class.
unsafe fn construct_instance<T: ExtensionClass>(
    object: sys::ObjectPtr,
    instance_id: sys::InstanceId,
) -> Box<dyn ExtensionInstance> {
    let base = Base::<T::Base>::from_sys(object, instance_id);
    Box::new(T::init(base))
}

/// `class` followed by its ancestors, nearest first. Parents must be acyclic.
fn ancestry(parents: &[Option<usize>], class: usize) -> Vec<usize> {
    let mut chain = vec![class];
    let mut current = parents[class];
    while let Some(parent) = current {
        chain.push(parent);
        current = parents[parent];
    }
    chain
}

fn check_cycles(classes: &[ClassDecl], parents: &[Option<usize>]) -> Result<(), RegistryError> {
    for (index, decl) in classes.iter().enumerate() {
        let mut current = parents[index];
        let mut steps = 0;

        while let Some(parent) = current {
            steps += 1;
            if parent == index || steps > classes.len() {
                return Err(RegistryError::InheritanceCycle {
                    class: decl.name.clone(),
                });
            }
            current = parents[parent];
        }
    }
    Ok(())
}

fn validate_override(
    classes: &[ClassDecl],
    parents: &[Option<usize>],
    class: usize,
    entry: &VirtualEntry,
) -> Result<(), RegistryError> {
    let declared = ancestry(parents, class)
        .into_iter()
        .find_map(|ancestor| classes[ancestor].declared_virtuals.get(&entry.name));

    let Some(declared) = declared else {
        return Err(RegistryError::UnknownVirtual {
            class: classes[class].name.clone(),
            method: entry.name.clone(),
        });
    };

    // Raw overrides read their arguments themselves.
    let Some(provided) = &entry.signature else {
        return Ok(());
    };

    let Some(declared) = declared else {
        return Err(RegistryError::UntypedVirtual {
            class: classes[class].name.clone(),
            method: entry.name.clone(),
            provided: provided.to_string(),
        });
    };

    let matches = declared.params.len() == provided.params.len()
        && provided
            .params
            .iter()
            .zip(&declared.params)
            .all(|(provided, declared)| abi_type_matches(provided, declared))
        && abi_type_matches(&provided.ret, &declared.ret);

    if matches {
        Ok(())
    } else {
        Err(RegistryError::VirtualSignatureMismatch {
            class: classes[class].name.clone(),
            method: entry.name.clone(),
            declared: declared.to_string(),
            provided: provided.to_string(),
        })
    }
}
