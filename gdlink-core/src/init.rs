/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Library entry point and startup/shutdown sequence.

use std::ffi::c_void;
use std::panic::AssertUnwindSafe;

use crate::classdb::{ClassDb, ClassDbBuilder};
use crate::config::LinkConfig;
use crate::error::RegistryError;
use crate::handle::{EngineFinalizer, HandleRegistry};
use crate::private::handle_panic;
use crate::sys;

pub use sys::InitLevel;

/// State built at startup and passed explicitly to everything that talks to the engine.
///
/// Owns the class registry and the handle registry. Dropping it (or calling [`shutdown`](Self::shutdown)) ends all remaining
/// handles first, then unregisters the extension classes.
pub struct Runtime {
    // Field order matters for drop: handles before classes.
    handles: HandleRegistry<EngineFinalizer>,
    class_db: ClassDb,
}

impl Runtime {
    /// Finishes `builder`, registers its extension classes with the engine and sets up a handle registry.
    pub fn new(engine: sys::Engine, config: &LinkConfig, builder: ClassDbBuilder) -> Result<Self, RegistryError> {
        let mut class_db = builder.finish(engine)?;
        class_db.register_with_engine();

        let handles = HandleRegistry::from_config(class_db.finalizer(), config);
        Ok(Self { handles, class_db })
    }

    pub fn class_db(&self) -> &ClassDb {
        &self.class_db
    }

    pub fn handles(&self) -> &HandleRegistry<EngineFinalizer> {
        &self.handles
    }

    pub fn handles_mut(&mut self) -> &mut HandleRegistry<EngineFinalizer> {
        &mut self.handles
    }

    /// Both registries at once, for calls that resolve a method and register the result.
    pub fn split_mut(&mut self) -> (&ClassDb, &mut HandleRegistry<EngineFinalizer>) {
        (&self.class_db, &mut self.handles)
    }

    /// Ends all remaining handles, then unregisters classes. Returns the number of leaked host-owned handles.
    pub fn shutdown(mut self) -> usize {
        self.handles.shutdown()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // No-op after an explicit shutdown().
        self.handles.shutdown();
    }
}

// ----------------------------------------------------------------------------------------------------------------------------------------------

/// Defines the entry point for a GDExtension library.
///
/// Every library has exactly one implementation of this trait, exported with [`gdlink_entry!`][crate::gdlink_entry].
///
/// ```no_run
/// use gdlink_core::classdb::ClassDbBuilder;
/// use gdlink_core::init::ExtensionLibrary;
/// use gdlink_core::obj::Container;
///
/// struct MyExtension;
///
/// unsafe impl ExtensionLibrary for MyExtension {
///     fn register_classes(builder: &mut ClassDbBuilder) {
///         builder
///             .engine_class::<Container>()
///             .bind_method("Container", "queue_sort", 3218959716, 0);
///     }
/// }
///
/// gdlink_core::gdlink_entry!(MyExtension, my_extension_init);
/// ```
///
/// # Safety
/// The library cannot enforce any safety guarantees outside Rust code, which means that **you as a user** are responsible to
/// uphold them: namely in script code or other extensions loaded by the engine.
pub unsafe trait ExtensionLibrary: 'static {
    /// Determines the initialization level at which the registries are built (`Scene` by default).
    fn min_level() -> InitLevel {
        InitLevel::Scene
    }

    fn config() -> LinkConfig {
        LinkConfig::default()
    }

    /// Contents of the engine's `extension_api.json`, to declare engine classes, methods and virtuals from.
    fn extension_api() -> Option<&'static str> {
        None
    }

    /// Declares the classes and methods this library uses. Called once, at [`min_level()`](Self::min_level).
    fn register_classes(builder: &mut ClassDbBuilder);

    /// Custom logic when a certain init-level of the engine is loaded.
    ///
    /// This will only be invoked for levels >= [`Self::min_level()`], in ascending order.
    #[allow(unused_variables)]
    fn on_level_init(level: InitLevel, runtime: &mut Runtime) {
        // Nothing by default.
    }

    /// Custom logic when a certain init-level of the engine is unloaded.
    ///
    /// This will only be invoked for levels >= [`Self::min_level()`], in descending order.
    #[allow(unused_variables)]
    fn on_level_deinit(level: InitLevel, runtime: &mut Runtime) {
        // Nothing by default.
    }
}

/// Declares the `extern "C"` entry symbol the engine looks up, forwarding to [`ExtensionLibrary`] implementation `$library`.
#[macro_export]
macro_rules! gdlink_entry {
    ($library:ty, $symbol:ident) => {
        #[no_mangle]
        unsafe extern "C" fn $symbol(
            interface: *const $crate::sys::EngineInterface,
            library: $crate::sys::ClassLibraryPtr,
            init: *mut $crate::sys::Initialization,
        ) -> $crate::sys::SysBool {
            $crate::init::__gdlink_load_library::<$library>(interface, library, init)
        }
    };
}

/// Userdata handed to the engine; lives from load until the `Core` level is unloaded.
struct LibraryState {
    engine: sys::Engine,
    runtime: Option<Runtime>,
}

#[doc(hidden)]
pub unsafe fn __gdlink_load_library<L: ExtensionLibrary>(
    interface: *const sys::EngineInterface,
    library: sys::ClassLibraryPtr,
    init: *mut sys::Initialization,
) -> sys::SysBool {
    let init_code = || {
        let Some(engine) = sys::Engine::from_raw(interface, library) else {
            crate::godot_error!("engine passed a null interface table");
            return sys::conv::SYS_FALSE;
        };

        if sys::binding::initialize(engine).is_none() {
            crate::godot_warn!("an engine is already bound; is the library loaded twice?");
        }

        let state = Box::new(LibraryState { engine, runtime: None });

        *init = sys::Initialization {
            minimum_initialization_level: L::min_level().to_sys(),
            userdata: Box::into_raw(state) as *mut c_void,
            initialize: Some(ffi_initialize_layer::<L>),
            deinitialize: Some(ffi_deinitialize_layer::<L>),
        };

        sys::out!("loaded library, engine {}", engine.version_string());
        sys::conv::SYS_TRUE
    };

    let ctx = || "error when loading GDExtension library";
    handle_panic(ctx, AssertUnwindSafe(init_code)).unwrap_or(sys::conv::SYS_FALSE)
}

unsafe extern "C" fn ffi_initialize_layer<L: ExtensionLibrary>(
    userdata: *mut c_void,
    init_level: sys::InitializationLevel,
) {
    let Some(level) = InitLevel::from_sys(init_level) else {
        crate::godot_warn!("unknown initialization level {init_level}");
        return;
    };

    // SAFETY: userdata is the state boxed in `__gdlink_load_library`, alive until the Core level is unloaded. The engine calls
    // level callbacks sequentially, from the main thread.
    let state = &mut *(userdata as *mut LibraryState);

    let ctx = || format!("failed to initialize GDExtension level `{level:?}`");
    // Swallow panics.
    let _ = handle_panic(ctx, AssertUnwindSafe(|| state.on_level_init::<L>(level)));
}

unsafe extern "C" fn ffi_deinitialize_layer<L: ExtensionLibrary>(
    userdata: *mut c_void,
    init_level: sys::InitializationLevel,
) {
    let Some(level) = InitLevel::from_sys(init_level) else {
        crate::godot_warn!("unknown initialization level {init_level}");
        return;
    };

    {
        // SAFETY: see ffi_initialize_layer().
        let state = &mut *(userdata as *mut LibraryState);

        let ctx = || format!("failed to deinitialize GDExtension level `{level:?}`");
        let _ = handle_panic(ctx, AssertUnwindSafe(|| state.on_level_deinit::<L>(level)));
    } // Ref no longer valid once next statement is executed.

    if level == InitLevel::Core {
        // Lowest level unloaded: nothing calls back into the library anymore.
        drop(Box::from_raw(userdata as *mut LibraryState));
        sys::binding::deinitialize();
    }
}

impl LibraryState {
    fn on_level_init<L: ExtensionLibrary>(&mut self, level: InitLevel) {
        if level < L::min_level() {
            return;
        }

        if level == L::min_level() {
            match build_runtime::<L>(self.engine) {
                Ok(runtime) => self.runtime = Some(runtime),
                Err(err) => {
                    crate::godot_error!("failed to set up class registry: {err}");
                    return;
                }
            }
        }

        if let Some(runtime) = self.runtime.as_mut() {
            L::on_level_init(level, runtime);
        }
    }

    fn on_level_deinit<L: ExtensionLibrary>(&mut self, level: InitLevel) {
        if level < L::min_level() {
            return;
        }

        if let Some(runtime) = self.runtime.as_mut() {
            L::on_level_deinit(level, runtime);
        }

        if level == L::min_level() {
            if let Some(runtime) = self.runtime.take() {
                let leaked = runtime.shutdown();
                sys::out!("runtime shut down, {leaked} leaked handle(s)");
            }
        }
    }
}

fn build_runtime<L: ExtensionLibrary>(engine: sys::Engine) -> Result<Runtime, RegistryError> {
    let config = L::config();

    let mut builder = ClassDbBuilder::from_config(&config);
    if let Some(json) = L::extension_api() {
        builder.load_reflection(json)?;
    }
    L::register_classes(&mut builder);

    Runtime::new(engine, &config, builder)
}
