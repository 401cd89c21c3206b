/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! In-process stand-in for the engine side of the C interface.
//!
//! State is thread-local; every test runs on its own thread and calls [`engine()`] first, which starts from a clean slate.
//!
//! Conventions of the mock:
//! * Objects are heap cells; a new object starts with one reference (relevant only for `RefCounted` binds).
//! * `StringName` and `String` storage holds a pointer to a boxed Rust `String`.
//! * Method bind pointers are 1-based indices into the bind table; class tags are 1-based indices into the tag table.
//! * The engine class hierarchy is fixed (see `engine_parent()`); extension classes add to it when registered.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::{c_char, c_void, CString};
use std::ptr;
use std::rc::Rc;

use gdlink::sys;

/// Hash of `RefCounted::reference()` / `unreference()`.
pub const REFCOUNT_HASH: i64 = 2240911060;

/// Engine-side implementation of a bound method: `(receiver, arguments, return slot)`.
pub type Behavior = Rc<dyn Fn(sys::ObjectPtr, &[sys::ConstTypePtr], sys::TypePtr)>;

/// One recorded `ptrcall`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Call {
    pub class: String,
    pub method: String,
    pub receiver: usize,
    /// First 64-bit word of each argument.
    pub args: Vec<u64>,
}

struct MockObject {
    class: String,
    instance_id: u64,
    refcount: i64,
    /// Extension class and host instance attached with `object_set_instance`.
    instance: Option<(String, sys::ClassInstancePtr)>,
}

struct MockMethod {
    class: String,
    name: String,
    info: sys::ClassMethodInfo,
}

struct MockBind {
    class: String,
    method: String,
    hash: i64,
    arg_count: usize,
    behavior: Behavior,
}

#[derive(Default)]
struct State {
    objects: HashMap<usize, MockObject>,
    next_instance_id: u64,
    binds: Vec<MockBind>,
    calls: Vec<Call>,
    extension_classes: HashMap<String, sys::ClassCreationInfo>,
    extension_parents: HashMap<String, String>,
    extension_methods: Vec<MockMethod>,
    class_tags: Vec<String>,
    registered: Vec<String>,
    unregistered: Vec<String>,
    unconstructible: HashSet<String>,
    destroyed: Vec<u64>,
    invalid_destroys: usize,
    names_alive: usize,
    strings_alive: usize,
    builtins_destroyed: Vec<(sys::VariantType, u64)>,
    variants_destroyed: usize,
    messages: Vec<String>,
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

// Never hold the borrow across a call back into the library.
fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

// ----------------------------------------------------------------------------------------------------------------------------------------------
// Setup

/// Resets the mock and returns an engine handle backed by it.
pub fn engine() -> sys::Engine {
    with_state(|state| *state = State::default());

    // SAFETY: the table is leaked and thus lives for the rest of the process.
    unsafe { sys::Engine::from_raw(interface(), library()) }.expect("mock interface is non-null")
}

/// The interface table, for loading a library through its entry symbol.
pub fn interface() -> &'static sys::EngineInterface {
    Box::leak(Box::new(sys::EngineInterface {
        version_major: 4,
        version_minor: 3,
        version_patch: 0,
        version_string: c"Godot Engine v4.3.stable.mock".as_ptr(),
        print_error: Some(print_error),
        print_warning: Some(print_warning),
        variant_get_ptr_destructor: Some(variant_get_ptr_destructor),
        variant_destroy: Some(variant_destroy),
        string_new_with_utf8_chars_and_len: Some(string_new_with_utf8_chars_and_len),
        string_to_utf8_chars: Some(string_to_utf8_chars),
        string_name_new_with_utf8_chars_and_len: Some(string_name_new_with_utf8_chars_and_len),
        object_method_bind_ptrcall: Some(object_method_bind_ptrcall),
        object_destroy: Some(object_destroy),
        object_get_instance_id: Some(object_get_instance_id),
        object_set_instance: Some(object_set_instance),
        object_cast_to: Some(object_cast_to),
        classdb_construct_object: Some(classdb_construct_object),
        classdb_get_class_tag: Some(classdb_get_class_tag),
        classdb_get_method_bind: Some(classdb_get_method_bind),
        classdb_register_extension_class: Some(classdb_register_extension_class),
        classdb_register_extension_class_method: Some(classdb_register_extension_class_method),
        classdb_unregister_extension_class: Some(classdb_unregister_extension_class),
    }))
}

pub fn library() -> sys::ClassLibraryPtr {
    ptr::NonNull::<u64>::dangling().as_ptr() as sys::ClassLibraryPtr
}

/// Adds a method that only records its calls.
pub fn add_method(class: &str, method: &str, hash: i64, arg_count: usize) {
    add_method_with(class, method, hash, arg_count, |_, _, _| {});
}

pub fn add_method_with(
    class: &str,
    method: &str,
    hash: i64,
    arg_count: usize,
    behavior: impl Fn(sys::ObjectPtr, &[sys::ConstTypePtr], sys::TypePtr) + 'static,
) {
    with_state(|state| {
        state.binds.push(MockBind {
            class: class.to_owned(),
            method: method.to_owned(),
            hash,
            arg_count,
            behavior: Rc::new(behavior),
        })
    });
}

/// Adds `RefCounted::reference()` and `RefCounted::unreference()`, operating on the mock refcount.
pub fn add_refcounted_methods() {
    add_method_with("RefCounted", "reference", REFCOUNT_HASH, 0, |object, _, ret| {
        with_state(|state| {
            if let Some(obj) = state.objects.get_mut(&(object as usize)) {
                obj.refcount += 1;
            }
        });
        unsafe { write_ret(ret, sys::conv::SYS_TRUE) };
    });

    add_method_with("RefCounted", "unreference", REFCOUNT_HASH, 0, |object, _, ret| {
        let last = with_state(|state| match state.objects.get_mut(&(object as usize)) {
            Some(obj) => {
                obj.refcount -= 1;
                obj.refcount == 0
            }
            None => false,
        });
        unsafe { write_ret(ret, sys::conv::bool_to_sys(last)) };
    });
}

/// Makes `classdb_construct_object` return null for `class`.
pub fn refuse_construct(class: &str) {
    with_state(|state| state.unconstructible.insert(class.to_owned()));
}

/// Writes a by-value return.
///
/// # Safety
/// `ret` must point to storage for a `T`.
pub unsafe fn write_ret<T>(ret: sys::TypePtr, value: T) {
    assert!(!ret.is_null(), "mock: method has a return value, but caller passed null");
    *(ret as *mut T) = value;
}

/// Reads argument `index` as `T`.
///
/// # Safety
/// The argument must have been passed as a `T`.
pub unsafe fn arg<T: Copy>(args: &[sys::ConstTypePtr], index: usize) -> T {
    *(args[index] as *const T)
}

// ----------------------------------------------------------------------------------------------------------------------------------------------
// Inspection

/// Creates an object the way the engine does internally (e.g. a node instantiated by a scene).
pub fn new_object(class: &str) -> sys::ObjectPtr {
    with_state(|state| state.alloc_object(class))
}

/// Frees an object from the engine side.
pub fn free_object(object: sys::ObjectPtr) {
    unsafe { object_destroy(object) };
}

pub fn is_alive(object: sys::ObjectPtr) -> bool {
    with_state(|state| state.objects.contains_key(&(object as usize)))
}

pub fn object_count() -> usize {
    with_state(|state| state.objects.len())
}

pub fn refcount(object: sys::ObjectPtr) -> i64 {
    with_state(|state| state.objects.get(&(object as usize)).map_or(0, |obj| obj.refcount))
}

pub fn class_of(object: sys::ObjectPtr) -> Option<String> {
    with_state(|state| state.objects.get(&(object as usize)).map(|obj| obj.class.clone()))
}

pub fn has_instance(object: sys::ObjectPtr) -> bool {
    with_state(|state| {
        state
            .objects
            .get(&(object as usize))
            .is_some_and(|obj| obj.instance.is_some())
    })
}

/// Instance IDs of destroyed objects, in destruction order.
pub fn destroyed() -> Vec<u64> {
    with_state(|state| state.destroyed.clone())
}

/// Destructions of objects that were not alive.
pub fn invalid_destroys() -> usize {
    with_state(|state| state.invalid_destroys)
}

pub fn calls() -> Vec<Call> {
    with_state(|state| state.calls.clone())
}

pub fn clear_calls() {
    with_state(|state| state.calls.clear());
}

pub fn registered_classes() -> Vec<String> {
    with_state(|state| state.registered.clone())
}

pub fn unregistered_classes() -> Vec<String> {
    with_state(|state| state.unregistered.clone())
}

pub fn string_names_alive() -> usize {
    with_state(|state| state.names_alive)
}

pub fn strings_alive() -> usize {
    with_state(|state| state.strings_alive)
}

pub fn builtins_destroyed() -> Vec<(sys::VariantType, u64)> {
    with_state(|state| state.builtins_destroyed.clone())
}

pub fn variants_destroyed() -> usize {
    with_state(|state| state.variants_destroyed)
}

/// Errors and warnings the library printed through the interface.
pub fn messages() -> Vec<String> {
    with_state(|state| state.messages.clone())
}

/// Calls virtual `name` on `object` the way the engine does: look up the call data for the object's extension class, then
/// call through it. Returns `false` if the class doesn't override `name`.
///
/// # Safety
/// `args` and `ret` must match the virtual's declaration.
pub unsafe fn call_virtual(object: sys::ObjectPtr, name: &str, args: &[sys::ConstTypePtr], ret: sys::TypePtr) -> bool {
    let Some((info, instance)) = attached_instance(object) else {
        return false;
    };

    let name = CString::new(name).expect("virtual name without NUL");
    let get_call_data = info.get_virtual_call_data_func.expect("get_virtual_call_data_func");
    let call_with_data = info.call_virtual_with_data_func.expect("call_virtual_with_data_func");

    let data = get_call_data(info.class_userdata, name.as_ptr());
    if data.is_null() {
        return false;
    }

    call_with_data(instance, name.as_ptr(), data, args.as_ptr(), ret);
    true
}

/// Methods registered on extension class `class`: name, argument count, and whether they return a value.
pub fn extension_methods(class: &str) -> Vec<(String, u32, bool)> {
    with_state(|state| {
        state
            .extension_methods
            .iter()
            .filter(|method| method.class == class)
            .map(|method| {
                let info = &method.info;
                (method.name.clone(), info.argument_count, info.has_return_value != 0)
            })
            .collect()
    })
}

/// Calls method `name` registered by an extension class on `object`, looking through the object's extension ancestors like
/// the engine does. Returns `false` if no such method is registered.
///
/// # Safety
/// `args` and `ret` must match the method's registration.
pub unsafe fn call_extension_method(
    object: sys::ObjectPtr,
    name: &str,
    args: &[sys::ConstTypePtr],
    ret: sys::TypePtr,
) -> bool {
    let found = with_state(|state| {
        let (class, instance) = state.objects.get(&(object as usize))?.instance.clone()?;

        let mut current = Some(class);
        while let Some(class) = current {
            let method = state
                .extension_methods
                .iter()
                .find(|method| method.class == class && method.name == name);
            if let Some(method) = method {
                return Some((method.info, instance));
            }
            current = state.extension_parents.get(&class).cloned();
        }
        None
    });
    let Some((info, instance)) = found else {
        return false;
    };

    let ptrcall = info.ptrcall_func.expect("ptrcall_func");
    ptrcall(info.method_userdata, instance, args.as_ptr(), ret);
    true
}

/// Sends notification `what` to the extension instance of `object`. Returns `false` if it has none.
pub fn notify(object: sys::ObjectPtr, what: i32) -> bool {
    let Some((info, instance)) = attached_instance(object) else {
        return false;
    };

    let notification = info.notification_func.expect("notification_func");
    unsafe { notification(instance, what, sys::conv::SYS_FALSE) };
    true
}

/// Text the extension instance of `object` reports for itself; `None` if it keeps the engine's default.
pub fn to_string(object: sys::ObjectPtr) -> Option<String> {
    let (info, instance) = attached_instance(object)?;
    let to_string = info.to_string_func.expect("to_string_func");

    let mut is_valid: sys::SysBool = 0xAA;
    let mut out: *mut String = ptr::null_mut();
    unsafe { to_string(instance, &mut is_valid, &mut out as *mut *mut String as sys::StringPtr) };

    match is_valid {
        sys::conv::SYS_TRUE => {
            // The engine owns the string now; take it and destroy it like the engine would.
            let text = unsafe { (*out).clone() };
            unsafe { destroy_string(&mut out as *mut *mut String as sys::TypePtr) };
            Some(text)
        }
        sys::conv::SYS_FALSE => {
            assert!(out.is_null(), "mock: to_string wrote a string but reported it invalid");
            None
        }
        other => panic!("mock: to_string left is_valid uninitialized ({other:#x})"),
    }
}

/// Engine-side `String` holding `text`, as one storage word.
pub fn new_engine_string(text: &str) -> u64 {
    let mut word = 0u64;
    unsafe {
        string_new_with_utf8_chars_and_len(
            &mut word as *mut u64 as sys::UninitStringPtr,
            text.as_ptr() as *const c_char,
            text.len() as sys::SysInt,
        )
    };
    word
}

/// Text of an engine `String` passed as argument `index`.
///
/// # Safety
/// The argument must be a `String`.
pub unsafe fn string_arg(args: &[sys::ConstTypePtr], index: usize) -> String {
    read_string(args[index])
}

fn attached_instance(object: sys::ObjectPtr) -> Option<(sys::ClassCreationInfo, sys::ClassInstancePtr)> {
    with_state(|state| {
        let (class, instance) = state.objects.get(&(object as usize))?.instance.clone()?;
        let info = *state.extension_classes.get(&class)?;
        Some((info, instance))
    })
}

fn engine_parent(class: &str) -> Option<&'static str> {
    match class {
        "Node" | "RefCounted" => Some("Object"),
        "Resource" => Some("RefCounted"),
        "CanvasItem" => Some("Node"),
        "Control" => Some("CanvasItem"),
        "Container" | "Label" => Some("Control"),
        _ => None,
    }
}

// ----------------------------------------------------------------------------------------------------------------------------------------------
// Interface functions

impl State {
    fn alloc_object(&mut self, class: &str) -> sys::ObjectPtr {
        self.next_instance_id += 1;

        let object = Box::into_raw(Box::new(0u64)) as sys::ObjectPtr;
        self.objects.insert(
            object as usize,
            MockObject {
                class: class.to_owned(),
                // Engine IDs are large and never zero.
                instance_id: (1 << 32) | self.next_instance_id,
                refcount: 1,
                instance: None,
            },
        );
        object
    }
}

impl State {
    fn inherits(&self, class: &str, base: &str) -> bool {
        let mut current = Some(class.to_owned());
        while let Some(class) = current {
            if class == base {
                return true;
            }
            current = match self.extension_parents.get(&class) {
                Some(parent) => Some(parent.clone()),
                None => engine_parent(&class).map(str::to_owned),
            };
        }
        false
    }
}

unsafe fn read_string(ptr: *const c_void) -> String {
    (**(ptr as *const *const String)).clone()
}

unsafe fn new_boxed_string(dest: *mut c_void, contents: *const c_char, len: sys::SysInt) {
    let bytes = std::slice::from_raw_parts(contents as *const u8, len as usize);
    let string = String::from_utf8_lossy(bytes).into_owned();
    *(dest as *mut *mut String) = Box::into_raw(Box::new(string));
}

unsafe fn print_with(severity: &str, description: *const c_char) {
    let message = std::ffi::CStr::from_ptr(description).to_string_lossy();
    with_state(|state| state.messages.push(format!("{severity}: {message}")));
}

unsafe extern "C" fn print_error(
    description: *const c_char,
    _function: *const c_char,
    _file: *const c_char,
    _line: i32,
    _editor_notify: sys::SysBool,
) {
    print_with("ERROR", description);
}

unsafe extern "C" fn print_warning(
    description: *const c_char,
    _function: *const c_char,
    _file: *const c_char,
    _line: i32,
    _editor_notify: sys::SysBool,
) {
    print_with("WARNING", description);
}

unsafe extern "C" fn destroy_string_name(value: sys::TypePtr) {
    drop(Box::from_raw(*(value as *mut *mut String)));
    with_state(|state| state.names_alive -= 1);
}

unsafe extern "C" fn destroy_string(value: sys::TypePtr) {
    drop(Box::from_raw(*(value as *mut *mut String)));
    with_state(|state| state.strings_alive -= 1);
}

unsafe extern "C" fn destroy_opaque<const TYPE: u32>(value: sys::TypePtr) {
    let first_word = *(value as *const u64);
    with_state(|state| state.builtins_destroyed.push((TYPE, first_word)));
}

unsafe extern "C" fn variant_get_ptr_destructor(variant_type: sys::VariantType) -> sys::PtrDestructor {
    match variant_type {
        sys::VARIANT_TYPE_STRING_NAME => Some(destroy_string_name),
        sys::VARIANT_TYPE_STRING => Some(destroy_string),
        sys::VARIANT_TYPE_ARRAY => Some(destroy_opaque::<{ sys::VARIANT_TYPE_ARRAY }>),
        sys::VARIANT_TYPE_DICTIONARY => Some(destroy_opaque::<{ sys::VARIANT_TYPE_DICTIONARY }>),
        sys::VARIANT_TYPE_CALLABLE => Some(destroy_opaque::<{ sys::VARIANT_TYPE_CALLABLE }>),
        sys::VARIANT_TYPE_PACKED_BYTE_ARRAY => Some(destroy_opaque::<{ sys::VARIANT_TYPE_PACKED_BYTE_ARRAY }>),
        _ => None,
    }
}

unsafe extern "C" fn variant_destroy(_variant: sys::VariantPtr) {
    with_state(|state| state.variants_destroyed += 1);
}

unsafe extern "C" fn string_new_with_utf8_chars_and_len(
    dest: sys::UninitStringPtr,
    contents: *const c_char,
    len: sys::SysInt,
) {
    new_boxed_string(dest, contents, len);
    with_state(|state| state.strings_alive += 1);
}

unsafe extern "C" fn string_to_utf8_chars(
    string: sys::ConstStringPtr,
    text: *mut c_char,
    max_write_length: sys::SysInt,
) -> sys::SysInt {
    let string = read_string(string);
    let len = string.len().min(max_write_length.max(0) as usize);
    if !text.is_null() {
        ptr::copy_nonoverlapping(string.as_ptr(), text as *mut u8, len);
    }
    string.len() as sys::SysInt
}

unsafe extern "C" fn string_name_new_with_utf8_chars_and_len(
    dest: sys::UninitStringNamePtr,
    contents: *const c_char,
    len: sys::SysInt,
) {
    new_boxed_string(dest, contents, len);
    with_state(|state| state.names_alive += 1);
}

unsafe extern "C" fn object_method_bind_ptrcall(
    bind: sys::MethodBindPtr,
    object: sys::ObjectPtr,
    args: *const sys::ConstTypePtr,
    ret: sys::TypePtr,
) {
    let index = bind as usize - 1;
    let (behavior, arg_count, class, method) = with_state(|state| {
        let bind = &state.binds[index];
        (bind.behavior.clone(), bind.arg_count, bind.class.clone(), bind.method.clone())
    });

    let args: &[sys::ConstTypePtr] = if arg_count == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(args, arg_count)
    };

    let words = args.iter().map(|&arg| *(arg as *const u64)).collect();
    with_state(|state| {
        state.calls.push(Call {
            class,
            method,
            receiver: object as usize,
            args: words,
        })
    });

    behavior(object, args, ret);
}

unsafe extern "C" fn object_destroy(object: sys::ObjectPtr) {
    let Some(obj) = with_state(|state| state.objects.remove(&(object as usize))) else {
        with_state(|state| state.invalid_destroys += 1);
        return;
    };

    if let Some((class, instance)) = obj.instance {
        let info = with_state(|state| state.extension_classes.get(&class).copied());
        if let Some(free) = info.and_then(|info| info.free_instance_func.map(|free| (free, info.class_userdata))) {
            (free.0)(free.1, instance);
        }
    }

    drop(Box::from_raw(object as *mut u64));
    with_state(|state| state.destroyed.push(obj.instance_id));
}

unsafe extern "C" fn object_get_instance_id(object: sys::ConstObjectPtr) -> sys::InstanceId {
    with_state(|state| state.objects.get(&(object as usize)).map_or(0, |obj| obj.instance_id))
}

unsafe extern "C" fn object_set_instance(
    object: sys::ObjectPtr,
    class_name: sys::ConstStringNamePtr,
    instance: sys::ClassInstancePtr,
) {
    let class = read_string(class_name);
    with_state(|state| {
        if let Some(obj) = state.objects.get_mut(&(object as usize)) {
            obj.class = class.clone();
            obj.instance = Some((class, instance));
        }
    });
}

unsafe extern "C" fn object_cast_to(object: sys::ConstObjectPtr, class_tag: *mut c_void) -> sys::ObjectPtr {
    let is_instance = with_state(|state| {
        let Some(base) = state.class_tags.get((class_tag as usize).wrapping_sub(1)) else {
            return false;
        };
        state
            .objects
            .get(&(object as usize))
            .is_some_and(|obj| state.inherits(&obj.class, base))
    });

    if is_instance {
        object as sys::ObjectPtr
    } else {
        ptr::null_mut()
    }
}

unsafe extern "C" fn classdb_get_class_tag(class_name: sys::ConstStringNamePtr) -> *mut c_void {
    let class = read_string(class_name);
    with_state(|state| {
        let index = match state.class_tags.iter().position(|tag| *tag == class) {
            Some(index) => index,
            None => {
                state.class_tags.push(class);
                state.class_tags.len() - 1
            }
        };
        (index + 1) as *mut c_void
    })
}

unsafe extern "C" fn classdb_construct_object(class_name: sys::ConstStringNamePtr) -> sys::ObjectPtr {
    let class = read_string(class_name);

    let (extension, refused) = with_state(|state| {
        (
            state.extension_classes.get(&class).copied(),
            state.unconstructible.contains(&class),
        )
    });

    if refused {
        return ptr::null_mut();
    }

    match extension.and_then(|info| info.create_instance_func.map(|create| (create, info.class_userdata))) {
        Some((create, userdata)) => create(userdata),
        None => with_state(|state| state.alloc_object(&class)),
    }
}

unsafe extern "C" fn classdb_get_method_bind(
    class_name: sys::ConstStringNamePtr,
    method_name: sys::ConstStringNamePtr,
    hash: sys::SysInt,
) -> sys::MethodBindPtr {
    let class = read_string(class_name);
    let method = read_string(method_name);

    with_state(|state| {
        state
            .binds
            .iter()
            .position(|bind| bind.class == class && bind.method == method && bind.hash == hash)
            .map_or(ptr::null(), |index| (index + 1) as sys::MethodBindPtr)
    })
}

unsafe extern "C" fn classdb_register_extension_class(
    _library: sys::ClassLibraryPtr,
    class_name: sys::ConstStringNamePtr,
    parent_class_name: sys::ConstStringNamePtr,
    info: *const sys::ClassCreationInfo,
) {
    let class = read_string(class_name);
    let parent = read_string(parent_class_name);
    with_state(|state| {
        state.extension_classes.insert(class.clone(), *info);
        state.extension_parents.insert(class.clone(), parent);
        state.registered.push(class);
    });
}

unsafe extern "C" fn classdb_register_extension_class_method(
    _library: sys::ClassLibraryPtr,
    class_name: sys::ConstStringNamePtr,
    method_info: *const sys::ClassMethodInfo,
) {
    let class = read_string(class_name);
    let info = *method_info;
    let name = read_string(info.name);

    with_state(|state| {
        assert!(
            state.extension_classes.contains_key(&class),
            "mock: method {class}::{name} registered before its class"
        );
        state.extension_methods.push(MockMethod { class, name, info });
    });
}

unsafe extern "C" fn classdb_unregister_extension_class(
    _library: sys::ClassLibraryPtr,
    class_name: sys::ConstStringNamePtr,
) {
    let class = read_string(class_name);
    with_state(|state| {
        state.extension_classes.remove(&class);
        state.extension_parents.remove(&class);
        state.extension_methods.retain(|method| method.class != class);
        state.unregistered.push(class);
    });
}
