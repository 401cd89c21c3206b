/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

// Handle ownership against a mock engine: what gets destroyed, when, and how misuse is reported.

mod mock;

use gdlink::error::HandleErrorKind;
use gdlink::handle::{object_bits, Ownership};
use gdlink::prelude::*;
use gdlink::sys;

fn setup() -> (ClassDb, HandleRegistry) {
    let engine = mock::engine();
    mock::add_refcounted_methods();

    let mut builder = ClassDbBuilder::new();
    builder.engine_class::<Node>().engine_class::<Resource>();

    let class_db = builder.finish(engine).expect("engine classes are consistent");
    let registry = HandleRegistry::new(class_db.finalizer());
    (class_db, registry)
}

fn object_of(registry: &HandleRegistry, handle: Handle) -> sys::ObjectPtr {
    registry.borrow(handle).object_ptr()
}

#[test]
fn release_destroys_host_object() {
    let (class_db, mut registry) = setup();

    let node = class_db.construct_handle(&mut registry, "Node").unwrap();
    let object = object_of(&registry, node);
    assert!(mock::is_alive(object));
    assert_eq!(registry.inspect(node).ownership, Ownership::Host);

    registry.release(node);
    assert!(!mock::is_alive(object));
    assert!(!registry.is_live(node));
    assert_eq!(mock::invalid_destroys(), 0);
}

#[test]
fn second_release_is_rejected() {
    let (_class_db, mut registry) = setup();

    let h1 = registry.acquire(HandleKind::Object);
    registry.release(h1);

    let err = registry.try_release(h1).unwrap_err();
    assert_eq!(err.kind(), HandleErrorKind::DoubleRelease);
    assert_eq!(err.handle(), h1);
    assert_eq!(registry.stats().live, 0);
}

#[test]
#[should_panic(expected = "handle misuse")]
fn second_release_panics() {
    let (_class_db, mut registry) = setup();

    let h1 = registry.acquire(HandleKind::Object);
    registry.release(h1);
    registry.release(h1);
}

#[test]
fn double_release_destroys_once() {
    let (class_db, mut registry) = setup();

    let node = class_db.construct_handle(&mut registry, "Node").unwrap();
    registry.release(node);
    assert!(registry.try_release(node).is_err());

    assert_eq!(mock::destroyed().len(), 1);
    assert_eq!(mock::invalid_destroys(), 0);
}

#[test]
fn use_after_release_is_detected() {
    let (class_db, mut registry) = setup();

    let node = class_db.construct_handle(&mut registry, "Node").unwrap();
    registry.release(node);

    let err = registry.try_borrow(node).unwrap_err();
    assert_eq!(err.kind(), HandleErrorKind::UseAfterRelease);

    // Slot is reused by the next handle; the old one is now stale.
    let next = registry.acquire(HandleKind::Object);
    assert_eq!(next.index(), node.index());
    assert_eq!(registry.try_borrow(node).unwrap_err().kind(), HandleErrorKind::Stale);
}

#[test]
fn refcounted_release_drops_one_reference() {
    let (class_db, mut registry) = setup();

    let resource = class_db.construct_handle(&mut registry, "Resource").unwrap();
    let object = object_of(&registry, resource);
    assert_eq!(registry.inspect(resource).bits[2], 1, "refcounted flag");

    mock::clear_calls();
    registry.release(resource);

    let methods: Vec<String> = mock::calls().into_iter().map(|call| call.method).collect();
    assert_eq!(methods, ["unreference"]);
    assert!(!mock::is_alive(object));
}

#[test]
fn refcounted_object_with_other_references_survives() {
    let (class_db, mut registry) = setup();

    let resource = class_db.construct_handle(&mut registry, "Resource").unwrap();
    let object = object_of(&registry, resource);

    // Someone else on the engine side holds a reference, too.
    let reference = class_db.resolve_method("RefCounted", "reference").unwrap();
    let _: bool = unsafe { reference.call(&registry.borrow(resource), ()) };
    assert_eq!(mock::refcount(object), 2);

    registry.release(resource);
    assert!(mock::is_alive(object));
    assert_eq!(mock::refcount(object), 1);
}

#[test]
fn transfer_round_trip_keeps_content() {
    let (_class_db, mut registry) = setup();
    let receiver = registry.acquire(HandleKind::Object);

    for ownership in [Ownership::Host, Ownership::Engine, Ownership::Shared, Ownership::Borrowed] {
        let destroyed_before = mock::builtins_destroyed().len();
        let bits = [7, 0, 0];
        let handle = match ownership {
            Ownership::Shared => {
                let handle = registry.acquire_with(HandleKind::Array, bits, Ownership::Host);
                registry.bind_to_receiver(handle, receiver);
                handle
            }
            other => registry.acquire_with(HandleKind::Array, bits, other),
        };
        let before = registry.inspect(handle);
        assert_eq!(before.ownership, ownership);

        let raw = registry.transfer_to_foreign(handle);
        assert_eq!(
            registry.try_borrow(handle).unwrap_err().kind(),
            HandleErrorKind::UseAfterTransfer
        );

        let back = registry.transfer_from_foreign(HandleKind::Array, raw);
        let after = registry.inspect(back);
        assert_eq!(after.kind, before.kind);
        assert_eq!(after.bits, before.bits);
        assert_eq!(registry.borrow(back).abi_words(), &before.bits[..1]);

        // Transferring never destroys anything.
        assert_eq!(mock::builtins_destroyed().len(), destroyed_before);

        registry.release(back);
        assert_eq!(mock::builtins_destroyed().len(), destroyed_before + 1);
    }

    // Round-tripped handles are host-owned again, so each release destroyed its value once.
    assert_eq!(mock::builtins_destroyed(), vec![(sys::VARIANT_TYPE_ARRAY, 7); 4]);
    assert_eq!(registry.inspect(receiver).dependents, 0);
}

#[test]
fn ceded_object_survives_release() {
    let (class_db, mut registry) = setup();

    let node = class_db.construct_handle(&mut registry, "Node").unwrap();
    let object = object_of(&registry, node);

    // E.g. added to the scene tree: the engine frees it from now on.
    registry.cede(node);
    assert_eq!(registry.inspect(node).ownership, Ownership::Engine);

    registry.release(node);
    assert!(mock::is_alive(object));

    mock::free_object(object);
    assert_eq!(mock::object_count(), 0);
}

#[test]
fn shared_handles_end_with_receiver() {
    let (class_db, mut registry) = setup();

    let parent = class_db.construct_handle(&mut registry, "Node").unwrap();
    let child_object = mock::new_object("Node");

    let child = registry.acquire_with(
        HandleKind::Object,
        object_bits(child_object, 99, false),
        Ownership::Borrowed,
    );
    registry.bind_to_receiver(child, parent);
    assert_eq!(registry.inspect(child).ownership, Ownership::Shared);
    assert_eq!(registry.inspect(parent).dependents, 1);

    registry.release(parent);
    assert!(!registry.is_live(child));

    // The dependent only ends tracking; the engine owns the object.
    assert!(mock::is_alive(child_object));
    assert_eq!(mock::destroyed().len(), 1);
}

#[test]
fn receiver_cycles_are_rejected() {
    let (_class_db, mut registry) = setup();

    let a = registry.acquire(HandleKind::Object);
    let b = registry.acquire(HandleKind::Object);
    registry.bind_to_receiver(b, a);

    let err = registry.try_bind_to_receiver(a, b).unwrap_err();
    assert_eq!(err.kind(), HandleErrorKind::ReceiverCycle);
}

#[test]
fn pinned_handle_cannot_be_released() {
    let (class_db, mut registry) = setup();

    let node = class_db.construct_handle(&mut registry, "Node").unwrap();
    registry.pin(node);

    assert_eq!(registry.try_release(node).unwrap_err().kind(), HandleErrorKind::Pinned);
    assert_eq!(registry.try_transfer_to_foreign(node).unwrap_err().kind(), HandleErrorKind::Pinned);
    assert!(mock::is_alive(object_of(&registry, node)));
}

#[test]
fn shutdown_destroys_remaining_newest_first() {
    let (class_db, mut registry) = setup();
    registry.set_warn_on_leaks(false);

    let handles: Vec<Handle> = (0..3)
        .map(|_| class_db.construct_handle(&mut registry, "Node").unwrap())
        .collect();
    let ids: Vec<u64> = handles
        .iter()
        .map(|&h| registry.borrow(h).instance_id().unwrap())
        .collect();

    // Pinned handles are finalized as well, but are not leaks.
    registry.pin(handles[1]);

    let leaked = registry.shutdown();
    assert_eq!(leaked, 2);
    assert_eq!(mock::destroyed(), vec![ids[2], ids[1], ids[0]]);
    assert_eq!(registry.stats().live, 0);

    // Nothing left for a second round.
    assert_eq!(registry.shutdown(), 0);
}

#[test]
fn stats_track_ownership() {
    let (class_db, mut registry) = setup();

    let node = class_db.construct_handle(&mut registry, "Node").unwrap();
    let engine_object = mock::new_object("Node");
    let engine_owned = registry.acquire_with(
        HandleKind::Object,
        object_bits(engine_object, 5, false),
        Ownership::Engine,
    );
    registry.acquire_with(HandleKind::Array, [1, 0, 0], Ownership::Borrowed);

    let stats = registry.stats();
    assert_eq!((stats.live, stats.host, stats.engine, stats.borrowed), (3, 1, 1, 1));

    registry.release(node);
    registry.release(engine_owned);
    let stats = registry.stats();
    assert_eq!(stats.live, 1);
    assert_eq!(stats.acquired_total, 3);
}
