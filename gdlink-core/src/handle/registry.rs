/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::VecDeque;

use super::{
    Borrowed, EngineFinalizer, Finalize, Handle, HandleInfo, HandleKind, HandleStats, Ownership, RawBits, RAW_WORDS,
};
use crate::config::LinkConfig;
use crate::error::{HandleError, HandleErrorKind};
use crate::sys;

/// Default upper bound on simultaneously live handles.
pub const DEFAULT_CAPACITY: usize = 1 << 20;

const OP_RELEASE: &str = "release";
const OP_BORROW: &str = "borrow";
const OP_TRANSFER: &str = "transfer_to_foreign";
const OP_CEDE: &str = "cede";
const OP_PIN: &str = "pin";
const OP_UNPIN: &str = "unpin";
const OP_BIND: &str = "bind_to_receiver";
const OP_INSPECT: &str = "inspect";
const OP_SET_BITS: &str = "set_bits";
const OP_QUERY: &str = "is_live";

/// Why a slot became vacant. Kept until the slot is reused, to name the misuse precisely.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Tombstone {
    Released,
    Transferred,
}

struct Entry {
    kind: HandleKind,
    ownership: Ownership,
    bits: RawBits,
    pinned: bool,
    /// Acquisition order, for reverse-order teardown.
    sequence: u64,
    receiver: Option<Handle>,
    dependents: Vec<Handle>,
}

enum SlotState {
    Vacant(Tombstone),
    Live(Entry),
}

struct Slot {
    /// Generation of the current occupant; for vacant slots, of the next one.
    generation: u32,
    state: SlotState,
}

/// Issues [`Handle`]s for engine resources and tracks their ownership.
///
/// Slots are recycled in FIFO order and carry a generation counter that is bumped whenever a handle dies, so stale copies
/// are recognized on every access. These checks are always on.
///
/// The registry is plain single-threaded data (`&mut self` for every mutation). Callers that share it across threads must
/// wrap it in a lock; the engine's own thread rules apply to the resources anyway.
///
/// A borrowed view ties up the registry until it is dropped, so a handle cannot be released while its bits are in use:
///
/// ```compile_fail
/// use gdlink_core::handle::{HandleKind, HandleRegistry};
///
/// let mut registry = HandleRegistry::new(());
/// let handle = registry.acquire(HandleKind::Object);
///
/// let view = registry.borrow(handle);
/// registry.release(handle); // error: `registry` is still borrowed by `view`
/// println!("{:?}", view.bits());
/// ```
pub struct HandleRegistry<F: Finalize = EngineFinalizer> {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    finalizer: F,
    capacity: usize,
    warn_on_leaks: bool,
    next_sequence: u64,
    acquired_total: u64,
    released_total: u64,
    transferred_total: u64,
}

impl<F: Finalize> HandleRegistry<F> {
    pub fn new(finalizer: F) -> Self {
        Self::with_capacity_limit(finalizer, DEFAULT_CAPACITY)
    }

    /// Registry that aborts (panics) once `capacity` handles are live at the same time.
    pub fn with_capacity_limit(finalizer: F, capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            finalizer,
            capacity: capacity.min(u32::MAX as usize),
            warn_on_leaks: true,
            next_sequence: 0,
            acquired_total: 0,
            released_total: 0,
            transferred_total: 0,
        }
    }

    pub fn from_config(finalizer: F, config: &LinkConfig) -> Self {
        let mut registry = Self::with_capacity_limit(finalizer, config.handle_capacity);
        registry.warn_on_leaks = config.warn_on_leaks;
        registry
    }

    /// Whether [`shutdown()`](Self::shutdown) reports host-owned handles that were never released.
    pub fn set_warn_on_leaks(&mut self, warn: bool) {
        self.warn_on_leaks = warn;
    }

    pub fn finalizer(&self) -> &F {
        &self.finalizer
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Acquisition

    /// Registers a new host-owned resource of `kind` whose bits are not yet known (filled later, e.g. by a return slot).
    ///
    /// # Panics
    /// If the registry is exhausted. There is no recovery from exhaustion.
    pub fn acquire(&mut self, kind: HandleKind) -> Handle {
        self.acquire_with(kind, [0; RAW_WORDS], Ownership::Host)
    }

    /// Registers an existing resource with the given bits and ownership.
    ///
    /// # Panics
    /// If the registry is exhausted.
    pub fn acquire_with(&mut self, kind: HandleKind, bits: RawBits, ownership: Ownership) -> Handle {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let handle = self.insert(Entry {
            kind,
            ownership,
            bits,
            pinned: false,
            sequence,
            receiver: None,
            dependents: Vec::new(),
        });

        sys::out!("handles: acquire {handle} as {ownership:?}");
        handle
    }

    /// Takes ownership of a resource the engine handed over permanently (e.g. a freshly allocated string).
    pub fn transfer_from_foreign(&mut self, kind: HandleKind, bits: RawBits) -> Handle {
        self.acquire_with(kind, bits, Ownership::Host)
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Release and transfer

    /// Ends the handle. Host-owned resources are destroyed, shared dependents are released with it.
    ///
    /// # Panics
    /// On double release, use after release/transfer, or when the handle is pinned.
    #[track_caller]
    pub fn release(&mut self, handle: Handle) {
        if let Err(err) = self.try_release(handle) {
            misuse(err)
        }
    }

    pub fn try_release(&mut self, handle: Handle) -> Result<(), HandleError> {
        let index = self.locate(handle, OP_RELEASE)?;
        if self.entry(index).pinned {
            return Err(HandleError::new(HandleErrorKind::Pinned, handle, OP_RELEASE));
        }

        self.release_at(index, handle);
        Ok(())
    }

    /// Gives the resource to the engine for good. The handle dies; the returned bits are what the engine now owns.
    ///
    /// Shared dependents of the handle stay alive, but their lifetime is now up to the engine.
    ///
    /// # Panics
    /// If the handle is dead or pinned.
    #[track_caller]
    pub fn transfer_to_foreign(&mut self, handle: Handle) -> RawBits {
        self.try_transfer_to_foreign(handle).unwrap_or_else(|err| misuse(err))
    }

    pub fn try_transfer_to_foreign(&mut self, handle: Handle) -> Result<RawBits, HandleError> {
        let index = self.locate(handle, OP_TRANSFER)?;
        if self.entry(index).pinned {
            return Err(HandleError::new(HandleErrorKind::Pinned, handle, OP_TRANSFER));
        }

        let entry = self.vacate(index, Tombstone::Transferred);
        self.unlink_from_receiver(handle, entry.receiver);

        for dependent in entry.dependents {
            if let Ok(dependent_index) = self.locate(dependent, OP_TRANSFER) {
                let dependent = self.entry_mut(dependent_index);
                dependent.receiver = None;
                dependent.ownership = Ownership::Engine;
            }
        }

        self.transferred_total += 1;
        sys::out!("handles: transfer {handle} to engine");
        Ok(entry.bits)
    }

    /// Hands ownership to the engine while keeping the handle usable (e.g. a node added to the scene tree).
    #[track_caller]
    pub fn cede(&mut self, handle: Handle) {
        if let Err(err) = self.try_cede(handle) {
            misuse(err)
        }
    }

    pub fn try_cede(&mut self, handle: Handle) -> Result<(), HandleError> {
        let index = self.locate(handle, OP_CEDE)?;

        let entry = self.entry_mut(index);
        entry.ownership = Ownership::Engine;
        let receiver = entry.receiver.take();

        self.unlink_from_receiver(handle, receiver);
        Ok(())
    }

    /// Binds the handle's lifetime to `receiver`: it becomes [`Ownership::Shared`] and is released together with it.
    #[track_caller]
    pub fn bind_to_receiver(&mut self, handle: Handle, receiver: Handle) {
        if let Err(err) = self.try_bind_to_receiver(handle, receiver) {
            misuse(err)
        }
    }

    pub fn try_bind_to_receiver(&mut self, handle: Handle, receiver: Handle) -> Result<(), HandleError> {
        let index = self.locate(handle, OP_BIND)?;
        let receiver_index = self.locate(receiver, OP_BIND)?;

        // Walk up the receiver chain; meeting `handle` there means a cycle.
        let mut current = Some(receiver);
        while let Some(ancestor) = current {
            if ancestor == handle {
                return Err(HandleError::new(HandleErrorKind::ReceiverCycle, handle, OP_BIND));
            }
            current = self.locate(ancestor, OP_BIND).ok().and_then(|i| self.entry(i).receiver);
        }

        let entry = self.entry_mut(index);
        entry.ownership = Ownership::Shared;
        let previous = entry.receiver.replace(receiver);

        self.unlink_from_receiver(handle, previous);
        self.entry_mut(receiver_index).dependents.push(handle);
        Ok(())
    }

    /// Keeps the handle alive until [`unpin()`](Self::unpin) or [`shutdown()`](Self::shutdown). Pinned handles cannot be
    /// released or transferred, and outlive a released receiver: they are detached from it and handed to the engine.
    #[track_caller]
    pub fn pin(&mut self, handle: Handle) {
        if let Err(err) = self.try_pin(handle) {
            misuse(err)
        }
    }

    pub fn try_pin(&mut self, handle: Handle) -> Result<(), HandleError> {
        let index = self.locate(handle, OP_PIN)?;
        self.entry_mut(index).pinned = true;
        Ok(())
    }

    #[track_caller]
    pub fn unpin(&mut self, handle: Handle) {
        if let Err(err) = self.try_unpin(handle) {
            misuse(err)
        }
    }

    pub fn try_unpin(&mut self, handle: Handle) -> Result<(), HandleError> {
        let index = self.locate(handle, OP_UNPIN)?;
        self.entry_mut(index).pinned = false;
        Ok(())
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Access

    /// Raw bits for the duration of one call, without moving ownership.
    ///
    /// # Panics
    /// If the handle is dead.
    #[track_caller]
    pub fn borrow(&self, handle: Handle) -> Borrowed<'_> {
        self.try_borrow(handle).unwrap_or_else(|err| misuse(err))
    }

    pub fn try_borrow(&self, handle: Handle) -> Result<Borrowed<'_>, HandleError> {
        let index = self.locate(handle, OP_BORROW)?;
        Ok(Borrowed::new(handle, self.entry(index).bits))
    }

    #[track_caller]
    pub fn inspect(&self, handle: Handle) -> HandleInfo {
        self.try_inspect(handle).unwrap_or_else(|err| misuse(err))
    }

    pub fn try_inspect(&self, handle: Handle) -> Result<HandleInfo, HandleError> {
        let index = self.locate(handle, OP_INSPECT)?;
        let entry = self.entry(index);

        Ok(HandleInfo {
            kind: entry.kind,
            ownership: entry.ownership,
            pinned: entry.pinned,
            receiver: entry.receiver,
            dependents: entry.dependents.len(),
            bits: entry.bits,
        })
    }

    /// Replaces the bits, e.g. after the engine reallocated the value in place.
    #[track_caller]
    pub fn set_bits(&mut self, handle: Handle, bits: RawBits) {
        if let Err(err) = self.try_set_bits(handle, bits) {
            misuse(err)
        }
    }

    pub fn try_set_bits(&mut self, handle: Handle, bits: RawBits) -> Result<(), HandleError> {
        let index = self.locate(handle, OP_SET_BITS)?;
        self.entry_mut(index).bits = bits;
        Ok(())
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.locate(handle, OP_QUERY).is_ok()
    }

    /// All live handles, in slot order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match &slot.state {
            SlotState::Live(entry) => Some(Handle::new(index as u32, slot.generation, entry.kind)),
            SlotState::Vacant(_) => None,
        })
    }

    pub fn stats(&self) -> HandleStats {
        let mut stats = HandleStats {
            acquired_total: self.acquired_total,
            released_total: self.released_total,
            transferred_total: self.transferred_total,
            ..HandleStats::default()
        };

        for slot in &self.slots {
            let SlotState::Live(entry) = &slot.state else {
                continue;
            };

            stats.live += 1;
            stats.pinned += entry.pinned as usize;
            match entry.ownership {
                Ownership::Host => stats.host += 1,
                Ownership::Engine => stats.engine += 1,
                Ownership::Shared => stats.shared += 1,
                Ownership::Borrowed => stats.borrowed += 1,
            }
        }

        stats
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Teardown

    /// Ends every remaining handle, newest first. Host-owned resources are destroyed.
    ///
    /// Returns the number of host-owned, unpinned handles that were never released (leaks), which are also reported as a
    /// warning unless disabled. Handles issued before shutdown are dead afterwards.
    pub fn shutdown(&mut self) -> usize {
        let mut live: Vec<(u64, usize, Handle)> = Vec::with_capacity(self.len());
        for (index, slot) in self.slots.iter().enumerate() {
            if let SlotState::Live(entry) = &slot.state {
                let handle = Handle::new(index as u32, slot.generation, entry.kind);
                live.push((entry.sequence, index, handle));
            }
        }
        live.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut leaked = 0;
        for (_, index, handle) in live {
            let entry = self.vacate(index, Tombstone::Released);
            self.released_total += 1;

            if entry.ownership != Ownership::Host {
                continue;
            }

            if !entry.pinned {
                leaked += 1;
                sys::out!("handles: {handle} was never released");
            }

            self.finalize_entry(&entry);
        }

        if leaked > 0 && self.warn_on_leaks {
            crate::godot_warn!("{leaked} host-owned handle(s) were never released; destroyed at shutdown");
        }

        leaked
    }

    // ------------------------------------------------------------------------------------------------------------------------------------------
    // Internals

    fn insert(&mut self, entry: Entry) -> Handle {
        let kind = entry.kind;

        let index = if let Some(index) = self.free.pop_front() {
            index
        } else if self.slots.len() < self.capacity {
            self.slots.push(Slot {
                generation: 0,
                state: SlotState::Vacant(Tombstone::Released),
            });
            (self.slots.len() - 1) as u32
        } else {
            panic!(
                "handle registry exhausted: {} live handles (capacity {})",
                self.len(),
                self.capacity
            );
        };

        let slot = &mut self.slots[index as usize];
        slot.state = SlotState::Live(entry);
        self.acquired_total += 1;

        Handle::new(index, slot.generation, kind)
    }

    /// Validates `handle` and returns its slot index, or the precise misuse.
    fn locate(&self, handle: Handle, operation: &'static str) -> Result<usize, HandleError> {
        let fail = |kind| Err(HandleError::new(kind, handle, operation));

        let index = handle.index() as usize;
        let Some(slot) = self.slots.get(index) else {
            return fail(HandleErrorKind::Invalid);
        };

        if slot.generation == handle.generation() {
            return match &slot.state {
                SlotState::Live(entry) if entry.kind == handle.kind() => Ok(index),
                SlotState::Live(entry) => fail(HandleErrorKind::KindMismatch { actual: entry.kind }),
                // Vacant slots carry the generation of their next occupant, which has not been issued yet.
                SlotState::Vacant(_) => fail(HandleErrorKind::Invalid),
            };
        }

        // Last occupant of a slot that has not been reused yet: the tombstone says what happened.
        if slot.generation == handle.generation().wrapping_add(1) {
            if let SlotState::Vacant(tombstone) = slot.state {
                let kind = match tombstone {
                    Tombstone::Released if operation == OP_RELEASE => HandleErrorKind::DoubleRelease,
                    Tombstone::Released => HandleErrorKind::UseAfterRelease,
                    Tombstone::Transferred => HandleErrorKind::UseAfterTransfer,
                };
                return fail(kind);
            }
        }

        if handle.generation() < slot.generation {
            fail(HandleErrorKind::Stale)
        } else {
            fail(HandleErrorKind::Invalid)
        }
    }

    /// Releases the handle and, transitively, its dependents. Pinned dependents are detached instead and stay live.
    fn release_at(&mut self, index: usize, handle: Handle) {
        let first = self.vacate(index, Tombstone::Released);
        self.unlink_from_receiver(handle, first.receiver);

        // Explicit worklist: receiver chains can be arbitrarily long.
        let mut pending = vec![(handle, first)];
        while let Some((handle, entry)) = pending.pop() {
            if entry.ownership == Ownership::Host {
                self.finalize_entry(&entry);
            }

            self.released_total += 1;
            sys::out!("handles: release {handle}");

            for dependent in entry.dependents {
                let Ok(dependent_index) = self.locate(dependent, OP_RELEASE) else {
                    continue;
                };

                let dependent_entry = self.entry_mut(dependent_index);
                dependent_entry.receiver = None;

                if dependent_entry.pinned {
                    dependent_entry.ownership = Ownership::Engine;
                    sys::out!("handles: {dependent} is pinned, detached from released receiver {handle}");
                } else {
                    pending.push((dependent, self.vacate(dependent_index, Tombstone::Released)));
                }
            }
        }
    }

    fn finalize_entry(&self, entry: &Entry) {
        // Bits never written: nothing was allocated.
        if entry.bits == [0; RAW_WORDS] {
            return;
        }

        // SAFETY: the entry was host-owned and its slot is vacated, so no other handle refers to the resource.
        unsafe { self.finalizer.finalize(entry.kind, &entry.bits) };
    }

    fn vacate(&mut self, index: usize, tombstone: Tombstone) -> Entry {
        let slot = &mut self.slots[index];
        let state = std::mem::replace(&mut slot.state, SlotState::Vacant(tombstone));
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(index as u32);

        match state {
            SlotState::Live(entry) => entry,
            SlotState::Vacant(_) => unreachable!("vacate() on vacant slot {index}"),
        }
    }

    fn unlink_from_receiver(&mut self, handle: Handle, receiver: Option<Handle>) {
        let Some(receiver) = receiver else {
            return;
        };

        if let Ok(receiver_index) = self.locate(receiver, OP_RELEASE) {
            self.entry_mut(receiver_index).dependents.retain(|d| *d != handle);
        }
    }

    fn entry(&self, index: usize) -> &Entry {
        match &self.slots[index].state {
            SlotState::Live(entry) => entry,
            SlotState::Vacant(_) => unreachable!("slot {index} is vacant"),
        }
    }

    fn entry_mut(&mut self, index: usize) -> &mut Entry {
        match &mut self.slots[index].state {
            SlotState::Live(entry) => entry,
            SlotState::Vacant(_) => unreachable!("slot {index} is vacant"),
        }
    }
}

#[track_caller]
fn misuse(err: HandleError) -> ! {
    panic!("handle misuse: {err}")
}

// ----------------------------------------------------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::handle::{object_bits, PackedElement};

    #[derive(Default)]
    struct Recorder {
        finalized: RefCell<Vec<RawBits>>,
        retained: RefCell<Vec<RawBits>>,
    }

    impl Finalize for Recorder {
        unsafe fn finalize(&self, _kind: HandleKind, bits: &RawBits) {
            self.finalized.borrow_mut().push(*bits);
        }

        unsafe fn retain(&self, _kind: HandleKind, bits: &RawBits) {
            self.retained.borrow_mut().push(*bits);
        }
    }

    fn bits(n: u64) -> RawBits {
        [n, 0, 0]
    }

    #[test]
    fn acquire_then_release() {
        let mut registry = HandleRegistry::new(Recorder::default());
        let h = registry.acquire_with(HandleKind::String, bits(7), Ownership::Host);

        assert!(registry.is_live(h));
        assert_eq!(registry.len(), 1);

        registry.release(h);
        assert!(!registry.is_live(h));
        assert!(registry.is_empty());
        assert_eq!(*registry.finalizer().finalized.borrow(), vec![bits(7)]);
    }

    #[test]
    fn double_release_is_detected() {
        let mut registry = HandleRegistry::new(());
        let h = registry.acquire(HandleKind::Object);

        registry.release(h);
        let err = registry.try_release(h).unwrap_err();

        assert_eq!(err.kind(), HandleErrorKind::DoubleRelease);
        assert_eq!(err.handle(), h);
        assert_eq!(err.operation(), "release");
    }

    #[test]
    #[should_panic(expected = "double release")]
    fn double_release_panics() {
        let mut registry = HandleRegistry::new(());
        let h = registry.acquire(HandleKind::Object);

        registry.release(h);
        registry.release(h);
    }

    #[test]
    fn use_after_release() {
        let mut registry = HandleRegistry::new(());
        let h = registry.acquire(HandleKind::Array);
        registry.release(h);

        let err = registry.try_borrow(h).unwrap_err();
        assert_eq!(err.kind(), HandleErrorKind::UseAfterRelease);
    }

    #[test]
    fn stale_after_slot_reuse() {
        let mut registry = HandleRegistry::new(());
        let old = registry.acquire(HandleKind::Object);
        registry.release(old);

        let new = registry.acquire(HandleKind::Object);
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());

        assert_eq!(registry.try_release(old).unwrap_err().kind(), HandleErrorKind::Stale);
        assert!(registry.is_live(new));
    }

    #[test]
    fn engine_owned_is_not_finalized() {
        let mut registry = HandleRegistry::new(Recorder::default());

        let engine = registry.acquire_with(HandleKind::Object, bits(1), Ownership::Engine);
        let borrowed = registry.acquire_with(HandleKind::Object, bits(2), Ownership::Borrowed);
        registry.release(engine);
        registry.release(borrowed);

        assert!(registry.finalizer().finalized.borrow().is_empty());
    }

    #[test]
    fn unwritten_bits_are_not_finalized() {
        let mut registry = HandleRegistry::new(Recorder::default());
        let h = registry.acquire(HandleKind::Dictionary);
        registry.release(h);

        assert!(registry.finalizer().finalized.borrow().is_empty());
    }

    #[test]
    fn transfer_round_trip() {
        let mut registry = HandleRegistry::new(Recorder::default());
        let original = object_bits(0x1000 as sys::ObjectPtr, 42, true);
        let h = registry.acquire_with(HandleKind::Object, original, Ownership::Host);

        let raw = registry.transfer_to_foreign(h);
        assert_eq!(raw, original);
        assert_eq!(registry.try_borrow(h).unwrap_err().kind(), HandleErrorKind::UseAfterTransfer);

        let back = registry.transfer_from_foreign(HandleKind::Object, raw);
        assert_eq!(registry.borrow(back).bits(), &original);
        assert_eq!(registry.inspect(back).ownership, Ownership::Host);

        // Transfer does not destroy anything.
        assert!(registry.finalizer().finalized.borrow().is_empty());
    }

    #[test]
    fn cede_keeps_handle_usable() {
        let mut registry = HandleRegistry::new(Recorder::default());
        let h = registry.acquire_with(HandleKind::Object, bits(9), Ownership::Host);

        registry.cede(h);
        assert_eq!(registry.inspect(h).ownership, Ownership::Engine);
        assert_eq!(registry.borrow(h).bits(), &bits(9));

        registry.release(h);
        assert!(registry.finalizer().finalized.borrow().is_empty());
    }

    #[test]
    fn shared_handles_die_with_receiver() {
        let mut registry = HandleRegistry::new(Recorder::default());
        let receiver = registry.acquire_with(HandleKind::Object, bits(1), Ownership::Host);
        let name = registry.acquire_with(HandleKind::StringName, bits(2), Ownership::Borrowed);
        let list = registry.acquire_with(HandleKind::Array, bits(3), Ownership::Host);

        registry.bind_to_receiver(name, receiver);
        registry.bind_to_receiver(list, receiver);
        assert_eq!(registry.inspect(receiver).dependents, 2);
        assert_eq!(registry.inspect(list).ownership, Ownership::Shared);
        assert_eq!(registry.inspect(list).receiver, Some(receiver));

        // Releasing a dependent on its own unlinks it.
        registry.release(name);
        assert_eq!(registry.inspect(receiver).dependents, 1);

        registry.release(receiver);
        assert!(!registry.is_live(list));
        assert_eq!(registry.try_borrow(list).unwrap_err().kind(), HandleErrorKind::UseAfterRelease);

        // Only the host-owned receiver is destroyed; shared values live as long as the engine says.
        assert_eq!(*registry.finalizer().finalized.borrow(), vec![bits(1)]);
    }

    #[test]
    fn transfer_detaches_dependents() {
        let mut registry = HandleRegistry::new(());
        let receiver = registry.acquire_with(HandleKind::Object, bits(1), Ownership::Host);
        let child = registry.acquire_with(HandleKind::String, bits(2), Ownership::Borrowed);
        registry.bind_to_receiver(child, receiver);

        registry.transfer_to_foreign(receiver);

        let info = registry.inspect(child);
        assert_eq!(info.receiver, None);
        assert_eq!(info.ownership, Ownership::Engine);
    }

    #[test]
    fn pinned_dependent_outlives_receiver() {
        let mut registry = HandleRegistry::new(Recorder::default());
        let receiver = registry.acquire_with(HandleKind::Object, bits(1), Ownership::Host);
        let kept = registry.acquire_with(HandleKind::Array, bits(2), Ownership::Host);
        let dropped = registry.acquire_with(HandleKind::Array, bits(3), Ownership::Host);

        registry.bind_to_receiver(kept, receiver);
        registry.bind_to_receiver(dropped, receiver);
        registry.pin(kept);

        registry.release(receiver);
        assert!(!registry.is_live(dropped));
        assert!(registry.is_live(kept));

        let info = registry.inspect(kept);
        assert_eq!(info.receiver, None);
        assert_eq!(info.ownership, Ownership::Engine);

        // Detached from the receiver; once unpinned it can be released on its own.
        registry.unpin(kept);
        registry.release(kept);
        assert_eq!(*registry.finalizer().finalized.borrow(), vec![bits(1)]);
    }

    #[test]
    fn pinned_grandchild_survives_cascade() {
        let mut registry = HandleRegistry::new(());
        let root = registry.acquire(HandleKind::Object);
        let middle = registry.acquire(HandleKind::Object);
        let leaf = registry.acquire(HandleKind::Object);

        registry.bind_to_receiver(leaf, middle);
        registry.bind_to_receiver(middle, root);
        registry.pin(leaf);

        registry.release(root);
        assert!(!registry.is_live(middle));
        assert!(registry.is_live(leaf));
        assert_eq!(registry.inspect(leaf).receiver, None);
    }

    #[test]
    fn long_receiver_chain_releases() {
        const CHAIN: usize = 200_000;

        let mut registry = HandleRegistry::new(());
        let root = registry.acquire(HandleKind::Object);

        // Built from the leaf end upward, so the cycle check in bind_to_receiver() stays short.
        let mut handles = Vec::with_capacity(CHAIN);
        for _ in 0..CHAIN {
            handles.push(registry.acquire(HandleKind::Object));
        }
        for pair in handles.windows(2).rev() {
            registry.bind_to_receiver(pair[1], pair[0]);
        }
        registry.bind_to_receiver(handles[0], root);

        registry.release(root);
        assert!(registry.is_empty());
        assert_eq!(registry.stats().released_total, CHAIN as u64 + 1);
    }

    #[test]
    fn receiver_cycle_is_rejected() {
        let mut registry = HandleRegistry::new(());
        let a = registry.acquire(HandleKind::Object);
        let b = registry.acquire(HandleKind::Object);

        registry.bind_to_receiver(b, a);
        let err = registry.try_bind_to_receiver(a, b).unwrap_err();

        assert_eq!(err.kind(), HandleErrorKind::ReceiverCycle);
        let err = registry.try_bind_to_receiver(a, a).unwrap_err();
        assert_eq!(err.kind(), HandleErrorKind::ReceiverCycle);
    }

    #[test]
    fn pinned_handles_survive_until_shutdown() {
        let mut registry = HandleRegistry::new(Recorder::default());
        let h = registry.acquire_with(HandleKind::StringName, bits(5), Ownership::Host);
        registry.pin(h);

        assert_eq!(registry.try_release(h).unwrap_err().kind(), HandleErrorKind::Pinned);
        assert_eq!(
            registry.try_transfer_to_foreign(h).unwrap_err().kind(),
            HandleErrorKind::Pinned
        );

        // Pinned handles are not leaks.
        assert_eq!(registry.shutdown(), 0);
        assert_eq!(*registry.finalizer().finalized.borrow(), vec![bits(5)]);
    }

    #[test]
    fn shutdown_finalizes_newest_first() {
        let mut registry = HandleRegistry::new(Recorder::default());
        registry.set_warn_on_leaks(false);

        let first = registry.acquire_with(HandleKind::Object, bits(1), Ownership::Host);
        let _engine = registry.acquire_with(HandleKind::Object, bits(2), Ownership::Engine);
        let _third = registry.acquire_with(HandleKind::String, bits(3), Ownership::Host);
        let fourth = registry.acquire_with(HandleKind::Array, bits(4), Ownership::Host);
        registry.release(fourth);

        // Slot of `fourth` is reused; its newer occupant must still go first.
        let _fifth = registry.acquire_with(HandleKind::Array, bits(5), Ownership::Host);

        assert_eq!(registry.shutdown(), 3);
        assert_eq!(
            *registry.finalizer().finalized.borrow(),
            vec![bits(4), bits(5), bits(3), bits(1)]
        );
        assert!(registry.is_empty());
        assert_eq!(registry.try_borrow(first).unwrap_err().kind(), HandleErrorKind::UseAfterRelease);
    }

    #[test]
    #[should_panic(expected = "handle registry exhausted")]
    fn exhaustion_is_fatal() {
        let mut registry = HandleRegistry::with_capacity_limit((), 2);
        registry.acquire(HandleKind::Object);
        registry.acquire(HandleKind::Object);
        registry.acquire(HandleKind::Object);
    }

    #[test]
    fn capacity_counts_live_handles_only() {
        let mut registry = HandleRegistry::with_capacity_limit((), 1);
        for _ in 0..10 {
            let h = registry.acquire(HandleKind::Callable);
            registry.release(h);
        }

        assert_eq!(registry.stats().acquired_total, 10);
        assert_eq!(registry.stats().released_total, 10);
    }

    #[test]
    fn kind_mismatch_and_foreign_handles() {
        let mut registry = HandleRegistry::new(());
        let h = registry.acquire(HandleKind::String);

        let wrong_kind = Handle::new(h.index(), h.generation(), HandleKind::Array);
        assert_eq!(
            registry.try_borrow(wrong_kind).unwrap_err().kind(),
            HandleErrorKind::KindMismatch {
                actual: HandleKind::String
            }
        );

        let never_issued = Handle::new(99, 0, HandleKind::String);
        assert_eq!(registry.try_borrow(never_issued).unwrap_err().kind(), HandleErrorKind::Invalid);

        let future = Handle::new(h.index(), h.generation() + 5, HandleKind::String);
        assert_eq!(registry.try_release(future).unwrap_err().kind(), HandleErrorKind::Invalid);
    }

    #[test]
    fn stats_by_ownership() {
        let mut registry = HandleRegistry::new(());
        let receiver = registry.acquire(HandleKind::Object);
        let shared = registry.acquire(HandleKind::PackedArray(PackedElement::Int32));
        registry.acquire_with(HandleKind::Object, bits(1), Ownership::Engine);
        registry.acquire_with(HandleKind::Object, bits(2), Ownership::Borrowed);
        registry.bind_to_receiver(shared, receiver);
        registry.pin(receiver);

        let stats = registry.stats();
        assert_eq!(stats.live, 4);
        assert_eq!(stats.host, 1);
        assert_eq!(stats.shared, 1);
        assert_eq!(stats.engine, 1);
        assert_eq!(stats.borrowed, 1);
        assert_eq!(stats.pinned, 1);
        assert_eq!(registry.handles().count(), 4);
    }

    #[test]
    fn set_bits_updates_view() {
        let mut registry = HandleRegistry::new(());
        let h = registry.acquire(HandleKind::Variant);
        registry.set_bits(h, [1, 2, 3]);

        let view = registry.borrow(h);
        assert_eq!(view.bits(), &[1, 2, 3]);
        assert_eq!(view.abi_words(), &[1, 2, 3]);
        assert!(view.object_ptr().is_null());
    }
}

// ----------------------------------------------------------------------------------------------------------------------------------------------
