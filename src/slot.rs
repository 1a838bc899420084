//! Per-slot storage and the sequence-number readiness protocol.
//!
//! For a slot visited at logical position `pos` the sequence reads:
//!
//! - `2 * pos`: empty, a producer may claim it
//! - `2 * pos + 1`: holds a published item, a consumer may claim it
//! - `2 * (pos + capacity)`: consumed, ready for the next lap's producer
//!
//! Sequences advance in half-steps so that "published" and "free for the
//! next lap" stay distinct even when `capacity == 1`. All comparisons use
//! wrapping arithmetic so cursors may overflow freely.

use core::mem::MaybeUninit;

use crate::sync::{AtomicUsize, Ordering, UnsafeCell};

/// Where a slot stands relative to the sequence a caller is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// The sequence matches; the caller may try to claim the position.
    Ready,
    /// The slot is a lap behind: still full (producer) or not yet
    /// published (consumer).
    Pending,
    /// The slot moved past the caller's cursor snapshot; reload the cursor.
    Stale,
}

#[inline(always)]
const fn writable(pos: usize) -> usize {
    pos.wrapping_mul(2)
}

#[inline(always)]
const fn published(pos: usize) -> usize {
    writable(pos).wrapping_add(1)
}

/// One cache line per slot so neighbouring positions never false-share.
#[repr(C, align(64))]
pub(crate) struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    /// A slot that is empty and writable at position `pos`.
    pub(crate) fn new(pos: usize) -> Self {
        Slot {
            sequence: AtomicUsize::new(writable(pos)),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Can a producer holding cursor `pos` claim this slot?
    #[inline]
    pub(crate) fn write_state(&self, pos: usize) -> SlotState {
        self.state(writable(pos))
    }

    /// Can a consumer holding cursor `pos` claim this slot?
    #[inline]
    pub(crate) fn read_state(&self, pos: usize) -> SlotState {
        self.state(published(pos))
    }

    /// Hand the item written at `pos` to consumers.
    #[inline]
    pub(crate) fn publish_written(&self, pos: usize) {
        self.sequence.store(published(pos), Ordering::Release);
    }

    /// Hand the slot consumed at `pos` to the next lap's producer.
    #[inline]
    pub(crate) fn publish_consumed(&self, pos: usize, capacity: usize) {
        self.sequence
            .store(writable(pos.wrapping_add(capacity)), Ordering::Release);
    }

    // The acquire load pairs with the release stores above, so a `Ready`
    // observation also makes the other side's access to `value` visible.
    #[inline]
    fn state(&self, expected: usize) -> SlotState {
        let sequence = self.sequence.load(Ordering::Acquire);
        let diff = sequence.wrapping_sub(expected) as isize;
        match diff {
            0 => SlotState::Ready,
            d if d < 0 => SlotState::Pending,
            _ => SlotState::Stale,
        }
    }

    /// Move `item` into the slot.
    ///
    /// # Safety
    ///
    /// The caller must have claimed this slot for writing and the slot must
    /// not hold a live item.
    #[inline]
    pub(crate) unsafe fn write(&self, item: T) {
        self.value.with_mut(|ptr| unsafe {
            (*ptr).write(item);
        });
    }

    /// Move the item out, leaving the slot logically uninitialized.
    ///
    /// # Safety
    ///
    /// The caller must have claimed this slot for reading, and its sequence
    /// must have been observed as published.
    #[inline]
    pub(crate) unsafe fn take(&self) -> T {
        self.value.with_mut(|ptr| unsafe { (*ptr).assume_init_read() })
    }

    /// Drop the item in place.
    ///
    /// # Safety
    ///
    /// The slot must hold a live item and no other thread may access it.
    pub(crate) unsafe fn drop_in_place(&self) {
        self.value.with_mut(|ptr| unsafe { (*ptr).assume_init_drop() });
    }
}
