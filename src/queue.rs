use core::alloc::Layout;
use core::fmt;
use core::mem;

use crossbeam_utils::CachePadded;

use crate::error::{AllocError, TryReadError, TryWriteError};
use crate::slot::{Slot, SlotState};
use crate::sync::{yield_now, AtomicUsize, Ordering};
use crate::trace;

/// Bounded lock-free MPMC queue.
///
/// Producers and consumers each advance their own cursor by compare-and-swap;
/// the per-slot sequence number tells them whether the slot at their cursor is
/// ready. Items come out in the order producers claimed their positions.
///
/// Share it between threads behind an `Arc` (or a scoped borrow).
pub struct Queue<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    read_cursor: CachePadded<AtomicUsize>,
    write_cursor: CachePadded<AtomicUsize>,
}

impl<T> Queue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// If `capacity` is zero or not a power of two. Allocation failure goes to
    /// the global out-of-memory handler; use [`Queue::try_new`] to get it back
    /// as an error instead.
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(queue) => queue,
            Err(err) => match Layout::array::<Slot<T>>(capacity) {
                Ok(layout) => std::alloc::handle_alloc_error(layout),
                Err(_) => panic!("{err}"),
            },
        }
    }

    /// Create a queue, reporting allocation failure as [`AllocError`].
    ///
    /// # Panics
    ///
    /// If `capacity` is zero or not a power of two.
    pub fn try_new(capacity: usize) -> Result<Self, AllocError> {
        assert!(capacity > 0, "capacity must be greater than 0");
        assert!(capacity.is_power_of_two(), "capacity must be a power of 2");

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| AllocError { capacity })?;
        slots.extend((0..capacity).map(Slot::new));

        trace::debug!(
            capacity,
            slot_size = mem::size_of::<Slot<T>>(),
            "allocated queue"
        );

        Ok(Queue {
            buffer: slots.into_boxed_slice(),
            mask: capacity - 1,
            read_cursor: CachePadded::new(AtomicUsize::new(0)),
            write_cursor: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Enqueue `item`, spinning (with yields) while the queue is full.
    pub fn write(&self, item: T) {
        loop {
            let pos = self.write_cursor.load(Ordering::Acquire);
            let slot = self.slot(pos);

            if slot.write_state(pos) == SlotState::Ready {
                if self.claim_write(pos) {
                    // SAFETY: the successful claim makes us the only writer of
                    // this slot for this lap, and the `Ready` sequence means
                    // the previous item was already moved out.
                    unsafe { slot.write(item) };
                    slot.publish_written(pos);
                    return;
                }
            } else {
                yield_now();
            }
        }
    }

    /// Like [`write`](Queue::write), but `make` runs only once a slot has
    /// been claimed, building the item directly into it.
    ///
    /// If `make` panics the claimed position is never published, and readers
    /// that reach it wait forever.
    pub fn write_with(&self, make: impl FnOnce() -> T) {
        loop {
            let pos = self.write_cursor.load(Ordering::Acquire);
            let slot = self.slot(pos);

            if slot.write_state(pos) == SlotState::Ready {
                if self.claim_write(pos) {
                    // SAFETY: as in `write`.
                    unsafe { slot.write(make()) };
                    slot.publish_written(pos);
                    return;
                }
            } else {
                yield_now();
            }
        }
    }

    /// Dequeue the oldest claimed item, spinning (with yields) while empty.
    pub fn read(&self) -> T {
        loop {
            let pos = self.read_cursor.load(Ordering::Acquire);
            let slot = self.slot(pos);

            if slot.read_state(pos) == SlotState::Ready {
                if self.claim_read(pos) {
                    // SAFETY: the claim makes us the only reader of this
                    // published slot.
                    let item = unsafe { slot.take() };
                    slot.publish_consumed(pos, self.capacity());
                    return item;
                }
            } else {
                yield_now();
            }
        }
    }

    /// Enqueue without waiting.
    ///
    /// Fails with [`TryWriteError::Full`] when the slot at the write cursor
    /// still holds an unconsumed item. Losing a claim race to another
    /// producer is not a failure; the next position is tried instead.
    pub fn try_write(&self, item: T) -> Result<(), TryWriteError<T>> {
        loop {
            let pos = self.write_cursor.load(Ordering::Acquire);
            let slot = self.slot(pos);

            match slot.write_state(pos) {
                SlotState::Ready => {
                    if self.claim_write(pos) {
                        // SAFETY: as in `write`.
                        unsafe { slot.write(item) };
                        slot.publish_written(pos);
                        return Ok(());
                    }
                }
                SlotState::Pending => return Err(TryWriteError::Full(item)),
                SlotState::Stale => {}
            }
        }
    }

    /// Dequeue without waiting.
    ///
    /// Fails with [`TryReadError::Empty`] when nothing has been published at
    /// the read cursor. A position claimed by a producer but not yet
    /// published also counts as empty.
    pub fn try_read(&self) -> Result<T, TryReadError> {
        loop {
            let pos = self.read_cursor.load(Ordering::Acquire);
            let slot = self.slot(pos);

            match slot.read_state(pos) {
                SlotState::Ready => {
                    if self.claim_read(pos) {
                        // SAFETY: as in `read`.
                        let item = unsafe { slot.take() };
                        slot.publish_consumed(pos, self.capacity());
                        return Ok(item);
                    }
                }
                SlotState::Pending => return Err(TryReadError::Empty),
                SlotState::Stale => {}
            }
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Snapshot of claimed-but-unread positions.
    ///
    /// Exact when no other thread is operating on the queue; otherwise only
    /// an estimate, never above [`capacity`](Queue::capacity).
    pub fn len(&self) -> usize {
        let read = self.read_cursor.load(Ordering::Acquire);
        let write = self.write_cursor.load(Ordering::Acquire);
        write.wrapping_sub(read).min(self.capacity())
    }

    /// Whether [`len`](Queue::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`len`](Queue::len) equals the capacity.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    #[inline]
    fn slot(&self, pos: usize) -> &Slot<T> {
        &self.buffer[pos & self.mask]
    }

    // A failed CAS carries no ordering: callers reload the cursor anyway.
    #[inline]
    fn claim_write(&self, pos: usize) -> bool {
        self.write_cursor
            .compare_exchange_weak(
                pos,
                pos.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    #[inline]
    fn claim_read(&self, pos: usize) -> bool {
        self.read_cursor
            .compare_exchange_weak(
                pos,
                pos.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}

// SAFETY: slot contents are only touched by the thread that won the claim
// for that lap, and the sequence handoff orders the accesses.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("capacity", &self.capacity())
            .field("read", &self.read_cursor.load(Ordering::Relaxed))
            .field("write", &self.write_cursor.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        let start = self.read_cursor.load(Ordering::Relaxed);
        let end = self.write_cursor.load(Ordering::Relaxed);
        let pending = end.wrapping_sub(start);

        if mem::needs_drop::<T>() {
            for offset in 0..pending {
                // SAFETY: `&mut self` rules out in-flight claims, so every
                // position in `[read, write)` holds a published item.
                unsafe { self.slot(start.wrapping_add(offset)).drop_in_place() };
            }
        }

        trace::trace!(pending, "dropped queue");
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn smoke() {
        let q = Queue::new(8);
        q.write(42);
        assert_eq!(q.read(), 42);
    }

    #[test]
    fn capacity_one() {
        let q = Queue::new(1);
        for i in 0..5 {
            q.write(i);
            assert!(q.is_full());
            assert_eq!(q.try_write(99), Err(TryWriteError::Full(99)));
            assert_eq!(q.read(), i);
        }
    }

    #[test]
    fn try_write_try_read() {
        let q = Queue::new(4);
        assert_eq!(q.try_read(), Err(TryReadError::Empty));
        for i in 0..4 {
            assert!(q.try_write(i).is_ok());
        }
        assert_eq!(q.try_write(99).map_err(TryWriteError::into_inner), Err(99));
        for i in 0..4 {
            assert_eq!(q.try_read(), Ok(i));
        }
        assert_eq!(q.try_read(), Err(TryReadError::Empty));
    }

    #[test]
    fn len_tracks_cursors() {
        let q = Queue::new(4);
        assert!(q.is_empty());
        q.write('a');
        q.write('b');
        assert_eq!(q.len(), 2);
        q.read();
        assert_eq!(q.len(), 1);
        assert!(!q.is_full());
    }

    #[test]
    fn cursors_wrap_past_usize_max() {
        let start = usize::MAX - 5;
        let mask = 3;
        // Every slot set up as writable for its first position at or after `start`.
        let buffer = (0..4usize)
            .map(|i| Slot::new(start.wrapping_add(i.wrapping_sub(start) & mask)))
            .collect();
        let q = Queue::<usize> {
            buffer,
            mask,
            read_cursor: CachePadded::new(AtomicUsize::new(start)),
            write_cursor: CachePadded::new(AtomicUsize::new(start)),
        };

        for i in 0..12 {
            q.write(i);
            assert_eq!(q.read(), i);
        }
        for i in 0..3 {
            q.write(i);
        }
        assert_eq!(q.len(), 3);
        for i in 0..3 {
            assert_eq!(q.read(), i);
        }
    }

    #[test]
    fn try_new_reports_overflowing_allocation() {
        let capacity = 1usize << (usize::BITS - 2);
        let err = Queue::<u8>::try_new(capacity).unwrap_err();
        assert_eq!(err, AllocError { capacity });
    }

    #[test]
    fn debug_hides_items() {
        let q = Queue::new(2);
        q.write("secret");
        let out = format!("{q:?}");
        assert!(out.contains("capacity: 2"));
        assert!(out.contains("read: 0"));
        assert!(out.contains("write: 1"));
        assert!(!out.contains("secret"));
    }

    #[test]
    fn reader_waits_for_earlier_unpublished_claim() {
        let q = Queue::new(4);
        // Hold position 0 claimed but unpublished.
        while !q.claim_write(0) {}
        q.write(7);

        assert_eq!(q.len(), 2);
        assert_eq!(q.try_read(), Err(TryReadError::Empty));

        let slot = q.slot(0);
        // SAFETY: position 0 was claimed above and never written.
        unsafe { slot.write(5) };
        slot.publish_written(0);

        assert_eq!(q.try_read(), Ok(5));
        assert_eq!(q.try_read(), Ok(7));
        assert_eq!(q.try_read(), Err(TryReadError::Empty));
    }

    #[test]
    fn write_with_builds_after_claim() {
        let q = Queue::new(2);
        q.write(String::from("a"));
        q.write_with(|| {
            // Construction happens once the slot is ours, so the cursor has
            // already moved past it.
            assert_eq!(q.len(), 2);
            String::from("b")
        });
        assert_eq!(q.read(), "a");
        assert_eq!(q.read(), "b");
    }

    #[test]
    fn write_with_waits_when_full() {
        let q = Arc::new(Queue::new(1));
        q.write(1u32);
        let producer = {
            let q = q.clone();
            thread::spawn(move || q.write_with(|| 2))
        };
        assert_eq!(q.read(), 1);
        producer.join().unwrap();
        assert_eq!(q.read(), 2);
    }

    #[test]
    fn threaded_handoff() {
        let q = Arc::new(Queue::new(2));
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                for i in 0..1000u32 {
                    q.write(i);
                }
            })
        };
        for i in 0..1000u32 {
            assert_eq!(q.read(), i);
        }
        producer.join().unwrap();
    }
}
