//! Interrupt-safe bounded FIFO linking interrupt producers to task consumers.
//!
//! `RingBuffer<T, N>` stores up to `N - 1` items of `T` (one slot is
//! sacrificed to distinguish full from empty). `N` must be a power of two;
//! index wrap is a mask with `N - 1`.
//!
//! Producers may run in interrupt context (UART/USB/SPI receive handlers,
//! network receivers), so every entry point takes an IRQ-level critical
//! section. The sections are short — bounded by the copy of one `T` per
//! item — which keeps interrupt latency predictable. The consumer side
//! (the Main task) dequeues in bulk under the same lock.
//!
//! Ordering: FIFO per producer; concurrent producers interleave in their
//! critical-section acquisition order. MIDI is self-synchronising through
//! status bytes, so byte-granularity interleaving across sources is
//! acceptable by design.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

struct Inner<T, const N: usize> {
    buf: [MaybeUninit<T>; N],
    /// Index of the next slot to write. Only ever `< N`.
    in_ptr: usize,
    /// Index of the next slot to read. Only ever `< N`.
    out_ptr: usize,
}

/// A fixed-capacity, interrupt-safe FIFO queue.
pub struct RingBuffer<T, const N: usize> {
    inner: UnsafeCell<Inner<T, N>>,
}

// SAFETY: all access to `inner` happens inside a critical section, which
// serialises producers and the consumer across cores and interrupt context.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}
// SAFETY: moving the buffer moves its contents; no external aliases exist.
unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    const MASK: usize = N - 1;
    const POWER_OF_TWO: () = assert!(N.is_power_of_two(), "ring buffer size must be a power of 2");

    /// Create a new, empty ring buffer.
    ///
    /// `const` so buffers can live in `static` storage and be shared with
    /// interrupt handlers registered at boot.
    pub const fn new() -> Self {
        // Force the compile-time power-of-two check to be evaluated.
        #[allow(clippy::let_unit_value)]
        let () = Self::POWER_OF_TWO;

        Self {
            inner: UnsafeCell::new(Inner {
                // SAFETY: an array of MaybeUninit does not require
                // initialisation; slots are written before being read.
                buf: unsafe { MaybeUninit::uninit().assume_init() },
                in_ptr: 0,
                out_ptr: 0,
            }),
        }
    }

    /// Enqueue a single item. Returns `false` (leaving the queue unchanged)
    /// when full.
    pub fn enqueue(&self, item: T) -> bool {
        critical_section::with(|_| {
            // SAFETY: inside the critical section we are the only accessor.
            let inner = unsafe { &mut *self.inner.get() };
            Self::enqueue_one(inner, item)
        })
    }

    /// Enqueue a slice of items; returns how many were accepted before the
    /// queue filled up.
    pub fn enqueue_slice(&self, items: &[T]) -> usize
    where
        T: Copy,
    {
        critical_section::with(|_| {
            // SAFETY: inside the critical section we are the only accessor.
            let inner = unsafe { &mut *self.inner.get() };
            let mut accepted: usize = 0;
            for &item in items {
                if !Self::enqueue_one(inner, item) {
                    break;
                }
                accepted = accepted.saturating_add(1);
            }
            accepted
        })
    }

    /// Dequeue a single item, or `None` when empty.
    pub fn dequeue_one(&self) -> Option<T> {
        critical_section::with(|_| {
            // SAFETY: inside the critical section we are the only accessor.
            let inner = unsafe { &mut *self.inner.get() };
            if inner.in_ptr == inner.out_ptr {
                return None;
            }
            // SAFETY: out_ptr != in_ptr, so this slot holds an initialised
            // item written by a prior enqueue.
            let item = unsafe { inner.buf[inner.out_ptr].assume_init_read() };
            inner.out_ptr = inner.out_ptr.wrapping_add(1) & Self::MASK;
            Some(item)
        })
    }

    /// Drain into `out` until the queue is empty or `out` is full,
    /// whichever comes first. Returns the number of items written.
    pub fn dequeue(&self, out: &mut [T]) -> usize {
        critical_section::with(|_| {
            // SAFETY: inside the critical section we are the only accessor.
            let inner = unsafe { &mut *self.inner.get() };
            let mut count: usize = 0;
            for slot in out.iter_mut() {
                if inner.in_ptr == inner.out_ptr {
                    break;
                }
                // SAFETY: queue non-empty, so this slot is initialised.
                *slot = unsafe { inner.buf[inner.out_ptr].assume_init_read() };
                inner.out_ptr = inner.out_ptr.wrapping_add(1) & Self::MASK;
                count = count.wrapping_add(1);
            }
            count
        })
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        critical_section::with(|_| {
            // SAFETY: inside the critical section we are the only accessor.
            let inner = unsafe { &*self.inner.get() };
            inner.in_ptr.wrapping_sub(inner.out_ptr) & Self::MASK
        })
    }

    /// `true` when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(clippy::indexing_slicing)] // in_ptr < N invariant
    fn enqueue_one(inner: &mut Inner<T, N>, item: T) -> bool {
        let next = inner.in_ptr.wrapping_add(1) & Self::MASK;
        if next == inner.out_ptr {
            return false;
        }
        inner.buf[inner.in_ptr].write(item);
        inner.in_ptr = next;
        true
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
