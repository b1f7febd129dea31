//! ## mellanlager-core::alloc::freelist
//! **Per-size-class block pool with bulk chunk growth**
//!
//! A `FreeList` hands out fixed-size memory blocks from a singly-linked
//! stack threaded through the free blocks themselves. When the stack is
//! empty it grows by one whole chunk (`chunk_size` blocks) obtained from
//! the system allocator. Chunks are never returned to the system: freed
//! blocks stay on the stack for reuse. This trades peak memory for the
//! absence of allocation-path system calls under bursty demand.

use std::alloc::{alloc, handle_alloc_error, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use super::stats::PoolStats;

/// Round up to the next 16-byte boundary.
pub(crate) const fn round16(n: usize) -> usize {
    (n + 15) & !15
}

/// Minimum block alignment. Every block must also be able to hold the
/// intrusive next pointer while it sits on the free stack.
const MIN_ALIGNMENT: usize = 16;

/// A concurrency-safe pool of fixed-size memory blocks.
///
/// The free stack is guarded by a short-held mutex; callers from any
/// thread may acquire and release without further coordination. No
/// ordering is guaranteed between one thread's release and another's
/// subsequent acquire beyond eventual visibility.
pub struct FreeList {
    name: &'static str,
    element_size: usize,
    alignment: usize,
    chunk_size: usize,
    head: Mutex<*mut u8>,
    stats: PoolStats,
}

// SAFETY: the raw head pointer is only touched under the mutex, and the
// blocks it links are exclusively owned by the list while free.
unsafe impl Send for FreeList {}
unsafe impl Sync for FreeList {}

impl FreeList {
    /// Creates an empty freelist for blocks of `element_size` bytes.
    ///
    /// `element_size` is rounded up to the effective alignment, which is
    /// itself rounded up to at least 16 bytes. Both the alignment and the
    /// chunk size must be sane; violating that is a configuration error.
    ///
    /// # Panics
    /// If `alignment` is not a power of two, or `chunk_size`/`element_size`
    /// is zero.
    pub fn new(
        name: &'static str,
        element_size: usize,
        chunk_size: usize,
        alignment: usize,
    ) -> Self {
        assert!(element_size > 0, "element size must be greater than zero");
        assert!(chunk_size > 0, "chunk size must be greater than zero");
        assert!(
            alignment.is_power_of_two(),
            "alignment must be a power of two"
        );

        let alignment = alignment.max(MIN_ALIGNMENT);
        let element_size = element_size
            .checked_next_multiple_of(alignment)
            .expect("element size overflows alignment rounding");

        Self {
            name,
            element_size,
            alignment,
            chunk_size,
            head: Mutex::new(ptr::null_mut()),
            stats: PoolStats::new(),
        }
    }

    /// Pops a block off the free stack, growing by one chunk if empty.
    ///
    /// The returned block holds `element_size` bytes of uninitialized (or
    /// stale, previously released) content. System allocation failure
    /// during chunk growth aborts the process; the core cannot operate
    /// without memory.
    pub fn acquire(&self) -> NonNull<u8> {
        let mut head = self.head.lock();
        if head.is_null() {
            *head = self.grow();
        }
        let block = *head;
        // SAFETY: a non-null head always points at a free block whose
        // first word is the next free block (or null).
        *head = unsafe { *(block as *mut *mut u8) };
        drop(head);

        self.stats.record_allocation();
        // SAFETY: blocks on the stack are never null.
        unsafe { NonNull::new_unchecked(block) }
    }

    /// Pushes a block back onto the free stack for reuse.
    ///
    /// # Safety
    /// `block` must have been returned by `acquire` on this freelist, and
    /// the caller must not retain any reference into it afterwards.
    pub unsafe fn release(&self, block: NonNull<u8>) {
        let mut head = self.head.lock();
        // SAFETY: the block is ours again; its first word becomes the link.
        unsafe { *(block.as_ptr() as *mut *mut u8) = *head };
        *head = block.as_ptr();
        drop(head);

        self.stats.record_free();
    }

    /// Allocates one chunk from the system and links its blocks into a
    /// local chain, returning the chain head. Called with the head lock
    /// held; the chain is spliced in by the caller.
    fn grow(&self) -> *mut u8 {
        let layout = Layout::from_size_align(
            self.element_size * self.chunk_size,
            self.alignment,
        )
        .expect("chunk layout overflow");

        // SAFETY: layout has non-zero size (both factors checked > 0).
        let base = unsafe { alloc(layout) };
        if base.is_null() {
            handle_alloc_error(layout);
        }

        // SAFETY: base..base+chunk bytes are exclusively ours; thread the
        // free-stack link through the first word of each block.
        unsafe {
            for i in 0..self.chunk_size {
                let block = base.add(i * self.element_size);
                let next = if i + 1 == self.chunk_size {
                    ptr::null_mut()
                } else {
                    base.add((i + 1) * self.element_size)
                };
                *(block as *mut *mut u8) = next;
            }
        }

        self.stats.record_chunk_growth();
        base
    }

    /// Diagnostic tag used for memory tracking; no behavioral effect.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Effective (rounded) block size in bytes.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Blocks obtained per growth step.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks obtained from the system so far. Monotonic.
    pub fn chunks_allocated(&self) -> usize {
        self.stats.chunks.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}
