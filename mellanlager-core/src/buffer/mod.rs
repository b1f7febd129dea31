//! ## mellanlager-core::buffer
//! **Power-of-two I/O buffer size classes**
//!
//! All I/O buffer memory comes from a fixed table of power-of-two size
//! classes, each backed by its own block allocator. The table is clamped
//! once at bootstrap from the configured maximum buffer size and is
//! read-only afterwards; the resulting [`BufferPool`] is the explicit
//! context object handed to every consumer (no process globals).

use std::ptr::NonNull;

use tracing::warn;

use crate::alloc::allocator::Allocator;

/// Number of entries in the size-class table.
pub const BUFFER_SIZE_CLASSES: usize = 15;

/// Smallest supported buffer size in bytes. Class `i` holds buffers of
/// `BASE_BUFFER_SIZE << i` bytes, up to 2 MiB at the last index.
pub const BASE_BUFFER_SIZE: usize = 128;

/// Default "small" buffer preset: 512 bytes.
pub const DEFAULT_SMALL_BUFFER_INDEX: usize = 2;

/// Default "large" buffer preset: 4 KiB.
pub const DEFAULT_LARGE_BUFFER_INDEX: usize = 5;

/// Fallback for `io.max_buffer_size` when configuration is absent.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 32 * 1024;

/// Buffer size in bytes for a table index.
#[inline]
pub const fn buffer_size_for_index(index: usize) -> usize {
    BASE_BUFFER_SIZE << index
}

/// Largest class index whose size does not exceed `bytes`, clamped to
/// `max_index`. Sizes below the smallest class map to index 0.
pub fn size_to_index(bytes: usize, max_index: usize) -> usize {
    let max_index = max_index.min(BUFFER_SIZE_CLASSES - 1);
    let mut index = 0;
    while index < max_index && buffer_size_for_index(index + 1) <= bytes {
        index += 1;
    }
    index
}

/// Smallest class index whose size fits a request of `bytes`, clamped to
/// `max_index`. Oversized requests are served from the largest usable
/// class (the configured clamp is a policy, not an error).
pub fn index_for_request(bytes: usize, max_index: usize) -> usize {
    let max_index = max_index.min(BUFFER_SIZE_CLASSES - 1);
    let mut index = 0;
    while index < max_index && buffer_size_for_index(index) < bytes {
        index += 1;
    }
    index
}

/// The per-class allocators and clamped defaults, built once at bootstrap.
///
/// Write-once, read-only thereafter; share via `Arc`. Chunk sizes scale
/// down with the class size so one growth step stays near 64 KiB of
/// buffer memory for every class.
pub struct BufferPool {
    allocators: Vec<Allocator>,
    max_index: usize,
    small_index: usize,
    large_index: usize,
}

/// Diagnostic tags for the per-class allocators, indexed by class.
static CLASS_NAMES: [&str; BUFFER_SIZE_CLASSES] = [
    "iobuf.128",
    "iobuf.256",
    "iobuf.512",
    "iobuf.1k",
    "iobuf.2k",
    "iobuf.4k",
    "iobuf.8k",
    "iobuf.16k",
    "iobuf.32k",
    "iobuf.64k",
    "iobuf.128k",
    "iobuf.256k",
    "iobuf.512k",
    "iobuf.1m",
    "iobuf.2m",
];

impl BufferPool {
    /// Builds the pool for a configured maximum buffer size.
    ///
    /// The maximum is converted to the largest class whose size does not
    /// exceed it; the small/large presets are reduced to that clamp when
    /// they fall outside it.
    pub fn new(max_buffer_size: usize) -> Self {
        let max_index = size_to_index(max_buffer_size, BUFFER_SIZE_CLASSES - 1);

        let small_index = DEFAULT_SMALL_BUFFER_INDEX.min(max_index);
        let large_index = DEFAULT_LARGE_BUFFER_INDEX.min(max_index);
        if large_index < DEFAULT_LARGE_BUFFER_INDEX {
            warn!(
                max_buffer_size,
                clamped_to = buffer_size_for_index(max_index),
                "configured io.max_buffer_size clamps the default buffer presets"
            );
        }

        let allocators = (0..=max_index)
            .map(|index| {
                let size = buffer_size_for_index(index);
                let chunk = (64 * 1024 / size).clamp(4, 128);
                Allocator::with_config(CLASS_NAMES[index], size, chunk, 16)
            })
            .collect();

        Self {
            allocators,
            max_index,
            small_index,
            large_index,
        }
    }

    /// Largest usable class index after clamping.
    pub fn max_index(&self) -> usize {
        self.max_index
    }

    /// Clamped "small" preset index.
    pub fn small_index(&self) -> usize {
        self.small_index
    }

    /// Clamped "large" preset index.
    pub fn large_index(&self) -> usize {
        self.large_index
    }

    /// The allocator backing one size class.
    ///
    /// # Panics
    /// If `index` exceeds the clamped maximum.
    pub fn allocator_for_index(&self, index: usize) -> &Allocator {
        &self.allocators[index]
    }

    /// Allocates a buffer big enough for `bytes`, from the smallest class
    /// that fits (clamped to the largest usable class).
    pub fn alloc_bytes(&self, bytes: usize) -> IoBuffer {
        let class = index_for_request(bytes, self.max_index);
        let data = self.allocators[class].alloc_void();
        IoBuffer {
            data,
            class,
            capacity: buffer_size_for_index(class),
            len: 0,
        }
    }

    /// Allocates a buffer of the "small" preset class.
    pub fn alloc_small(&self) -> IoBuffer {
        self.alloc_bytes(buffer_size_for_index(self.small_index))
    }

    /// Allocates a buffer of the "large" preset class.
    pub fn alloc_large(&self) -> IoBuffer {
        self.alloc_bytes(buffer_size_for_index(self.large_index))
    }

    /// Returns a buffer's block to its class allocator.
    pub fn release(&self, buf: IoBuffer) {
        // SAFETY: the buffer's class records which allocator issued its
        // block, and consuming the IoBuffer ends all access to it.
        unsafe { self.allocators[buf.class].free_void(buf.data) };
    }
}

/// One I/O buffer: a class-sized block plus fill bookkeeping.
///
/// Must be returned to the pool that issued it via [`BufferPool::release`];
/// dropping it without releasing leaks the block.
pub struct IoBuffer {
    data: NonNull<u8>,
    class: usize,
    capacity: usize,
    len: usize,
}

// SAFETY: an IoBuffer exclusively owns its block until released.
unsafe impl Send for IoBuffer {}

impl IoBuffer {
    /// Size class index this buffer was carved from.
    pub fn class(&self) -> usize {
        self.class
    }

    /// Usable bytes in this buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends bytes, returning how many fit.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.capacity - self.len);
        // SAFETY: len + n <= capacity and the block is exclusively ours.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.data.as_ptr().add(self.len),
                n,
            );
        }
        self.len += n;
        n
    }

    /// The initialized prefix of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: bytes 0..len were written through `write`.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// Discards the content, keeping the block.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_strictly_increasing_powers_of_two() {
        for i in 1..BUFFER_SIZE_CLASSES {
            let prev = buffer_size_for_index(i - 1);
            let cur = buffer_size_for_index(i);
            assert_eq!(cur, prev * 2);
            assert!(cur.is_power_of_two());
        }
    }

    #[test]
    fn size_to_index_picks_largest_fitting_class() {
        // On a table starting {128, 256, 512, 1024, 2048, 4096, 8192,
        // 16384, ...}, a configured maximum of 8192 lands on index 6.
        assert_eq!(size_to_index(8192, BUFFER_SIZE_CLASSES - 1), 6);
        assert_eq!(size_to_index(8191, BUFFER_SIZE_CLASSES - 1), 5);
        assert_eq!(size_to_index(0, BUFFER_SIZE_CLASSES - 1), 0);
        assert_eq!(size_to_index(usize::MAX, BUFFER_SIZE_CLASSES - 1), 14);
        assert_eq!(size_to_index(usize::MAX, 7), 7);
    }

    #[test]
    fn index_for_request_picks_smallest_fitting_class() {
        assert_eq!(index_for_request(1, 14), 0);
        assert_eq!(index_for_request(128, 14), 0);
        assert_eq!(index_for_request(129, 14), 1);
        assert_eq!(index_for_request(4096, 14), 5);
        // Oversized requests clamp to the largest usable class.
        assert_eq!(index_for_request(1 << 30, 14), 14);
    }

    #[test]
    fn presets_never_exceed_clamp() {
        for max in [128, 256, 1000, 8192, 32768, 1 << 21, usize::MAX >> 1] {
            let pool = BufferPool::new(max);
            assert!(pool.small_index() <= pool.max_index());
            assert!(pool.large_index() <= pool.max_index());
            assert!(buffer_size_for_index(pool.max_index()) <= max.max(BASE_BUFFER_SIZE));
        }
    }

    #[test]
    fn clamp_reduces_large_preset() {
        // max 8192 -> index 6; a large preset referencing index 5 (4 KiB)
        // survives, but clamping below it reduces the preset.
        let pool = BufferPool::new(8192);
        assert_eq!(pool.max_index(), 6);
        assert_eq!(pool.large_index(), DEFAULT_LARGE_BUFFER_INDEX);

        let tight = BufferPool::new(512);
        assert_eq!(tight.max_index(), 2);
        assert_eq!(tight.large_index(), 2);
        assert_eq!(tight.small_index(), 2);
    }

    #[test]
    fn buffers_round_trip_through_their_class() {
        let pool = BufferPool::new(DEFAULT_MAX_BUFFER_SIZE);

        let mut buf = pool.alloc_bytes(300);
        assert_eq!(buf.class(), 2);
        assert_eq!(buf.capacity(), 512);

        let wrote = buf.write(b"hello mellanlager");
        assert_eq!(wrote, 17);
        assert_eq!(buf.as_slice(), b"hello mellanlager");

        let class = buf.class();
        pool.release(buf);
        assert_eq!(pool.allocator_for_index(class).stats().outstanding(), 0);
    }

    #[test]
    fn small_and_large_presets_allocate_their_class() {
        let pool = BufferPool::new(DEFAULT_MAX_BUFFER_SIZE);
        let small = pool.alloc_small();
        let large = pool.alloc_large();
        assert_eq!(small.class(), pool.small_index());
        assert_eq!(large.class(), pool.large_index());
        pool.release(small);
        pool.release(large);
    }
}
