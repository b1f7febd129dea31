//! ## mellanlager-core::alloc::allocator
//! **Untyped and prototype-copy allocators over freelists**
//!
//! Three layers, each a thin step over the last:
//! - `Allocator`: untyped acquire/release at a fixed element size
//! - `ClassAllocator<T>`: typed allocation by copying a prototype value
//!   instead of running a constructor
//! - `SparseClassAllocator<T>`: like `ClassAllocator`, but an optional
//!   instantiation routine initializes only the fields that must not
//!   retain stale content from a previous use

use std::mem::MaybeUninit;
use std::ptr::NonNull;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::freelist::{round16, FreeList};
use super::stats::PoolStatsSnapshot;

/// Blocks obtained per growth step when the caller does not say otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 128;
/// Default alignment for untyped block allocators.
pub const DEFAULT_BLOCK_ALIGNMENT: usize = 8;
/// Default alignment for object allocators.
pub const DEFAULT_CLASS_ALIGNMENT: usize = 16;

/// Allocator for fixed-size memory blocks.
pub struct Allocator {
    fl: FreeList,
}

impl Allocator {
    /// Creates an allocator with default chunk size and alignment.
    ///
    /// `name` is a diagnostic tag used only for memory tracking.
    pub fn new(name: &'static str, element_size: usize) -> Self {
        Self::with_config(
            name,
            element_size,
            DEFAULT_CHUNK_SIZE,
            DEFAULT_BLOCK_ALIGNMENT,
        )
    }

    /// Creates an allocator with explicit chunk size and alignment.
    ///
    /// # Panics
    /// If `alignment` is not a power of two, or `chunk_size`/`element_size`
    /// is zero (configuration errors).
    pub fn with_config(
        name: &'static str,
        element_size: usize,
        chunk_size: usize,
        alignment: usize,
    ) -> Self {
        Self {
            fl: FreeList::new(name, element_size, chunk_size, alignment),
        }
    }

    /// Allocates one block of the size fixed at construction.
    #[inline]
    pub fn alloc_void(&self) -> NonNull<u8> {
        self.fl.acquire()
    }

    /// Returns a block to the pool.
    ///
    /// # Safety
    /// `ptr` must have come from `alloc_void` on this allocator and must
    /// not be used after this call.
    #[inline]
    pub unsafe fn free_void(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded caller contract.
        unsafe { self.fl.release(ptr) }
    }

    /// Re-configures the allocator in place.
    ///
    /// Not safe to call while allocations are outstanding: blocks issued
    /// by the previous freelist cannot be returned to the new one.
    pub fn re_init(
        &mut self,
        name: &'static str,
        element_size: usize,
        chunk_size: usize,
        alignment: usize,
    ) {
        self.fl = FreeList::new(name, element_size, chunk_size, alignment);
    }

    pub fn name(&self) -> &'static str {
        self.fl.name()
    }

    pub fn element_size(&self) -> usize {
        self.fl.element_size()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.fl.stats().snapshot()
    }
}

/// Owning handle to a pool-allocated object.
///
/// Not `Clone`: a `PoolPtr` is the only live reference to its block.
/// Dropping it without returning it to its allocator leaks the block (it
/// is simply never reissued); returning it to a different allocator is
/// undefined behavior, undetected at this layer.
pub struct PoolPtr<T> {
    ptr: NonNull<T>,
}

// SAFETY: a PoolPtr is an exclusive owner of its block, like Box<T>.
unsafe impl<T: Send> Send for PoolPtr<T> {}
unsafe impl<T: Sync> Sync for PoolPtr<T> {}

impl<T> PoolPtr<T> {
    fn new(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> std::ops::Deref for PoolPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the block was fully initialized at allocation and stays
        // exclusively owned until freed.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> std::ops::DerefMut for PoolPtr<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, plus &mut self guarantees uniqueness.
        unsafe { self.ptr.as_mut() }
    }
}

/// Allocator for objects of one type, initialized by prototype copy.
///
/// A prototype instance is default-constructed once, when the allocator
/// is created. Allocation clones the prototype's current value into a
/// freshly acquired block instead of running a constructor. Mutating the
/// prototype afterwards changes the initial state of every subsequently
/// allocated object; that is a deliberate process-wide configuration
/// knob, not an accident.
pub struct ClassAllocator<T: Clone + Default> {
    raw: Allocator,
    proto: RwLock<T>,
}

impl<T: Clone + Default> ClassAllocator<T> {
    pub fn new(name: &'static str) -> Self {
        Self::with_config(name, DEFAULT_CHUNK_SIZE, DEFAULT_CLASS_ALIGNMENT)
    }

    /// # Panics
    /// If `alignment` (after rounding up to 16) is not a power of two, or
    /// `chunk_size` is zero.
    pub fn with_config(
        name: &'static str,
        chunk_size: usize,
        alignment: usize,
    ) -> Self {
        let element_size = round16(std::mem::size_of::<T>().max(1));
        let alignment = round16(alignment).max(std::mem::align_of::<T>());
        Self {
            raw: Allocator::with_config(name, element_size, chunk_size, alignment),
            proto: RwLock::new(T::default()),
        }
    }

    /// Allocates an object carrying a copy of the prototype's current value.
    pub fn alloc(&self) -> PoolPtr<T> {
        let block = self.raw.alloc_void().cast::<T>();
        let value = self.proto.read().clone();
        // SAFETY: the block holds at least size_of::<T>() writable bytes
        // at sufficient alignment; stale content is overwritten whole.
        unsafe { block.as_ptr().write(value) };
        PoolPtr::new(block)
    }

    /// Returns an object's block to the pool. The value is dropped in
    /// place; the memory is retained for reuse.
    pub fn free(&self, obj: PoolPtr<T>) {
        // SAFETY: obj owns an initialized block issued by this allocator;
        // consuming it ends all access.
        unsafe {
            std::ptr::drop_in_place(obj.ptr.as_ptr());
            self.raw.free_void(obj.ptr.cast());
        }
    }

    /// Untyped allocation via the same pool.
    pub fn alloc_void(&self) -> NonNull<u8> {
        self.alloc().ptr.cast()
    }

    /// Untyped free via the same pool.
    ///
    /// # Safety
    /// `ptr` must have come from `alloc_void`/`alloc` on this allocator
    /// and must not be used after this call.
    pub unsafe fn free_void(&self, ptr: NonNull<u8>) {
        self.free(PoolPtr::new(ptr.cast()));
    }

    /// Read access to the prototype.
    pub fn prototype(&self) -> RwLockReadGuard<'_, T> {
        self.proto.read()
    }

    /// Write access to the prototype: the process-wide knob that changes
    /// the initial state of all objects allocated from here on.
    pub fn prototype_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.proto.write()
    }

    pub fn name(&self) -> &'static str {
        self.raw.name()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.raw.stats()
    }
}

/// Instantiation routine for `SparseClassAllocator`: selectively
/// initializes fields of `instance` from `proto`. Must leave `instance`
/// fully valid as a `T`; fields it skips retain whatever bytes the block
/// held before.
pub type InstantiateFn<T> = fn(proto: &T, instance: &mut MaybeUninit<T>);

/// Allocator for sparsely-used objects.
///
/// Instead of copying the whole prototype, an optional instantiation
/// routine initializes only the fields that must not carry stale content
/// from a previous use. With no routine supplied, behavior equals
/// `ClassAllocator`.
pub struct SparseClassAllocator<T: Clone + Default> {
    inner: ClassAllocator<T>,
    instantiate: Option<InstantiateFn<T>>,
}

impl<T: Clone + Default> SparseClassAllocator<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: ClassAllocator::new(name),
            instantiate: None,
        }
    }

    /// Creates a sparse allocator with an instantiation routine.
    ///
    /// # Safety
    /// `instantiate` must leave its `instance` argument fully initialized
    /// as a valid `T` regardless of the block's prior content. Note that
    /// the pool overwrites the leading pointer-sized bytes of a freed
    /// block for its own bookkeeping, so no field may rely on surviving
    /// there.
    pub unsafe fn with_instantiate(
        name: &'static str,
        chunk_size: usize,
        alignment: usize,
        instantiate: InstantiateFn<T>,
    ) -> Self {
        Self {
            inner: ClassAllocator::with_config(name, chunk_size, alignment),
            instantiate: Some(instantiate),
        }
    }

    /// Allocates an object, initialized either by the instantiation
    /// routine or by a full prototype copy.
    pub fn alloc(&self) -> PoolPtr<T> {
        match self.instantiate {
            Some(init) => {
                let block = self.inner.raw.alloc_void().cast::<T>();
                let proto = self.inner.proto.read();
                // SAFETY: the block holds enough aligned writable bytes
                // for a T; the routine's contract makes it fully valid.
                let slot = unsafe {
                    &mut *(block.as_ptr() as *mut MaybeUninit<T>)
                };
                init(&proto, slot);
                PoolPtr::new(block)
            }
            None => self.inner.alloc(),
        }
    }

    /// See [`ClassAllocator::free`].
    pub fn free(&self, obj: PoolPtr<T>) {
        self.inner.free(obj);
    }

    /// See [`ClassAllocator::prototype_mut`].
    pub fn prototype_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.prototype_mut()
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.inner.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default, Debug, PartialEq, Eq)]
    struct ConnState {
        id: u64,
        retries: u32,
        keepalive: bool,
    }

    #[test]
    fn alloc_void_blocks_are_distinct_and_reusable() {
        let a = Allocator::with_config("test.raw", 64, 4, 8);
        let b1 = a.alloc_void();
        let b2 = a.alloc_void();
        assert_ne!(b1.as_ptr(), b2.as_ptr());

        unsafe {
            a.free_void(b1);
            a.free_void(b2);
        }
        assert_eq!(a.stats().outstanding(), 0);
    }

    #[test]
    fn re_init_changes_element_size() {
        let mut a = Allocator::new("test.reinit", 64);
        assert_eq!(a.element_size(), 64);
        a.re_init("test.reinit", 256, 16, 16);
        assert_eq!(a.element_size(), 256);
        let b = a.alloc_void();
        unsafe { a.free_void(b) };
    }

    #[test]
    fn class_alloc_copies_default_prototype() {
        let ca: ClassAllocator<ConnState> = ClassAllocator::new("test.conn");
        let obj = ca.alloc();
        assert_eq!(*obj, ConnState::default());
        ca.free(obj);
    }

    #[test]
    fn prototype_mutation_changes_later_allocations() {
        let ca: ClassAllocator<ConnState> = ClassAllocator::new("test.proto");
        let before = ca.alloc();
        assert_eq!(before.retries, 0);

        ca.prototype_mut().retries = 3;

        let after = ca.alloc();
        assert_eq!(after.retries, 3);
        assert_eq!(before.retries, 0);

        ca.free(before);
        ca.free(after);
    }

    #[test]
    fn class_alloc_overwrites_stale_content() {
        let ca: ClassAllocator<ConnState> = ClassAllocator::with_config("test.stale", 1, 16);
        let mut obj = ca.alloc();
        obj.id = 0xdead_beef;
        obj.retries = 99;
        ca.free(obj);

        // chunk_size 1 forces reuse of the same block.
        let fresh = ca.alloc();
        assert_eq!(*fresh, ConnState::default());
        ca.free(fresh);
    }

    // The pool's free-stack link clobbers the leading bytes of a freed
    // block, so the sparse field layout keeps the reinitialized field
    // first and the sparse payload after it.
    #[repr(C)]
    #[derive(Clone, Debug)]
    struct SparseSlot {
        serial: u64,
        scratch: [u8; 8],
    }

    impl Default for SparseSlot {
        fn default() -> Self {
            Self {
                serial: 7,
                scratch: [0; 8],
            }
        }
    }

    fn init_slot(proto: &SparseSlot, instance: &mut MaybeUninit<SparseSlot>) {
        let p = instance.as_mut_ptr();
        // SAFETY: writing one field of a block owned by the caller; the
        // scratch field is deliberately left as-is (any byte pattern is a
        // valid [u8; 8]).
        unsafe { std::ptr::addr_of_mut!((*p).serial).write(proto.serial) };
    }

    #[test]
    fn sparse_instantiate_touches_only_named_fields() {
        // SAFETY: init_slot writes serial and leaves scratch, which is
        // valid for any bytes.
        let sa: SparseClassAllocator<SparseSlot> = unsafe {
            SparseClassAllocator::with_instantiate("test.sparse", 1, 16, init_slot)
        };

        let mut first = sa.alloc();
        assert_eq!(first.serial, 7);
        first.scratch = [0xAB; 8];
        sa.free(first);

        // Same block comes back (chunk_size 1): serial is reinitialized
        // from the prototype, scratch retains the previous use's bytes.
        let second = sa.alloc();
        assert_eq!(second.serial, 7);
        assert_eq!(second.scratch, [0xAB; 8]);
        sa.free(second);
    }

    #[test]
    fn sparse_without_routine_equals_class_allocator() {
        let sa: SparseClassAllocator<ConnState> = SparseClassAllocator::new("test.dense");
        sa.prototype_mut().id = 42;
        let obj = sa.alloc();
        assert_eq!(obj.id, 42);
        assert_eq!(obj.retries, 0);
        sa.free(obj);
    }
}
