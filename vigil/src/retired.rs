//! Retired-pointer entries and orphan batches.
//!
//! A `Retired` pairs a type-erased pointer with the dropper that knows how
//! to give the allocation back. Entries live on the retiring thread's local
//! list until a scan proves no cell publishes their address; a thread that
//! exits first hands its leftovers to the domain as an `OrphanBatch`.

use core::ptr;

/// Type-erased deallocation function, set at `retire()` time.
pub(crate) type DropFn = unsafe fn(*mut ());

/// A pointer the owning thread has unlinked from its structure and queued
/// for deallocation.
pub(crate) struct Retired {
    ptr: *mut (),
    dropper: DropFn,
}

impl Retired {
    /// Wrap a node pointer for deferred deallocation.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::into_raw` and must not be retired twice.
    pub(crate) unsafe fn new<T: 'static>(ptr: *mut T) -> Self {
        unsafe fn dropper<T>(ptr: *mut ()) {
            // SAFETY: `ptr` was produced by `Box::into_raw::<T>` and the
            // scan proved no cell publishes it.
            unsafe { drop(Box::from_raw(ptr as *mut T)) }
        }
        Self {
            ptr: ptr as *mut (),
            dropper: dropper::<T>,
        }
    }

    /// The address compared against cell snapshots.
    #[inline]
    pub(crate) fn address(&self) -> usize {
        self.ptr as usize
    }

    /// Deallocate the pointee. Consumes the entry, so each retired pointer
    /// reaches the allocator at most once.
    ///
    /// # Safety
    ///
    /// No protection cell of the owning domain may publish this address.
    pub(crate) unsafe fn reclaim(self) {
        // SAFETY: forwarded to the dropper created in `new`.
        unsafe { (self.dropper)(self.ptr) }
    }
}

// SAFETY: a `Retired` is an owned, unreachable allocation plus a free
// function; it crosses threads only when its owner has already given it up
// (orphan hand-off), after which exactly one thread reclaims it.
unsafe impl Send for Retired {}

/// Retire-list remainder published by an exiting thread, adopted wholesale
/// by the next scan on any thread.
pub(crate) struct OrphanBatch {
    pub(crate) entries: Vec<Retired>,
    pub(crate) next: *mut OrphanBatch,
}

impl OrphanBatch {
    pub(crate) fn new(entries: Vec<Retired>) -> Box<Self> {
        Box::new(Self {
            entries,
            next: ptr::null_mut(),
        })
    }
}

// SAFETY: see `Retired`; the `next` link is only written before the batch
// is published and only read after it is unpublished.
unsafe impl Send for OrphanBatch {}
