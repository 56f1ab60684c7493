//! The hazard handle: a scoped owner of one protection cell.
//!
//! A handle leases exactly one cell of one domain for its lifetime. While
//! the handle lives the cell is never `null`; it holds either the reserved
//! sentinel (protecting nothing) or a published node address. Dropping the
//! handle stores `null`, returning the cell to the free pool.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::Backoff;

use crate::domain::{reserved, Domain, Global, DEFAULT_CELLS};

/// A scoped owner of one protection cell.
///
/// Move-only: cell ownership travels with the value, and the borrow checker
/// rules out use of the source after a move. The handle may be dropped on a
/// different thread than it was made on.
///
/// Publication protocol per cell:
///
/// - `FREE (null)` → `RESERVED (sentinel)` on capture (CAS)
/// - `RESERVED` ↔ `PROTECTING (addr)` via [`protect`](Self::protect) /
///   [`reset_protection`](Self::reset_protection)
/// - any → `FREE` on drop
pub struct HazardPointer<F: 'static = Global, const N: usize = DEFAULT_CELLS> {
    cell: &'static AtomicPtr<()>,
    _domain: PhantomData<fn() -> F>,
}

impl HazardPointer {
    /// Capture a cell of the process-wide shared domain.
    ///
    /// # Panics
    ///
    /// Panics when all of the domain's cells are already captured.
    #[inline]
    pub fn make() -> Self {
        Self::make_in(Domain::global())
    }
}

impl<F: 'static, const N: usize> HazardPointer<F, N> {
    /// Capture a cell of a tagged domain.
    ///
    /// # Panics
    ///
    /// Panics when all of the domain's cells are already captured.
    #[inline]
    pub fn make_in(domain: &'static Domain<F, N>) -> Self {
        Self {
            cell: domain.capture_cell(),
            _domain: PhantomData,
        }
    }

    /// Protect the pointer currently stored in `src` and return it.
    ///
    /// Publishes candidate values until a publication is confirmed stable:
    /// the returned pointer was observed in `src` *while* the cell already
    /// held it, so a concurrent retirer either sees the protection in its
    /// scan or retired the pointer only after it left `src`.
    ///
    /// Loops under contention; lock-free, not wait-free.
    pub fn protect<T>(&mut self, src: &AtomicPtr<T>) -> *mut T {
        let backoff = Backoff::new();
        let mut candidate = src.load(Ordering::Relaxed);
        while !self.try_protect(&mut candidate, src) {
            backoff.spin();
        }
        candidate
    }

    /// Single-shot protect for callers that already hold a candidate.
    ///
    /// Publishes `*candidate` and re-reads `src`. Returns `true` if the
    /// source still held the candidate (the protection is now stable).
    /// Otherwise updates `*candidate` to the fresh value, resets the cell,
    /// and returns `false`.
    pub fn try_protect<T>(&mut self, candidate: &mut *mut T, src: &AtomicPtr<T>) -> bool {
        self.publish(*candidate as *mut ());
        // SeqCst so the validation read cannot drift above the publication
        // store; a plain acquire load would leave the classic store-load
        // window against a concurrent scan.
        let current = src.load(Ordering::SeqCst);
        if current == *candidate {
            true
        } else {
            *candidate = current;
            self.reset_protection();
            false
        }
    }

    /// Publish a pointer the caller already knows to be protected or
    /// otherwise valid. Null degrades to [`reset_protection`](Self::reset_protection).
    #[inline]
    pub fn protect_raw<T>(&mut self, ptr: *mut T) {
        self.publish(ptr as *mut ());
    }

    /// Stop protecting. The cell returns to the reserved state and the
    /// handle keeps its lease. Idempotent.
    #[inline]
    pub fn reset_protection(&mut self) {
        self.cell.store(reserved(), Ordering::Release);
    }

    /// Whether the cell currently publishes no real address.
    #[inline]
    pub fn empty(&self) -> bool {
        let value = self.cell.load(Ordering::Relaxed);
        value.is_null() || value == reserved()
    }

    #[inline]
    fn publish(&self, ptr: *mut ()) {
        if ptr.is_null() {
            // Publishing literal null would mark the cell free and let a
            // concurrent capture steal it; an empty protection is the
            // sentinel instead.
            self.cell.store(reserved(), Ordering::Release);
        } else {
            // SeqCst pairs with the fence in the scan snapshot: the
            // publication cannot be reordered after the acquire re-read
            // that validates it, so a retirer's scan either sees this
            // store or the retirement happened after the pointer left the
            // source.
            self.cell.store(ptr, Ordering::SeqCst);
        }
    }
}

impl<F: 'static, const N: usize> Drop for HazardPointer<F, N> {
    fn drop(&mut self) {
        // Release the lease: FREE means the next capture CAS can take it.
        self.cell.store(core::ptr::null_mut(), Ordering::Release);
    }
}
