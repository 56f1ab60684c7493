//! Hazard domains: protection-cell arrays and the reclamation entry points.
//!
//! A domain owns a fixed array of `N` protection cells. Each cell is one
//! pointer-sized atomic slot, padded to its own cache line, and moves through
//! three values:
//!
//! - `null` — free, available to `capture_cell`
//! - the reserved sentinel — leased to a handle but publishing nothing
//! - any other value — a published (protected) node address
//!
//! Retired pointers accumulate on per-thread lists (see `local`); a scan
//! snapshots the cells and frees every entry whose address is absent. Cell
//! storage itself is never reclaimed — a domain's memory cost is
//! `N × cache_line` for the life of the process.

use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

use crate::local;
use crate::retired::{OrphanBatch, Retired};

/// Default number of protection cells per domain.
pub const DEFAULT_CELLS: usize = 128;

/// Growth cap for the retire-list amortization threshold, as a multiple of
/// the cell count.
pub(crate) const THRESHOLD_CAP_FACTOR: usize = 32;

/// Family marker of the process-wide shared domain.
///
/// Client structures that want reclamation traffic isolated from everyone
/// else declare their own marker type and a `static` domain tagged with it.
pub struct Global;

static GLOBAL_DOMAIN: Domain = Domain::new();

/// The address a cell holds while leased but not publishing: the location of
/// a private static, so it can never collide with a heap node.
#[inline]
pub(crate) fn reserved() -> *mut () {
    static RESERVED: u8 = 0;
    &RESERVED as *const u8 as *mut ()
}

/// A hazard-pointer reclamation domain.
///
/// `F` is the family tag: one `static` domain per family gives a client
/// structure its own cell array and retire traffic. `N` is the hard bound on
/// concurrently held handles; bounded cells keep every scan O(N).
///
/// `new` is a `const fn`, so tagged domains are plain statics:
///
/// ```
/// use vigil::{Domain, HazardPointer};
///
/// struct MyStructure;
/// static DOMAIN: Domain<MyStructure, 64> = Domain::new();
///
/// let hazard = HazardPointer::make_in(&DOMAIN);
/// # drop(hazard);
/// ```
pub struct Domain<F = Global, const N: usize = DEFAULT_CELLS> {
    cells: [CachePadded<AtomicPtr<()>>; N],
    /// Retire-list remainders abandoned by exited threads; adopted by the
    /// next scan on any thread.
    orphans: AtomicPtr<OrphanBatch>,
    _family: PhantomData<fn() -> F>,
}

impl Domain {
    /// The process-wide shared domain (family [`Global`], default cell
    /// count).
    #[inline]
    pub fn global() -> &'static Self {
        &GLOBAL_DOMAIN
    }
}

impl<F: 'static, const N: usize> Domain<F, N> {
    /// Create a domain with all cells free.
    ///
    /// All-null cells are a valid initial state, so statics need no lazy
    /// initialization.
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const FREE: CachePadded<AtomicPtr<()>> = CachePadded::new(AtomicPtr::new(ptr::null_mut()));
        Self {
            cells: [FREE; N],
            orphans: AtomicPtr::new(ptr::null_mut()),
            _family: PhantomData,
        }
    }

    /// Reserve one cell for a handle, transitioning it `null → SENTINEL`.
    ///
    /// Cells are scanned in index order. Exhaustion panics: it is a
    /// configuration mismatch, not a transient condition, and callers
    /// cannot meaningfully recover. Raise `N` at type instantiation if more
    /// than `N` handles must be live at once.
    pub(crate) fn capture_cell(&'static self) -> &'static AtomicPtr<()> {
        match self.try_capture_cell() {
            Some(cell) => cell,
            None => panic!(
                "vigil: all {} protection cells of this domain are captured; \
                 raise the domain's cell count at type instantiation",
                N
            ),
        }
    }

    fn try_capture_cell(&'static self) -> Option<&'static AtomicPtr<()>> {
        for cell in self.cells.iter() {
            if cell
                .compare_exchange(
                    ptr::null_mut(),
                    reserved(),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return Some(&**cell);
            }
        }
        None
    }

    /// Queue `ptr` for deallocation once no cell publishes its address.
    ///
    /// The entry joins the calling thread's retire list for this domain;
    /// crossing the amortization threshold triggers a scan. Retiring a null
    /// pointer is a no-op.
    ///
    /// # Safety
    ///
    /// - `ptr` was produced by `Box::into_raw` and is retired at most once.
    /// - `ptr` is no longer reachable from any root of the client
    ///   structure, so no thread can newly publish it.
    /// - The pointee may be dropped on a different thread if this thread
    ///   exits before reclamation, so it must be safe to send.
    pub unsafe fn retire<T: 'static>(&'static self, ptr: *mut T) {
        if ptr.is_null() {
            return;
        }
        // SAFETY: caller upholds the single-retire contract.
        let entry = unsafe { Retired::new(ptr) };
        local::retire(self, entry);
    }

    /// Run a reclamation scan now, regardless of the threshold.
    ///
    /// Returns the number of entries handed back to the allocator. Entries
    /// whose addresses are still published stay queued for a later scan.
    pub fn eager_reclaim(&'static self) -> usize {
        local::scan(self)
    }

    /// Diagnostic teardown: clear every cell and free the calling thread's
    /// entire retire list for this domain, plus any orphaned lists,
    /// unconditionally.
    ///
    /// # Safety
    ///
    /// No other thread may be using the domain — no live handles, no
    /// concurrent `retire` or scans. Intended for test harness teardown
    /// only; it deliberately skips the protection check.
    pub unsafe fn delete_all(&'static self) {
        for cell in self.cells.iter() {
            cell.store(ptr::null_mut(), Ordering::Release);
        }
        local::drain(self);
    }
}

/// Erased view of a domain used by the thread-local retire machinery, which
/// must work across every `(F, N)` instantiation.
pub(crate) trait DomainCore: Sync {
    /// Identity for keying per-thread retire lists.
    fn key(&self) -> usize;

    /// Cell count; seeds the amortization threshold.
    fn cell_count(&self) -> usize;

    /// Append every published address to `out`.
    fn snapshot(&self, out: &mut Vec<usize>);

    /// Unhook the whole orphan chain for adoption.
    fn take_orphans(&self) -> *mut OrphanBatch;

    /// Publish a leftover batch for adoption by other threads.
    fn push_orphans(&self, batch: Box<OrphanBatch>);
}

impl<F: 'static, const N: usize> DomainCore for Domain<F, N> {
    #[inline]
    fn key(&self) -> usize {
        self.cells.as_ptr() as usize
    }

    #[inline]
    fn cell_count(&self) -> usize {
        N
    }

    fn snapshot(&self, out: &mut Vec<usize>) {
        let reserved = reserved() as usize;
        // Pairs with the SeqCst publication stores in the handle: any
        // protection published before a retirer's fence is visible here.
        core::sync::atomic::fence(Ordering::SeqCst);
        for cell in self.cells.iter() {
            let value = cell.load(Ordering::Acquire) as usize;
            if value != 0 && value != reserved {
                out.push(value);
            }
        }
    }

    fn take_orphans(&self) -> *mut OrphanBatch {
        self.orphans.swap(ptr::null_mut(), Ordering::Acquire)
    }

    fn push_orphans(&self, batch: Box<OrphanBatch>) {
        let batch = Box::into_raw(batch);
        let mut head = self.orphans.load(Ordering::Relaxed);
        loop {
            // SAFETY: `batch` is not yet published; we are its only writer.
            unsafe { (*batch).next = head };
            match self.orphans.compare_exchange_weak(
                head,
                batch,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }
}
