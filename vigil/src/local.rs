//! Per-thread retire lists.
//!
//! Each thread keeps one retire list per domain it has retired into,
//! registered in a single `thread_local!` slot and keyed by domain identity.
//! A list is only ever written by its owning thread; scans run against a
//! transient snapshot of the domain's cells, so there is no writer–writer
//! conflict anywhere in the reclamation path.
//!
//! Reclaiming runs client `Drop` code, which may itself call `retire`. Every
//! path here therefore collects reclaimable entries under the `RefCell`
//! borrow and deallocates them only after the borrow ends.
//!
//! On thread exit the registry runs a final scan per list; entries that are
//! still protected are handed to their domain as an orphan batch, which the
//! next scan on any thread adopts. TLS teardown races use the `try_with`
//! fallback throughout, as panicking in a TLS destructor would abort.

use std::cell::RefCell;
use std::mem;

use crate::domain::{DomainCore, THRESHOLD_CAP_FACTOR};
use crate::retired::{OrphanBatch, Retired};

/// One domain's retire list on this thread.
struct DomainList {
    domain: &'static dyn DomainCore,
    entries: Vec<Retired>,
    /// Scan trigger: starts at the domain's cell count, doubles after each
    /// threshold-triggered scan, capped at `THRESHOLD_CAP_FACTOR` times the
    /// cell count.
    threshold: usize,
}

impl DomainList {
    /// Adopt any orphaned lists, snapshot the domain's cells, and move every
    /// entry whose address is unprotected into `pending`. Protected entries
    /// stay queued for the next scan.
    fn collect_unprotected(&mut self, pending: &mut Vec<Retired>) {
        self.adopt_orphans();

        let mut snapshot = Vec::with_capacity(self.domain.cell_count());
        self.domain.snapshot(&mut snapshot);
        snapshot.sort_unstable();

        for entry in mem::take(&mut self.entries) {
            if snapshot.binary_search(&entry.address()).is_ok() {
                self.entries.push(entry);
            } else {
                pending.push(entry);
            }
        }
    }

    fn adopt_orphans(&mut self) {
        let mut head = self.domain.take_orphans();
        while !head.is_null() {
            // SAFETY: `take_orphans` unhooked the chain; this thread is its
            // sole owner now.
            let batch = unsafe { Box::from_raw(head) };
            head = batch.next;
            self.entries.extend(batch.entries);
        }
    }
}

struct LocalLists {
    lists: Vec<DomainList>,
}

impl LocalLists {
    /// Index of the list for `domain`, creating it on first use. The number
    /// of domains a thread touches is small, so a linear probe beats a map.
    fn index_for(&mut self, domain: &'static dyn DomainCore) -> usize {
        let key = domain.key();
        match self.lists.iter().position(|list| list.domain.key() == key) {
            Some(index) => index,
            None => {
                self.lists.push(DomainList {
                    domain,
                    entries: Vec::new(),
                    threshold: domain.cell_count().max(1),
                });
                self.lists.len() - 1
            }
        }
    }
}

impl Drop for LocalLists {
    fn drop(&mut self) {
        for mut list in self.lists.drain(..) {
            let mut pending = Vec::new();
            list.collect_unprotected(&mut pending);
            for entry in pending {
                // SAFETY: absent from the snapshot just taken.
                unsafe { entry.reclaim() };
            }
            if !list.entries.is_empty() {
                // Still-protected leftovers outlive this thread; hand them
                // to the domain for adoption.
                let entries = mem::take(&mut list.entries);
                list.domain.push_orphans(OrphanBatch::new(entries));
            }
        }
    }
}

thread_local! {
    static LISTS: RefCell<LocalLists> = const { RefCell::new(LocalLists { lists: Vec::new() }) };
}

/// Append `entry` to this thread's list for `domain`, scanning when the
/// amortization threshold is crossed.
pub(crate) fn retire(domain: &'static dyn DomainCore, entry: Retired) {
    let mut entry = Some(entry);
    let mut pending = Vec::new();
    let tls = LISTS.try_with(|lists| {
        let mut lists = lists.borrow_mut();
        let index = lists.index_for(domain);
        let list = &mut lists.lists[index];
        if let Some(entry) = entry.take() {
            list.entries.push(entry);
        }
        if list.entries.len() >= list.threshold {
            list.collect_unprotected(&mut pending);
            list.threshold =
                (list.threshold * 2).min(list.domain.cell_count() * THRESHOLD_CAP_FACTOR);
        }
    });
    if tls.is_err() {
        // TLS already torn down: hand the entry straight to the domain so
        // another thread reclaims it.
        if let Some(entry) = entry.take() {
            domain.push_orphans(OrphanBatch::new(vec![entry]));
        }
    }
    for entry in pending {
        // SAFETY: the scan under the borrow proved these unprotected.
        unsafe { entry.reclaim() };
    }
}

/// Forced scan for `domain` on the calling thread; returns the number of
/// entries reclaimed. Leaves the amortization threshold untouched.
pub(crate) fn scan(domain: &'static dyn DomainCore) -> usize {
    let mut pending = Vec::new();
    let _ = LISTS.try_with(|lists| {
        let mut lists = lists.borrow_mut();
        let index = lists.index_for(domain);
        lists.lists[index].collect_unprotected(&mut pending);
    });
    let freed = pending.len();
    for entry in pending {
        // SAFETY: the scan under the borrow proved these unprotected.
        unsafe { entry.reclaim() };
    }
    freed
}

/// Teardown drain for `delete_all`: free this thread's entire list for
/// `domain` plus any orphans, without consulting the cells.
pub(crate) fn drain(domain: &'static dyn DomainCore) {
    let mut pending = Vec::new();
    let _ = LISTS.try_with(|lists| {
        let mut lists = lists.borrow_mut();
        let index = lists.index_for(domain);
        let list = &mut lists.lists[index];
        list.adopt_orphans();
        pending.append(&mut list.entries);
        list.threshold = list.domain.cell_count().max(1);
    });
    for entry in pending {
        // SAFETY: `delete_all` requires quiescence; nothing can publish
        // these addresses.
        unsafe { entry.reclaim() };
    }
}
