//! Vigil: hazard-pointer safe memory reclamation for lock-free data
//! structures.
//!
//! Readers publish the address they are about to dereference into a
//! *protection cell*; writers that unlink nodes *retire* them instead of
//! freeing, and an amortized *scan* frees every retired pointer no cell
//! publishes. No locks anywhere, no reader can ever observe freed memory,
//! and the ABA problem on pointers disappears: a protected address cannot be
//! freed, so the allocator cannot reissue it.
//!
//! # Key pieces
//!
//! - [`Domain`] — a fixed array of `N` protection cells plus per-thread
//!   retire lists. `const`-constructible, so tagged statics give each client
//!   structure its own domain.
//! - [`HazardPointer`] — a scoped lease of one cell, offering
//!   `protect` / `try_protect` / `reset_protection`.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicPtr, Ordering};
//! use vigil::{Domain, HazardPointer};
//!
//! let shared = AtomicPtr::new(Box::into_raw(Box::new(42u32)));
//!
//! // Reader: publish the address before dereferencing it.
//! let mut hazard = HazardPointer::make();
//! let ptr = hazard.protect(&shared);
//! assert_eq!(unsafe { *ptr }, 42);
//! hazard.reset_protection();
//!
//! // Writer: swap in a new value, retire the old allocation.
//! let old = shared.swap(Box::into_raw(Box::new(7u32)), Ordering::AcqRel);
//! unsafe { Domain::global().retire(old) };
//!
//! // The old allocation is freed by a later scan, never while protected.
//! Domain::global().eager_reclaim();
//! # drop(hazard);
//! # unsafe { drop(Box::from_raw(shared.load(Ordering::Relaxed))) };
//! ```

#![warn(missing_docs)]

mod domain;
mod hazard;
mod local;
mod retired;

pub use domain::{Domain, Global, DEFAULT_CELLS};
pub use hazard::HazardPointer;

// Re-export for convenience
pub use core::sync::atomic::Ordering;
