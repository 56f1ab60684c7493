//! Lock-free containers built on [`vigil`] hazard-pointer reclamation.
//!
//! Two unbounded structures, each the reference client for one half of the
//! hazard-pointer contract:
//!
//! - [`Stack`] — a Treiber LIFO stack; single hazard per `pop`.
//! - [`Queue`] — a Michael–Scott FIFO queue; two hazards per `dequeue`,
//!   helping on a lagging tail.
//!
//! Both are infallible on their success paths: emptiness is `None`, never
//! an error. Each container type owns a tagged hazard domain, so stack and
//! queue reclamation traffic never interferes.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use vigil_collections::Queue;
//!
//! let queue = Arc::new(Queue::new());
//!
//! let producer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for i in 0..100 {
//!             queue.enqueue(i);
//!         }
//!     })
//! };
//!
//! producer.join().unwrap();
//! assert_eq!(queue.dequeue(), Some(0));
//! ```

#![warn(missing_docs)]

mod queue;
mod stack;

pub use queue::Queue;
pub use stack::Stack;
