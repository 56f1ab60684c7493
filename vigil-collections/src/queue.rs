//! Unbounded lock-free FIFO queue (Michael–Scott).

use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::{Backoff, CachePadded};
use vigil::{Domain, HazardPointer};

/// Family tag: all queues share one domain, isolated from other clients.
struct QueueFamily;

static QUEUE_DOMAIN: Domain<QueueFamily> = Domain::new();

struct Node<T> {
    /// Uninitialized on the sentinel; initialized on every enqueued node
    /// until the dequeue that turns it into the new sentinel reads it out.
    value: MaybeUninit<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Self {
        Box::into_raw(Box::new(Self {
            value: MaybeUninit::uninit(),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// An unbounded lock-free FIFO queue.
///
/// Michael–Scott construction: `head` always points at a sentinel node and
/// the queue is empty iff the sentinel's `next` is null. A dequeue unlinks
/// the old sentinel, reads the value out of the new head, and retires the
/// unlinked node through the hazard domain.
///
/// # Example
///
/// ```
/// use vigil_collections::Queue;
///
/// let queue = Queue::new();
/// queue.enqueue(1);
/// queue.enqueue(2);
/// assert_eq!(queue.dequeue(), Some(1));
/// assert_eq!(queue.dequeue(), Some(2));
/// assert_eq!(queue.dequeue(), None);
/// ```
pub struct Queue<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
}

// SAFETY: values move between threads through enqueue/dequeue; nodes are
// freed on whichever thread's scan wins, so `T: Send` is required.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T: 'static> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Queue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let sentinel = Node::<T>::sentinel();
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    /// Appends a value at the tail.
    pub fn enqueue(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value: MaybeUninit::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }));

        let mut hazard = HazardPointer::make_in(&QUEUE_DOMAIN);
        let backoff = Backoff::new();
        loop {
            let tail = hazard.protect(&self.tail);
            // SAFETY: `tail` is protected; dequeuers advance `self.tail`
            // off a node before retiring it, so the link is readable.
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };
            if !next.is_null() {
                // Stale tail: help the slower enqueuer forward, then retry.
                let _ =
                    self.tail
                        .compare_exchange(tail, next, Ordering::SeqCst, Ordering::Relaxed);
                backoff.spin();
                continue;
            }

            // SAFETY: as above; linking is the publication point.
            if unsafe {
                (*tail)
                    .next
                    .compare_exchange(ptr::null_mut(), node, Ordering::Release, Ordering::Relaxed)
                    .is_ok()
            } {
                // Swing the tail to the new node. Failure means another
                // thread already helped.
                let _ =
                    self.tail
                        .compare_exchange(tail, node, Ordering::SeqCst, Ordering::Relaxed);
                return;
            }
            backoff.spin();
        }
    }

    /// Removes the value at the head, or `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let mut hazard_head = HazardPointer::make_in(&QUEUE_DOMAIN);
        let mut hazard_next = HazardPointer::make_in(&QUEUE_DOMAIN);
        let backoff = Backoff::new();
        loop {
            // `head` is never null: there is always a sentinel.
            let head = hazard_head.protect(&self.head);

            // SAFETY: `head` is protected.
            let mut next = unsafe { (*head).next.load(Ordering::Relaxed) };
            if !hazard_next.try_protect(&mut next, unsafe { &(*head).next }) {
                // The link moved; revalidate from the root.
                backoff.spin();
                continue;
            }
            if next.is_null() {
                return None;
            }

            // Keep the tail off the node we are about to unlink: the tail
            // only ever moves forward, so after this CAS (or its failure,
            // which proves the tail already left) the node is unreachable
            // from both roots. Every write to `tail` is SeqCst, so this
            // SeqCst read cannot be stale.
            if self.tail.load(Ordering::SeqCst) == head {
                let _ =
                    self.tail
                        .compare_exchange(head, next, Ordering::SeqCst, Ordering::Relaxed);
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // `next` becomes the new sentinel; its value is read out by
                // exactly this thread, the CAS winner.
                // SAFETY: `next` is protected and was fully initialized by
                // its enqueuer before being linked.
                let value = unsafe { (*next).value.assume_init_read() };
                // SAFETY: unlinked from `head`, and the tail was moved off
                // it above, so it is unreachable from the queue's roots.
                unsafe { QUEUE_DOMAIN.retire(head) };
                return Some(value);
            }
            backoff.spin();
        }
    }

    /// Whether the queue was empty at the instant of the check.
    pub fn is_empty(&self) -> bool {
        let mut hazard = HazardPointer::make_in(&QUEUE_DOMAIN);
        let head = hazard.protect(&self.head);
        // SAFETY: `head` is protected.
        unsafe { (*head).next.load(Ordering::Acquire).is_null() }
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        // `&mut self` proves quiescence: drain without retiring.
        let mut node_ptr = *self.head.get_mut();
        let mut is_sentinel = true;
        while !node_ptr.is_null() {
            // SAFETY: exclusive access; the chain from the sentinel is the
            // set of live nodes.
            let mut node = unsafe { Box::from_raw(node_ptr) };
            if !is_sentinel {
                // SAFETY: every node past the sentinel holds a value no
                // dequeue has consumed.
                unsafe { node.value.assume_init_drop() };
            }
            is_sentinel = false;
            node_ptr = *node.next.get_mut();
        }
    }
}
