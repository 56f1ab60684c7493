//! Unbounded lock-free LIFO stack (Treiber).

use core::mem::ManuallyDrop;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::{Backoff, CachePadded};
use vigil::{Domain, HazardPointer};

/// Family tag: all stacks share one domain, isolated from other clients.
struct StackFamily;

static STACK_DOMAIN: Domain<StackFamily> = Domain::new();

struct Node<T> {
    /// Wrapped so the popping thread can move the value out while the node
    /// itself waits on the retire list.
    value: ManuallyDrop<T>,
    /// Plain pointer: written only before the node is published, immutable
    /// afterwards.
    next: *mut Node<T>,
}

/// An unbounded lock-free LIFO stack.
///
/// Readers protect the head through a hazard cell before dereferencing it;
/// a popped node is retired, not freed, so a concurrent `pop` racing on the
/// same node can never observe freed memory and the head CAS is immune to
/// ABA.
///
/// # Example
///
/// ```
/// use vigil_collections::Stack;
///
/// let stack = Stack::new();
/// stack.push(1);
/// stack.push(2);
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// ```
pub struct Stack<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
}

// SAFETY: values move between threads through push/pop; nodes are freed on
// whichever thread's scan wins, so `T: Send` is required and sufficient.
unsafe impl<T: Send> Send for Stack<T> {}
unsafe impl<T: Send> Sync for Stack<T> {}

impl<T: 'static> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Stack<T> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
        }
    }

    /// Pushes a value onto the stack.
    pub fn push(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value: ManuallyDrop::new(value),
            next: ptr::null_mut(),
        }));

        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: `node` is unpublished; this thread is its only writer.
            unsafe { (*node).next = head };
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => {
                    head = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Pops the most recently pushed value, or `None` if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        let mut hazard = HazardPointer::make_in(&STACK_DOMAIN);
        let backoff = Backoff::new();
        loop {
            let head = hazard.protect(&self.head);
            if head.is_null() {
                return None;
            }

            // SAFETY: `head` is protected, so the node cannot have been
            // freed; `next` is immutable after publication.
            let next = unsafe { (*head).next };

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // The unlink hands this thread sole ownership of the value.
                // SAFETY: only the successful CAS winner reads it, and the
                // node's dropper never touches the `ManuallyDrop`.
                let value = unsafe { ptr::read(&(*head).value) };
                // SAFETY: unlinked above, so unreachable from the root.
                unsafe { STACK_DOMAIN.retire(head) };
                return Some(ManuallyDrop::into_inner(value));
            }
            backoff.spin();
        }
    }

    /// Whether the stack was empty at the instant of the check.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        // `&mut self` proves quiescence: drain without retiring.
        let mut head = *self.head.get_mut();
        while !head.is_null() {
            // SAFETY: exclusive access; every reachable node is live and
            // still carries its value.
            let mut node = unsafe { Box::from_raw(head) };
            unsafe { ManuallyDrop::drop(&mut node.value) };
            head = node.next;
        }
    }
}
