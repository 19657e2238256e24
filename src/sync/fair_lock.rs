//! Fair, reentrant asynchronous lock.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Identity of the logical task interacting with a lock.
///
/// The runtime-root future (driven by `block_on`) has no task id and counts
/// as a single task. Futures polled concurrently inside one task (`join!`)
/// share an identity; use `tokio::spawn` for independent waiters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TaskId(Option<tokio::task::Id>);

impl TaskId {
    /// Identity of the currently running task.
    pub fn current() -> Self {
        TaskId(tokio::task::try_id())
    }
}

/// Errors raised by explicit [`ReentrantAsyncLock::release`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// The lock is not held by anyone.
    UnownedRelease,
    /// The lock is held by a different task.
    ForeignRelease,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::UnownedRelease => f.write_str("Cannot release un-acquired lock."),
            LockError::ForeignRelease => f.write_str("Cannot release foreign lock."),
        }
    }
}

impl std::error::Error for LockError {}

struct Waiter {
    ticket: u64,
    task: TaskId,
    tx: oneshot::Sender<()>,
}

struct LockState {
    owner: Option<TaskId>,
    depth: usize,
    queue: VecDeque<Waiter>,
    // Ticket handed ownership by a releaser but not yet claimed by its waiter.
    granted: Option<u64>,
    next_ticket: u64,
}

/// A cooperative mutual-exclusion lock with FIFO fairness and per-task
/// reentrancy.
///
/// - **Fairness**: waiters acquire in arrival order.
/// - **Reentrancy**: the owning task may re-acquire without blocking; the
///   lock is relinquished when every nested guard has been released.
/// - **Cancellation safety**: a waiter whose `acquire` future is dropped is
///   removed from the queue; if ownership was already assigned to it, the
///   hand-off proceeds to the next live waiter.
/// - **Handover safety**: on release, ownership is assigned to the next
///   waiter before it is woken and is never revoked by a later arrival.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use wirebox::sync::ReentrantAsyncLock;
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() {
/// let lock = Arc::new(ReentrantAsyncLock::new());
/// let guard = lock.acquire().await;
/// let nested = lock.acquire().await; // same task: does not block
/// assert!(lock.is_owner());
/// drop(nested);
/// drop(guard);
/// assert!(!lock.is_locked());
/// # }
/// ```
pub struct ReentrantAsyncLock {
    state: Mutex<LockState>,
}

impl ReentrantAsyncLock {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState {
                owner: None,
                depth: 0,
                queue: VecDeque::new(),
                granted: None,
                next_ticket: 0,
            }),
        }
    }

    /// Acquires the lock, waiting in FIFO order, and returns a guard that
    /// releases one nesting level when dropped.
    pub async fn acquire(&self) -> LockGuard<'_> {
        let me = TaskId::current();

        loop {
            let (ticket, rx) = {
                let mut st = self.state.lock().unwrap();

                if st.owner == Some(me) {
                    st.depth += 1;
                    return LockGuard { lock: self };
                }

                if st.owner.is_none() && st.queue.is_empty() && st.granted.is_none() {
                    st.owner = Some(me);
                    st.depth = 1;
                    return LockGuard { lock: self };
                }

                let (tx, rx) = oneshot::channel();
                let ticket = st.next_ticket;
                st.next_ticket += 1;
                st.queue.push_back(Waiter {
                    ticket,
                    task: me,
                    tx,
                });
                (ticket, rx)
            };

            let mut wait = WaitGuard {
                lock: self,
                ticket,
                claimed: false,
            };

            let _ = rx.await;

            let mut st = self.state.lock().unwrap();
            if st.granted == Some(ticket) {
                st.granted = None;
                wait.claimed = true;
                drop(st);
                return LockGuard { lock: self };
            }

            // The grant was lost (releaser skipped a vanished receiver);
            // rejoin the queue.
            wait.claimed = true;
            drop(st);
        }
    }

    /// Releases one nesting level.
    ///
    /// Fails with [`LockError::UnownedRelease`] when the lock is not held
    /// and [`LockError::ForeignRelease`] when it is held by another task.
    /// Guards call this automatically; explicit calls pair with
    /// [`LockGuard::forget`].
    pub fn release(&self) -> Result<(), LockError> {
        let me = TaskId::current();
        let mut st = self.state.lock().unwrap();

        match st.owner {
            None => Err(LockError::UnownedRelease),
            Some(owner) if owner != me => Err(LockError::ForeignRelease),
            Some(_) => {
                st.depth -= 1;
                if st.depth == 0 {
                    Self::hand_off(&mut st);
                }
                Ok(())
            }
        }
    }

    /// Whether the current task owns the lock.
    pub fn is_owner(&self) -> bool {
        self.state.lock().unwrap().owner == Some(TaskId::current())
    }

    /// Whether any task owns the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().unwrap().owner.is_some()
    }

    /// Current reentrancy depth of the owner (0 when unlocked).
    pub fn depth(&self) -> usize {
        self.state.lock().unwrap().depth
    }

    /// Number of queued waiters.
    pub fn waiter_count(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    // Ownership is assigned before the waiter is woken so a later arrival
    // can never steal the slot.
    fn hand_off(st: &mut LockState) {
        loop {
            match st.queue.pop_front() {
                Some(waiter) => {
                    st.owner = Some(waiter.task);
                    st.depth = 1;
                    st.granted = Some(waiter.ticket);

                    if waiter.tx.send(()).is_ok() {
                        return;
                    }

                    // The waiter vanished before the grant reached it.
                    st.owner = None;
                    st.depth = 0;
                    st.granted = None;
                }
                None => {
                    st.owner = None;
                    st.depth = 0;
                    return;
                }
            }
        }
    }
}

impl Default for ReentrantAsyncLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantAsyncLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.lock().unwrap();
        f.debug_struct("ReentrantAsyncLock")
            .field("locked", &st.owner.is_some())
            .field("depth", &st.depth)
            .field("waiters", &st.queue.len())
            .finish()
    }
}

/// Guard released when dropped; one guard per nesting level.
#[must_use = "the lock is released when the guard is dropped"]
pub struct LockGuard<'a> {
    lock: &'a ReentrantAsyncLock,
}

impl LockGuard<'_> {
    /// Leaks this nesting level so the lock stays held; pair with an
    /// explicit [`ReentrantAsyncLock::release`].
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let _ = self.lock.release();
    }
}

// Cleans up after a cancelled or superseded wait.
struct WaitGuard<'a> {
    lock: &'a ReentrantAsyncLock,
    ticket: u64,
    claimed: bool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if self.claimed {
            return;
        }

        let mut st = self.lock.state.lock().unwrap();

        if let Some(position) = st.queue.iter().position(|w| w.ticket == self.ticket) {
            st.queue.remove(position);
            return;
        }

        // Ownership was assigned while we were being cancelled; pass it on.
        if st.granted == Some(self.ticket) {
            st.granted = None;
            ReentrantAsyncLock::hand_off(&mut st);
        }
    }
}
