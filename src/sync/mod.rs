//! Task-safe synchronization building blocks.
//!
//! The container's compilation and scope caches are coordinated by a fair,
//! reentrant asynchronous lock and a get-or-compute concurrent map built on
//! top of it. Both are usable on their own.

mod concurrent_map;
mod fair_lock;

pub use concurrent_map::AsyncConcurrentMap;
pub use fair_lock::{LockError, LockGuard, ReentrantAsyncLock, TaskId};
