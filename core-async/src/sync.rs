//! Synchronization primitives.
//!
//! Re-exports of the async-aware `tokio::sync` primitives plus the
//! `CancellationToken` used to tie scheduled work to the owner that armed it.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, CancellationToken};
//!
//! async fn example() {
//!     let (tx, mut rx) = watch::channel(0u32);
//!     tx.send_replace(1);
//!     rx.changed().await.unwrap();
//!     assert_eq!(*rx.borrow(), 1);
//!
//!     let token = CancellationToken::new();
//!     token.cancel();
//!     assert!(token.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::{CancellationToken, DropGuard};
