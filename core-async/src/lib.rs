//! Async runtime abstraction layer for the vidplay playback core.
//!
//! Every other crate in the workspace goes through this crate for task
//! spawning, timers and synchronization primitives instead of reaching for
//! Tokio directly, so paused-clock tests (`tokio::time::pause`) drive every
//! timer in the core.
//!
//! # Modules
//!
//! - `task`: Task spawning and execution
//! - `time`: Time-related operations (sleep, duration, instant)
//! - `sync`: Synchronization primitives (channels, cancellation)
//! - `delay`: Cancellable scheduled actions used for debounce and auto-hide
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod delay;
pub mod sync;
pub mod task;
pub mod time;

pub use delay::DelayedTask;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};

/// Waits on multiple concurrent branches, returning when the first completes.
pub use tokio::select;
