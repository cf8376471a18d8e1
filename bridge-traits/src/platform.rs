//! Marker traits that keep bridge trait bounds in one place.
//!
//! Bridge implementations are shared across the tasks the core spawns, so
//! every bridge trait requires `Send + Sync`, and every event stream handed
//! to a pump task requires `Send`.

/// Marker trait for bridge objects shared across tasks.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait for bridge objects moved into a single task.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
