//! Workspace façade crate.
//!
//! Host applications depend on `vidplay` and get the player service together
//! with the playback types it exposes, without wiring each workspace crate
//! individually.

pub use core_service::*;
