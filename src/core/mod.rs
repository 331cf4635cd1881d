//! # Core Module
//!
//! Engine-wide plumbing shared by every subsystem:
//!
//! - `MtResource`: thread-safe reference-counted resource with read-write locking, used to
//!   share chunk stores between the main thread and workers
//! - `config`: serde-backed engine configuration
//! - `diagnostics`: rolling per-stage timing buffers

pub mod config;
pub mod diagnostics;
/// Shared, lock-guarded resources.
pub mod mt_resource;

pub use mt_resource::MtResource;
