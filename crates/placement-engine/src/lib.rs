//! The record lifecycle engine.
//!
//! Wires the three stores from [`placement_core::store`] together:
//!
//! - [`sync::LifecycleSynchronizer`] keeps each record's derived MOA fields
//!   current and pushes its projection towards the mirror.
//! - [`archive::ArchiveManager`] moves records from the primary store into
//!   the archive.
//! - [`restore::RestoreCoordinator`] moves them back.
//! - [`mirror_queue::MirrorQueue`] applies mirror writes in the background
//!   with bounded retries, so mirror trouble never fails a primary mutation.
//! - [`sync_loop::SyncLoop`] re-runs reconciliation on change notifications
//!   and on a timer, which is what moves records across date boundaries.
//!
//! [`Engine`] is the facade the HTTP layer and the server binary talk to.

pub mod archive;
pub mod config;
pub mod engine;
pub mod feed;
pub mod memory;
pub mod mirror_queue;
pub mod report;
pub mod restore;
pub mod sync;
pub mod sync_loop;

pub use config::{EngineConfig, RetryPolicy};
pub use engine::{Engine, RecordFilter};
pub use report::{BulkFailure, BulkReport, ReconcileReport};

#[cfg(test)]
mod tests;
