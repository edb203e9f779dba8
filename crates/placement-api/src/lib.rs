//! JSON REST API for the placement record engine.
//!
//! Exposes an axum [`Router`] over an [`Engine`] built on any set of store
//! implementations. Auth, TLS, and transport concerns are the caller's
//! responsibility; the acting role arrives in request bodies.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", placement_api::api_router(engine.clone()))
//! ```

pub mod archive;
pub mod companies;
pub mod error;
pub mod etag;
pub mod lifecycle;
pub mod mobile;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use placement_core::store::{ArchiveStore, MirrorStore, PrimaryStore};
use placement_engine::Engine;

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<P, A, M>(engine: Arc<Engine<P, A, M>>) -> Router<()>
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  Router::new()
    // Active records
    .route("/companies", get(companies::list::<P, A, M>).post(companies::create::<P, A, M>))
    .route("/companies/archive", post(companies::archive_bulk::<P, A, M>))
    .route(
      "/companies/{id}",
      get(companies::get_one::<P, A, M>).put(companies::update::<P, A, M>),
    )
    .route("/companies/{id}/archive", post(companies::archive_one::<P, A, M>))
    // Archive
    .route("/archive", get(archive::list::<P, A, M>))
    .route("/archive/restore", post(archive::restore_bulk::<P, A, M>))
    .route(
      "/archive/{id}",
      get(archive::get_one::<P, A, M>).delete(archive::purge::<P, A, M>),
    )
    .route("/archive/{id}/restore", post(archive::restore_one::<P, A, M>))
    // Lifecycle
    .route("/reconcile", post(lifecycle::reconcile::<P, A, M>))
    .route("/summary", get(lifecycle::summary::<P, A, M>))
    // Mobile read path
    .route("/mobile/companies", get(mobile::list::<P, A, M>))
    .with_state(engine)
}
