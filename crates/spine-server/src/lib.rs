//! HTTP framing for Spine: request/response plumbing over `spine_core`'s
//! `JobEngine`. The engine owns every invariant; this crate only does
//! authentication, routing, and JSON (de)serialization.

pub mod routes;

use std::sync::Arc;

use spine_core::auth::TokenRoles;
use spine_core::engine::JobEngine;
use spine_core::storage::JobStore;

/// Shared application state behind every handler.
pub struct ServerState<S: JobStore> {
    pub engine: JobEngine<S>,
    pub token_roles: TokenRoles,
}

pub type AppState<S> = Arc<ServerState<S>>;

pub use routes::create_router;
