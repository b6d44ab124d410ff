//! HTTP surface over the provider layer: webhook intake, the provider
//! catalog, and per-instance scope, pull, notify and query calls.

pub mod api;
pub mod error;
pub mod state;
pub mod webhook;

pub use api::router;
pub use error::ApiError;
pub use state::{AppState, Instances};
