//! Internal API access.
//!
//! Outbound calls carry the caller's own bearer token; the internal API
//! applies its own authorization on top.

mod client;
mod forwarder;
pub mod models;
pub mod stub;

pub use client::{ApiError, InternalApiClient};
pub use forwarder::CredentialForwarder;
pub use models::{OrgSummary, PagedResult};
