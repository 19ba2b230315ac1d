//! Thin Sonarr v3 REST client.
//!
//! This crate is used by `sonarr-mcp-adapter` to issue exactly one HTTP request per call against
//! the upstream Sonarr API. It intentionally contains **no** retry logic and **no** caching: the
//! upstream service is the sole source of truth.

pub mod client;
pub mod error;
pub mod request;
pub mod safety;
pub mod semantics;

pub use client::{SonarrClient, SonarrClientConfig};
pub use error::{Result, UpstreamError};
pub use request::{UpstreamBody, UpstreamRequest, UpstreamResponse};
pub use reqwest::Method;
