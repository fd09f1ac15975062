//! Proxy-free streaming HTTP probe client (C2).
//!
//! Measures TTFB and throughput for every fetch, honours a connect-timeout
//! plus a protocol-dependent request-timeout, and propagates a
//! [`tokio_util::sync::CancellationToken`] through every suspension point.
//! See `SPEC_FULL.md` §4.4 and §9.

mod client;
mod error;

pub use client::{FetchOutcome, FetchRequest, ProbeHttpClient, TransportConfig};
pub use error::TransportError;
