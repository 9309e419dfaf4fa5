//! API layer
//!
//! HTTP handlers outside the auth flow:
//! - Metrics (Prometheus)

pub mod metrics;

pub use metrics::metrics_router;
