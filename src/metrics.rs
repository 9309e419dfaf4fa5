//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Sign-in Metrics
    pub static ref PROVIDER_CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauthgate_provider_callbacks_total", "Total number of provider callbacks by outcome"),
        &["provider", "outcome"]
    ).expect("metric can be created");
    pub static ref SESSION_RESOLUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauthgate_session_resolutions_total", "Total number of session user resolutions"),
        &["status"]
    ).expect("metric can be created");

    // Database Metrics
    pub static ref USER_STORE_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauthgate_user_store_queries_total", "Total number of user store queries"),
        &["operation"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauthgate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(PROVIDER_CALLBACKS_TOTAL.clone()))
            .expect("PROVIDER_CALLBACKS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSION_RESOLUTIONS_TOTAL.clone()))
            .expect("SESSION_RESOLUTIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(USER_STORE_QUERIES_TOTAL.clone()))
            .expect("USER_STORE_QUERIES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
