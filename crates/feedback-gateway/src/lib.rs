//! # Feedback Gateway
//!
//! HTTP server for the feedback service: per-client admission control in
//! front of the feedback store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Per-client admission control.
pub mod admission;
/// HTTP error responses.
pub mod error;
/// Admission extractors and client identification.
pub mod middleware;
mod server;

pub use admission::{AdmissionControl, AdmissionFilter, Admitted, FixedWindowLimiter, Throttled, WindowPolicy};
pub use error::ApiError;
pub use server::{AppState, Gateway, GatewayBuilder, SubmitFeedback, router};

use feedback_core::Config;

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if the store cannot be opened or the server fails to start.
pub async fn start(config: Config) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Required configuration or resources are missing at startup.
    #[error("Startup error: {0}")]
    Startup(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
