//! # Feedback Core
//!
//! Core types, configuration, and storage for the feedback service.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Feedback record types
//! - Input validation and HTML sanitization
//! - The feedback store trait with sled-backed and in-memory stores
//! - [`FeedbackService`], which mediates every read and write

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod sanitize;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{Config, ConfigError, RateLimitConfig};
pub use sanitize::{HtmlSanitizer, Sanitize};
pub use service::{DEFAULT_RECENT_LIMIT, FeedbackError, FeedbackService};
pub use store::{FeedbackStore, MemoryFeedbackStore, SledFeedbackStore, StoreError};
pub use types::{FeedbackId, FeedbackRecord, NewFeedback};
pub use validation::ValidationError;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::sanitize::{HtmlSanitizer, Sanitize};
    pub use crate::service::FeedbackService;
    pub use crate::store::{FeedbackStore, MemoryFeedbackStore, SledFeedbackStore};
    pub use crate::types::*;
}
