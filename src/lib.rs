#![deny(missing_docs)]

//! Core library for the SkillScope analysis server.

/// HTTP routing and REST handlers.
pub mod api;
/// Completion service client abstraction and adapter.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Format-aware text extraction from uploaded documents.
pub mod extract;
/// Structured logging and tracing setup.
pub mod logging;
/// Analysis metrics helpers.
pub mod metrics;
/// Map-reduce analysis pipeline.
pub mod pipeline;
/// Application service coordinating extraction, analysis, and persistence.
pub mod service;
/// Blob storage and metadata index integration.
pub mod store;
