//! Clinical Core - shared engine for clinical data services
//!
//! The machinery every clinical domain (message pools, inbox messages, pregnancies,
//! surgical cases, research studies, lab reports, terminology codes) relies on:
//! - Search compilation from declared parameters into parameterized PostgreSQL
//! - Per-resource version history with optimistic concurrency, history and vread
//! - JSON Patch and JSON Merge Patch application
//! - Code system display lookup

#![allow(
    clippy::large_enum_variant,      // Error carries sqlx/config errors inline
)]

pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod patch;
pub mod search;
pub mod terminology;

pub use config::EngineConfig;
pub use context::RequestContext;
pub use error::{Error, ErrorKind, Result};
pub use history::VersionTracker;
pub use patch::{PatchDocument, PatchFormat};
pub use search::{CompiledQuery, SearchCompiler};
