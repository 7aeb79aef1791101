//! Filestore Database Layer
//!
//! This crate provides the [`MetadataStore`] trait for resource metadata records,
//! its PostgreSQL implementation, an in-process implementation for local runs and
//! tests, and pool/migration setup.

pub mod memory;
pub mod postgres;
pub mod setup;
pub mod store;

// Re-exports
pub use memory::InMemoryMetadataStore;
pub use postgres::PgMetadataStore;
pub use setup::{connect, run_migrations};
pub use store::MetadataStore;
