//! Shared types, error model, and configuration for LeadEnrich.
//!
//! This crate is the foundation depended on by all other LeadEnrich crates.
//! It provides:
//! - [`LeadEnrichError`]: the unified error type
//! - Domain types ([`FieldValue`], [`LeadField`], [`SearchResult`], [`GeoBias`], [`ErrorRecord`])
//! - Configuration ([`AppConfig`], runtime configs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichmentSection, GenerationConfig, GenerationSection, MAX_PAGE_SIZE,
    PlacesConfig, PlacesSection, WebsiteConfig, WebsiteSection, config_dir, config_file_path,
    init_config, load_config, load_config_from, read_api_key,
};
pub use error::{LeadEnrichError, Result};
pub use types::{ErrorRecord, FieldValue, GeoBias, LeadField, METERS_PER_MILE, SearchResult};
