//! Configuration module for lemma-search
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use lemma_search::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Configured sites: {}", config.sites.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, ConnectionConfig, OutputConfig, SearchConfig, SiteEntry};

// Re-export parser functions
pub use parser::{
    compute_config_hash, config_digest, load_config, load_config_with_hash, parse_config,
};
