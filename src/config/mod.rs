//! Configuration module for crawl-engine
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration.
//!
//! # Example
//!
//! ```no_run
//! use crawl_engine::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FrontierOrder, OutputConfig, RetryConfig, ScopeConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{config_fingerprint, hash_content, load_config, parse_config};
pub use validation::validate;
