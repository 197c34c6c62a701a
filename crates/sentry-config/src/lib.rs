//! Unified configuration for the Sentry gateway.
//!
//! A single [`Config`] type consolidates every service's tunables.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sentry_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! let config = resolved.config;
//! println!("gateway binds to {}", config.gateway.bind_addr);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **User** (`~/.config/sentry/config.toml`)
//! 2. **System** (`/etc/sentry/config.toml`)
//! 3. **Environment variables** (`SENTRY_*`, `ANTHROPIC_*`) — `${VAR}`
//!    interpolation inside string fields only, not a full fallback pass
//! 4. **Typed defaults** (each section's [`Default`] impl)
//!
//! # Design
//!
//! This crate has no dependency on other internal `sentry-*` crates. It
//! only depends on `serde`, `toml`, `thiserror`, `tracing`, and
//! `directories`. Conversion from config sections to the constructor
//! arguments each service takes happens at the gateway's startup
//! boundary.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod env;
pub mod error;
pub mod loader;
pub mod merge;
pub mod show;
pub mod types;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use show::ResolvedConfig;
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the
    /// final configuration fails validation.
    pub fn load(home_override: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(home_override)
    }

    /// Load configuration from a single file, with no layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or
    /// fails validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
