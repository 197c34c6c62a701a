//! Logging and request tracing for the Sentry gateway.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats and sinks
//! - Request context for correlation across the pipeline
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```rust,no_run
//! use sentry_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), sentry_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("sentry_router=trace");
//!
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("router").with_operation("route_prompt");
//!
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("routing prompt");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
