//! Commonly used types for convenient import.
//!
//! Use `use sentry_telemetry::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust,no_run
//! use sentry_telemetry::prelude::*;
//!
//! # fn main() -> TelemetryResult<()> {
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

// Errors
pub use crate::{TelemetryError, TelemetryResult};

// Logging configuration
pub use crate::{LogConfig, LogFormat, LogTarget};

// Setup functions
pub use crate::{setup_default_logging, setup_logging};

// Request context
pub use crate::{RequestContext, RequestGuard};
