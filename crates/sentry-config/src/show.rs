//! Resolved configuration, as returned by [`crate::loader::load`].

use serde::{Deserialize, Serialize};

use crate::types::Config;

/// The fully merged, validated configuration plus which files
/// contributed to it, for an admin-facing "show effective config"
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// The merged configuration.
    pub config: Config,
    /// Paths of every config file that was found and merged in, in
    /// precedence order (lowest first).
    pub loaded_files: Vec<String>,
}
