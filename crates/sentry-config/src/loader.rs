//! Config file discovery and layered loading.
//!
//! Implements [`Config::load`]'s algorithm:
//! 1. Start from typed defaults.
//! 2. Merge `/etc/sentry/config.toml` (system).
//! 3. Merge `~/.config/sentry/config.toml` (user).
//! 4. Resolve `${VAR}` references against `SENTRY_*`/`ANTHROPIC_*` env vars.
//! 5. Deserialize the merged tree.
//! 6. Validate.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::env::{collect_env_vars, resolve_env_references};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the unified configuration with layered file precedence.
///
/// `home_override` substitutes the user's home directory for discovery,
/// bypassing [`directories::BaseDirs`].
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(home_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();
    let mut merged = toml::Value::try_from(Config::default()).map_err(|e| ConfigError::Internal(e.to_string()))?;
    let mut loaded_files = Vec::new();

    let system_path = PathBuf::from("/etc/sentry/config.toml");
    if let Some(overlay) = try_load_file(&system_path)? {
        deep_merge(&mut merged, &overlay);
        loaded_files.push(system_path.display().to_string());
        info!(path = %system_path.display(), "loaded system config");
    }

    let user_path = user_config_path(home_override)?;
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, &overlay);
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    resolve_env_references(&mut merged, &env_vars);
    let config: Config =
        merged.try_into().map_err(|e| ConfigError::ParseError { path: "<merged config>".to_owned(), source: e })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig { config, loaded_files })
}

/// Load a config from a specific file path, with no layering.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    check_permissions(path)?;
    let content = read_bounded(path)?;
    let config: Config =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError { path: path.display().to_string(), source: e })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Reject a config file readable or writable by group or other. A
/// no-op on non-Unix targets, where mode bits don't carry this meaning.
#[cfg(unix)]
fn check_permissions(path: &Path) -> ConfigResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ConfigError::ReadError { path: path.display().to_string(), source: e }),
    };
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(ConfigError::InsecurePermissions { path: path.display().to_string(), mode: mode & 0o777 });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> ConfigResult<()> {
    Ok(())
}

fn user_config_path(home_override: Option<&Path>) -> ConfigResult<PathBuf> {
    if let Some(home) = home_override {
        return Ok(home.join("sentry").join("config.toml"));
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("sentry").join("config.toml"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Read a file, rejecting anything over [`MAX_CONFIG_FILE_SIZE`]. A
/// single read avoids a stat-then-read race against the size check.
fn read_bounded(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError { path: path.display().to_string(), source: e })?;
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!("config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit", content.len()),
        });
    }
    Ok(content)
}

fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    check_permissions(path)?;
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::ReadError { path: path.display().to_string(), source: e }),
    };
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!("config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit", content.len()),
        });
    }
    let value: toml::Value =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError { path: path.display().to_string(), source: e })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_files_uses_typed_defaults() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load(Some(home.path())).unwrap();
        assert_eq!(resolved.config.logging.level, "info");
        assert!(resolved.loaded_files.is_empty());
    }

    #[cfg(unix)]
    fn restrict_permissions(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).unwrap();
    }

    #[cfg(not(unix))]
    fn restrict_permissions(_path: &Path) {}

    #[test]
    fn user_layer_overrides_defaults() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join("sentry")).unwrap();
        let path = home.path().join("sentry").join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        restrict_permissions(&path);
        let resolved = load(Some(home.path())).unwrap();
        assert_eq!(resolved.config.logging.level, "debug");
        assert_eq!(resolved.loaded_files.len(), 1);
    }

    #[test]
    fn load_file_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&path, data).unwrap();
        restrict_permissions(&path);
        assert!(matches!(load_file(&path), Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn load_file_rejects_insecure_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world-readable.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
            assert!(matches!(load_file(&path), Err(ConfigError::InsecurePermissions { .. })));
        }
    }

    #[test]
    fn load_file_rejects_missing_file() {
        assert!(matches!(load_file(Path::new("/nonexistent/sentry-config.toml")), Err(ConfigError::ReadError { .. })));
    }
}
