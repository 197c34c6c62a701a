//! Environment variable support: `${VAR}`, `${VAR:-default}`, and
//! `${env:VAR}` interpolation inside string fields, resolved against a
//! snapshot of the process environment.

use std::collections::HashMap;

/// Collect every `SENTRY_*` and `ANTHROPIC_*` environment variable.
/// Scoped to these prefixes so an interpolated `${VAR}` can't read
/// arbitrary process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().filter(|(key, _)| key.starts_with("SENTRY_") || key.starts_with("ANTHROPIC_")).collect()
}

/// Replace every `${VAR}` occurrence in every string leaf of `value`
/// with `env_vars["VAR"]`, leaving unresolved references untouched.
pub fn resolve_env_references(value: &mut toml::Value, env_vars: &HashMap<String, String>) {
    match value {
        toml::Value::String(s) => {
            if let Some(resolved) = interpolate(s, env_vars) {
                *s = resolved;
            }
        },
        toml::Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                resolve_env_references(v, env_vars);
            }
        },
        toml::Value::Array(items) => {
            for v in items {
                resolve_env_references(v, env_vars);
            }
        },
        _ => {},
    }
}

fn interpolate(input: &str, env_vars: &HashMap<String, String>) -> Option<String> {
    if !input.contains("${") {
        return None;
    }
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            output.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let body = &after[..end];
        output.push_str(&resolve_reference(body, env_vars));
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Some(output)
}

/// Resolve one `${...}` body: a bare `VAR`, `VAR:-default`, or
/// `env:VAR` reading the raw process environment instead of the
/// scoped `env_vars` snapshot. An unresolved reference (no match, no
/// default) is reproduced verbatim so later layers still see it.
fn resolve_reference(body: &str, env_vars: &HashMap<String, String>) -> String {
    let (reference, default) = match body.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (body, None),
    };
    let resolved = match reference.strip_prefix("env:") {
        Some(name) => std::env::var(name).ok(),
        None => env_vars.get(reference).cloned(),
    };
    resolved.or_else(|| default.map(str::to_owned)).unwrap_or_else(|| format!("${{{body}}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_known_variable() {
        let mut vars = HashMap::new();
        vars.insert("SENTRY_BIND_ADDR".to_owned(), "0.0.0.0:9000".to_owned());
        assert_eq!(interpolate("${SENTRY_BIND_ADDR}", &vars), Some("0.0.0.0:9000".to_owned()));
    }

    #[test]
    fn leaves_unknown_reference_untouched() {
        let vars = HashMap::new();
        assert_eq!(interpolate("${MISSING}", &vars), Some("${MISSING}".to_owned()));
    }

    #[test]
    fn plain_string_is_not_modified() {
        let vars = HashMap::new();
        assert_eq!(interpolate("plain", &vars), None);
    }

    #[test]
    fn default_is_used_when_variable_absent() {
        let vars = HashMap::new();
        assert_eq!(interpolate("${SENTRY_MISSING:-fallback}", &vars), Some("fallback".to_owned()));
    }

    #[test]
    fn default_is_ignored_when_variable_present() {
        let mut vars = HashMap::new();
        vars.insert("SENTRY_PORT".to_owned(), "9100".to_owned());
        assert_eq!(interpolate("${SENTRY_PORT:-9000}", &vars), Some("9100".to_owned()));
    }

    #[test]
    #[allow(unsafe_code)]
    fn env_prefix_reads_raw_process_environment() {
        // SAFETY (test-only): no other test in this process reads or
        // writes this variable.
        unsafe {
            std::env::set_var("SENTRY_CONFIG_ENV_TEST_VAR", "raw-value");
        }
        let vars = HashMap::new();
        assert_eq!(interpolate("${env:SENTRY_CONFIG_ENV_TEST_VAR}", &vars), Some("raw-value".to_owned()));
        unsafe {
            std::env::remove_var("SENTRY_CONFIG_ENV_TEST_VAR");
        }
    }

    #[test]
    fn env_prefix_falls_back_to_default_when_unset() {
        let vars = HashMap::new();
        assert_eq!(
            interpolate("${env:SENTRY_CONFIG_ENV_TEST_UNSET:-unset-fallback}", &vars),
            Some("unset-fallback".to_owned())
        );
    }

    #[test]
    fn resolve_env_references_walks_nested_tables() {
        let mut value: toml::Value =
            toml::from_str("[providers.local]\napi_base_url = \"${SENTRY_LOCAL_URL}\"\n").unwrap();
        let mut vars = HashMap::new();
        vars.insert("SENTRY_LOCAL_URL".to_owned(), "http://127.0.0.1:11434".to_owned());
        resolve_env_references(&mut value, &vars);
        assert_eq!(value["providers"]["local"]["api_base_url"].as_str(), Some("http://127.0.0.1:11434"));
    }
}
