//! Layered merging of TOML config values.

/// Recursively deep-merge `overlay` into `base`.
///
/// Tables merge recursively per-field; scalars and arrays from the
/// overlay replace the base value outright.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_scalar_replaces_base_scalar() {
        let mut base: toml::Value = toml::from_str("[gateway]\nbind_addr = \"127.0.0.1:8787\"\n").unwrap();
        let overlay: toml::Value = toml::from_str("[gateway]\nbind_addr = \"0.0.0.0:9000\"\n").unwrap();
        deep_merge(&mut base, &overlay);
        assert_eq!(base["gateway"]["bind_addr"].as_str(), Some("0.0.0.0:9000"));
    }

    #[test]
    fn overlay_only_touches_named_fields() {
        let mut base: toml::Value = toml::from_str("[cost]\ndaily_budget_usd = 5.0\nweekly_budget_usd = 25.0\n").unwrap();
        let overlay: toml::Value = toml::from_str("[cost]\ndaily_budget_usd = 10.0\n").unwrap();
        deep_merge(&mut base, &overlay);
        assert_eq!(base["cost"]["daily_budget_usd"].as_float(), Some(10.0));
        assert_eq!(base["cost"]["weekly_budget_usd"].as_float(), Some(25.0));
    }
}
