//! Config file helpers for the CLI.

use std::path::Path;

use alpaca_core::{ConfigFile, FilterConfig, PaddingMode};
use anyhow::{Context, Result};
use serde::Serialize;

/// File names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["alpaca.toml", ".alpaca.toml", "alpaca.json"];

/// Load a config file (`.json` or TOML).
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    ConfigFile::load(path).with_context(|| format!("Failed to load config: {}", path.display()))
}

/// Effective settings of one scope, as printed by `show` and `resolve`.
#[derive(Debug, Serialize)]
pub struct ScopeReport {
    /// Location prefix, `None` for the root scope.
    pub location: Option<String>,
    #[serde(flatten)]
    pub config: FilterConfig,
}

impl ScopeReport {
    pub fn new(location: Option<&str>, config: &FilterConfig) -> Self {
        Self {
            location: location.map(str::to_string),
            config: config.clone(),
        }
    }

    /// Key-value lines for human output.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let config = &self.config;
        let mut fields = vec![("mode", config.mode.name().to_string())];

        match &config.mode {
            PaddingMode::Disabled => {}
            PaddingMode::Probabilistic(dist) => {
                fields.push(("dist_html_size", dist.html_size.clone()));
                fields.push(("dist_obj_num", dist.obj_num.clone()));
                fields.push(("dist_obj_size", dist.obj_size.clone()));
            }
            PaddingMode::Deterministic(sizes) => {
                fields.push(("obj_num", sizes.obj_num.to_string()));
                fields.push(("obj_size", sizes.obj_size.to_string()));
                fields.push(("max_obj_size", sizes.max_obj_size.to_string()));
            }
        }

        fields.push(("use_total_obj_size", config.use_total_obj_size.to_string()));
        fields.push(("obj_inlining_enabled", config.obj_inlining_enabled.to_string()));
        fields.push(("css_inlining_enabled", config.css_inlining_enabled.to_string()));
        fields
    }
}

/// Generate a default alpaca.toml config file.
pub fn generate_default_config() -> String {
    r#"# ALPaCA padding filter configuration
#
# Root scope directives apply to every request. Each [locations."<prefix>"]
# table overrides them for request paths starting with <prefix>; unset
# directives are inherited from the root scope.

# Deterministic mode pads every object to a multiple of obj_size and adds
# objects until the page holds a multiple of obj_num.
deterministic = true
obj_num = 5
obj_size = 1000
max_obj_size = 10000

# Probabilistic mode samples target sizes instead. It needs all three
# distribution descriptors and cannot be combined with deterministic mode.
# probabilistic = true
# dist_html_size = "normal:1000,200"
# dist_obj_num = "normal:5,2"
# dist_obj_size = "normal:5000,1000"

use_total_obj_size = false
obj_inlining_enabled = false
css_inlining_enabled = false

[locations."/static/"]
css_inlining_enabled = true

[locations."/api/"]
deterministic = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let file = ConfigFile::from_toml_str(&generate_default_config()).unwrap();
        assert!(file.check().is_empty());

        let scopes = file.compile().unwrap();
        assert_eq!(scopes.root().mode.name(), "deterministic");
        assert!(scopes.for_uri("/static/app.css").css_inlining_enabled);
        assert!(!scopes.for_uri("/api/items").is_enabled());
    }

    #[test]
    fn test_report_fields() {
        let file = ConfigFile::from_toml_str(&generate_default_config()).unwrap();
        let scopes = file.compile().unwrap();
        let report = ScopeReport::new(None, scopes.root());

        let fields = report.fields();
        assert_eq!(fields[0], ("mode", "deterministic".to_string()));
        assert!(fields.contains(&("max_obj_size", "10000".to_string())));
    }
}
