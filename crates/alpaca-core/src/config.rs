//! Per-scope filter configuration.
//!
//! Settings are declared per scope (the root plus any number of path-prefix
//! locations). A location inherits every field it leaves unset from the root.
//! Each merged scope is validated once at load time and then frozen into an
//! immutable [`FilterConfig`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Errors reported while loading or validating configuration.
///
/// All of them are fatal: a filter must not start with an invalid scope.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("both probabilistic and deterministic padding are enabled")]
    ConflictingModes,

    #[error("{0} is required in probabilistic mode")]
    MissingDistribution(&'static str),

    #[error("{name} must be positive in deterministic mode (got {value})")]
    NonPositive { name: &'static str, value: i64 },

    #[error("obj_num cannot be negative (got {0})")]
    NegativeObjectCount(i64),

    #[error("obj_size ({obj_size}) cannot be greater than max_obj_size ({max_obj_size})")]
    ObjectLargerThanMax { obj_size: i64, max_obj_size: i64 },

    #[error("max_obj_size ({max_obj_size}) must be a multiple of obj_size ({obj_size})")]
    NotMultiple { obj_size: i64, max_obj_size: i64 },

    #[error("location '{location}': {source}")]
    Location {
        location: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Directives of a single scope, as written in the config file.
///
/// Every field is optional so that a location can inherit from its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Enable probabilistic padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilistic: Option<bool>,
    /// Enable deterministic padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deterministic: Option<bool>,
    /// Distribution of HTML page sizes (probabilistic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_html_size: Option<String>,
    /// Distribution of object counts (probabilistic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_obj_num: Option<String>,
    /// Distribution of object sizes (probabilistic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_obj_size: Option<String>,
    /// Object count multiple (deterministic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_num: Option<i64>,
    /// Object size multiple (deterministic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_size: Option<i64>,
    /// Largest object size (deterministic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_obj_size: Option<i64>,
    /// Sample the total object size instead of each object's size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_total_obj_size: Option<bool>,
    /// Allow the engine to inline objects into the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_inlining_enabled: Option<bool>,
    /// Inline referenced stylesheets before object discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_inlining_enabled: Option<bool>,
}

impl ScopeConfig {
    /// Fill every unset field from `parent`.
    pub fn inherit(&self, parent: &ScopeConfig) -> ScopeConfig {
        ScopeConfig {
            probabilistic: self.probabilistic.or(parent.probabilistic),
            deterministic: self.deterministic.or(parent.deterministic),
            dist_html_size: self
                .dist_html_size
                .clone()
                .or_else(|| parent.dist_html_size.clone()),
            dist_obj_num: self
                .dist_obj_num
                .clone()
                .or_else(|| parent.dist_obj_num.clone()),
            dist_obj_size: self
                .dist_obj_size
                .clone()
                .or_else(|| parent.dist_obj_size.clone()),
            obj_num: self.obj_num.or(parent.obj_num),
            obj_size: self.obj_size.or(parent.obj_size),
            max_obj_size: self.max_obj_size.or(parent.max_obj_size),
            use_total_obj_size: self.use_total_obj_size.or(parent.use_total_obj_size),
            obj_inlining_enabled: self.obj_inlining_enabled.or(parent.obj_inlining_enabled),
            css_inlining_enabled: self.css_inlining_enabled.or(parent.css_inlining_enabled),
        }
    }

    /// Validate this scope and freeze it.
    ///
    /// Unset fields take their defaults: `false`, `0` or the empty string.
    pub fn resolve(&self) -> Result<FilterConfig, ConfigError> {
        let probabilistic = self.probabilistic.unwrap_or(false);
        let deterministic = self.deterministic.unwrap_or(false);

        if probabilistic && deterministic {
            return Err(ConfigError::ConflictingModes);
        }

        let mode = if probabilistic {
            PaddingMode::Probabilistic(Distributions {
                html_size: required_distribution(&self.dist_html_size, "dist_html_size")?,
                obj_num: required_distribution(&self.dist_obj_num, "dist_obj_num")?,
                obj_size: required_distribution(&self.dist_obj_size, "dist_obj_size")?,
            })
        } else if deterministic {
            PaddingMode::Deterministic(self.deterministic_sizes()?)
        } else {
            PaddingMode::Disabled
        };

        Ok(FilterConfig {
            mode,
            use_total_obj_size: self.use_total_obj_size.unwrap_or(false),
            obj_inlining_enabled: self.obj_inlining_enabled.unwrap_or(false),
            css_inlining_enabled: self.css_inlining_enabled.unwrap_or(false),
        })
    }

    fn deterministic_sizes(&self) -> Result<DeterministicSizes, ConfigError> {
        let obj_num = self.obj_num.unwrap_or(0);
        let obj_size = self.obj_size.unwrap_or(0);
        let max_obj_size = self.max_obj_size.unwrap_or(0);

        if obj_size <= 0 {
            return Err(ConfigError::NonPositive {
                name: "obj_size",
                value: obj_size,
            });
        }
        if max_obj_size <= 0 {
            return Err(ConfigError::NonPositive {
                name: "max_obj_size",
                value: max_obj_size,
            });
        }
        if obj_num < 0 {
            return Err(ConfigError::NegativeObjectCount(obj_num));
        }
        if max_obj_size < obj_size {
            return Err(ConfigError::ObjectLargerThanMax {
                obj_size,
                max_obj_size,
            });
        }
        if max_obj_size % obj_size != 0 {
            return Err(ConfigError::NotMultiple {
                obj_size,
                max_obj_size,
            });
        }

        Ok(DeterministicSizes {
            obj_num: obj_num as usize,
            obj_size: obj_size as usize,
            max_obj_size: max_obj_size as usize,
        })
    }
}

fn required_distribution(
    value: &Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingDistribution(name)),
    }
}

/// Distribution descriptors used in probabilistic mode.
///
/// The descriptors are opaque to the filter; only the morph engine reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distributions {
    pub html_size: String,
    pub obj_num: String,
    pub obj_size: String,
}

/// Fixed sizes used in deterministic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicSizes {
    pub obj_num: usize,
    pub obj_size: usize,
    pub max_obj_size: usize,
}

/// How a scope pads its responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PaddingMode {
    /// Padding is off for this scope.
    Disabled,
    /// Sizes are sampled from distributions.
    Probabilistic(Distributions),
    /// Sizes are rounded to fixed multiples.
    Deterministic(DeterministicSizes),
}

impl PaddingMode {
    /// Short name for logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Probabilistic(_) => "probabilistic",
            Self::Deterministic(_) => "deterministic",
        }
    }
}

/// Validated, immutable settings of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub mode: PaddingMode,
    pub use_total_obj_size: bool,
    pub obj_inlining_enabled: bool,
    pub css_inlining_enabled: bool,
}

impl FilterConfig {
    /// A scope with padding turned off.
    pub fn disabled() -> Self {
        Self {
            mode: PaddingMode::Disabled,
            use_total_obj_size: false,
            obj_inlining_enabled: false,
            css_inlining_enabled: false,
        }
    }

    /// Whether either padding mode is on.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, PaddingMode::Disabled)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Config file: root scope directives plus per-location overrides.
///
/// ```toml
/// deterministic = true
/// obj_num = 5
/// obj_size = 1000
/// max_obj_size = 10000
///
/// [locations."/static/"]
/// css_inlining_enabled = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Root scope.
    #[serde(flatten)]
    pub root: ScopeConfig,
    /// Scopes keyed by URI prefix.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub locations: BTreeMap<String, ScopeConfig>,
}

impl ConfigFile {
    /// Load a config file (`.json` or TOML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        if display.ends_with(".json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: display,
                message: e.to_string(),
            })
        } else {
            Self::from_toml_str(&content).map_err(|e| match e {
                ConfigError::Parse { message, .. } => ConfigError::Parse {
                    path: display,
                    message,
                },
                other => other,
            })
        }
    }

    /// Parse TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate every scope, stopping at the first error.
    pub fn compile(&self) -> Result<ScopedConfigs, ConfigError> {
        let root = Arc::new(self.root.resolve()?);

        let mut locations = Vec::with_capacity(self.locations.len());
        for (prefix, scope) in &self.locations {
            let resolved = scope
                .inherit(&self.root)
                .resolve()
                .map_err(|e| ConfigError::Location {
                    location: prefix.clone(),
                    source: Box::new(e),
                })?;
            locations.push((prefix.clone(), Arc::new(resolved)));
        }

        // Longest prefix first so lookup can stop at the first match.
        locations.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Ok(ScopedConfigs { root, locations })
    }

    /// Validate every scope and collect all errors.
    pub fn check(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Err(e) = self.root.resolve() {
            errors.push(e);
        }

        for (prefix, scope) in &self.locations {
            if let Err(e) = scope.inherit(&self.root).resolve() {
                errors.push(ConfigError::Location {
                    location: prefix.clone(),
                    source: Box::new(e),
                });
            }
        }

        errors
    }
}

/// Validated scopes, resolved per request URI.
#[derive(Debug, Clone)]
pub struct ScopedConfigs {
    root: Arc<FilterConfig>,
    locations: Vec<(String, Arc<FilterConfig>)>,
}

impl ScopedConfigs {
    /// Scopes consisting of a single root scope.
    pub fn single(config: FilterConfig) -> Self {
        Self {
            root: Arc::new(config),
            locations: Vec::new(),
        }
    }

    /// Settings for a request URI (longest matching location prefix wins).
    pub fn for_uri(&self, uri: &str) -> Arc<FilterConfig> {
        self.locations
            .iter()
            .find(|(prefix, _)| uri.starts_with(prefix.as_str()))
            .map(|(_, config)| Arc::clone(config))
            .unwrap_or_else(|| Arc::clone(&self.root))
    }

    /// Root scope settings.
    pub fn root(&self) -> &Arc<FilterConfig> {
        &self.root
    }

    /// Location scopes, longest prefix first.
    pub fn locations(&self) -> impl Iterator<Item = (&str, &Arc<FilterConfig>)> {
        self.locations.iter().map(|(p, c)| (p.as_str(), c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic(obj_size: i64, max_obj_size: i64) -> ScopeConfig {
        ScopeConfig {
            deterministic: Some(true),
            obj_num: Some(5),
            obj_size: Some(obj_size),
            max_obj_size: Some(max_obj_size),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_scope_is_disabled() {
        let config = ScopeConfig::default().resolve().unwrap();
        assert_eq!(config, FilterConfig::disabled());
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_both_modes_rejected() {
        let scope = ScopeConfig {
            probabilistic: Some(true),
            ..deterministic(10, 100)
        };
        assert!(matches!(scope.resolve(), Err(ConfigError::ConflictingModes)));
    }

    #[test]
    fn test_probabilistic_requires_distributions() {
        let scope = ScopeConfig {
            probabilistic: Some(true),
            dist_html_size: Some("Normal(1000, 10)".into()),
            dist_obj_num: Some("Normal(10, 1)".into()),
            ..Default::default()
        };
        assert!(matches!(
            scope.resolve(),
            Err(ConfigError::MissingDistribution("dist_obj_size"))
        ));

        let scope = ScopeConfig {
            dist_obj_size: Some("   ".into()),
            ..scope
        };
        assert!(matches!(
            scope.resolve(),
            Err(ConfigError::MissingDistribution("dist_obj_size"))
        ));
    }

    #[test]
    fn test_probabilistic_resolves() {
        let scope = ScopeConfig {
            probabilistic: Some(true),
            dist_html_size: Some("a".into()),
            dist_obj_num: Some("b".into()),
            dist_obj_size: Some("c".into()),
            css_inlining_enabled: Some(true),
            ..Default::default()
        };
        let config = scope.resolve().unwrap();
        assert_eq!(config.mode.name(), "probabilistic");
        assert!(config.css_inlining_enabled);
        assert!(!config.obj_inlining_enabled);
    }

    #[test]
    fn test_deterministic_rejects_non_multiple() {
        assert!(matches!(
            deterministic(3, 10).resolve(),
            Err(ConfigError::NotMultiple {
                obj_size: 3,
                max_obj_size: 10
            })
        ));
    }

    #[test]
    fn test_deterministic_rejects_non_positive() {
        assert!(matches!(
            deterministic(0, 10).resolve(),
            Err(ConfigError::NonPositive {
                name: "obj_size",
                ..
            })
        ));
        assert!(matches!(
            deterministic(10, -5).resolve(),
            Err(ConfigError::NonPositive {
                name: "max_obj_size",
                ..
            })
        ));
    }

    #[test]
    fn test_deterministic_rejects_object_larger_than_max() {
        assert!(matches!(
            deterministic(20, 10).resolve(),
            Err(ConfigError::ObjectLargerThanMax { .. })
        ));
    }

    #[test]
    fn test_deterministic_resolves() {
        let config = deterministic(1000, 10000).resolve().unwrap();
        assert_eq!(
            config.mode,
            PaddingMode::Deterministic(DeterministicSizes {
                obj_num: 5,
                obj_size: 1000,
                max_obj_size: 10000,
            })
        );
    }

    #[test]
    fn test_location_inherits_root() {
        let file = ConfigFile::from_toml_str(
            r#"
            deterministic = true
            obj_num = 2
            obj_size = 100
            max_obj_size = 1000

            [locations."/static/"]
            css_inlining_enabled = true

            [locations."/static/plain/"]
            deterministic = false
            "#,
        )
        .unwrap();

        let scopes = file.compile().unwrap();

        let root = scopes.for_uri("/index.html");
        assert!(root.is_enabled());
        assert!(!root.css_inlining_enabled);

        let static_scope = scopes.for_uri("/static/page.html");
        assert!(static_scope.is_enabled());
        assert!(static_scope.css_inlining_enabled);

        let plain = scopes.for_uri("/static/plain/page.html");
        assert!(!plain.is_enabled());
    }

    #[test]
    fn test_invalid_location_reports_prefix() {
        let file = ConfigFile::from_toml_str(
            r#"
            [locations."/shop/"]
            deterministic = true
            obj_size = 3
            max_obj_size = 10
            "#,
        )
        .unwrap();

        match file.compile() {
            Err(ConfigError::Location { location, source }) => {
                assert_eq!(location, "/shop/");
                assert!(matches!(*source, ConfigError::NotMultiple { .. }));
            }
            other => panic!("expected location error, got {:?}", other),
        }
        assert_eq!(file.check().len(), 1);
    }

    #[test]
    fn test_check_collects_all_errors() {
        let file = ConfigFile {
            root: ScopeConfig {
                probabilistic: Some(true),
                deterministic: Some(true),
                ..Default::default()
            },
            locations: BTreeMap::from([(
                "/a/".to_string(),
                ScopeConfig {
                    probabilistic: Some(false),
                    obj_size: Some(0),
                    ..Default::default()
                },
            )]),
        };

        assert_eq!(file.check().len(), 2);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = ConfigFile::from_toml_str("obj_size = \"big\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
