//! Site configuration module.
//!
//! Handles loading, validating, and merging the site's `config.toml`. The file
//! lives at the site root, next to the source directory:
//!
//! ```text
//! site/
//! ├── config.toml          # Optional; every key has a default
//! ├── src/                 # Source root
//! └── build/               # Output root (generated)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source = "src"            # Source root, relative to the site root
//! output = "build"          # Output root, relative to the site root
//!
//! [metadata]
//! style = "toml"            # "toml" (+++ / key = value) or "yaml" (--- / key: value)
//!
//! [paths]
//! style = "pretty"          # "pretty" (post/index.html) or "flat" (post.html)
//!
//! [layout]
//! name = "layout.tmpl"      # Per-directory layout template file name
//!
//! [minify]
//! html = true               # Minify rendered pages and templates
//! assets = true             # Minify .css, .js and .svg files
//!
//! [build]
//! clean = true              # Remove the output root before writing
//! on_failure = "keep"       # "keep" or "remove" partial output of a failed build
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [serve]
//! address = "localhost:8080"
//! watch = false
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file at the site root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Source root, relative to the site root.
    pub source: String,
    /// Output root, relative to the site root.
    pub output: String,
    /// Metadata block syntax.
    pub metadata: MetadataConfig,
    /// How document output paths are shaped.
    pub paths: PathsConfig,
    /// Layout template lookup.
    pub layout: LayoutConfig,
    /// Minification switches.
    pub minify: MinifyConfig,
    /// Build behaviour around the output root.
    pub build: BuildConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Preview server settings.
    pub serve: ServeConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source: "src".to_string(),
            output: "build".to_string(),
            metadata: MetadataConfig::default(),
            paths: PathsConfig::default(),
            layout: LayoutConfig::default(),
            minify: MinifyConfig::default(),
            build: BuildConfig::default(),
            processing: ProcessingConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::Validation("source must not be empty".into()));
        }
        if self.output.trim().is_empty() {
            return Err(ConfigError::Validation("output must not be empty".into()));
        }
        if Path::new(&self.source) == Path::new(&self.output) {
            return Err(ConfigError::Validation(
                "source and output must be different directories".into(),
            ));
        }
        let name = &self.layout.name;
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "layout.name must be a plain file name".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Which metadata block syntax documents use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataStyle {
    /// `+++` delimiters, `key = value` lines.
    #[default]
    Toml,
    /// `---` delimiters, `key: value` lines.
    Yaml,
}

impl MetadataStyle {
    /// Line that opens and closes the block.
    pub fn delimiter(self) -> &'static str {
        match self {
            MetadataStyle::Toml => "+++",
            MetadataStyle::Yaml => "---",
        }
    }

    /// Separator between key and value.
    pub fn separator(self) -> char {
        match self {
            MetadataStyle::Toml => '=',
            MetadataStyle::Yaml => ':',
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub style: MetadataStyle,
}

/// Shape of the file written for a markdown document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// `posts/hello.md` → `posts/hello/index.html`, served at `/posts/hello/`.
    #[default]
    Pretty,
    /// `posts/hello.md` → `posts/hello.html`, served at `/posts/hello.html`.
    Flat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub style: PathStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// File name of the layout template looked up in each document's directory.
    pub name: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            name: "layout.tmpl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyConfig {
    /// Minify pages produced from layouts and stand-alone templates.
    pub html: bool,
    /// Minify stylesheets, scripts and SVG files.
    pub assets: bool,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self {
            html: true,
            assets: true,
        }
    }
}

/// What happens to already-written output when a build fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Leave whatever was written in place.
    #[default]
    Keep,
    /// Delete the output root.
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Remove the output root before materializing, so files whose source
    /// was deleted do not linger.
    pub clean: bool,
    pub on_failure: FailurePolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            clean: true,
            on_failure: FailurePolicy::Keep,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of build workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    /// Address the preview server binds to.
    pub address: String,
    /// Rebuild when the source tree changes.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8080".to_string(),
            watch: false,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from the site root as a raw TOML value.
///
/// Returns `Ok(None)` if there is no config file.
pub fn load_raw_config(site_root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = site_root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the site config, falling back to stock defaults for anything unset.
pub fn load_config(site_root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(site_root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command and written by `init`.
pub fn stock_config_toml() -> &'static str {
    r##"# styx configuration
# ==================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Source root, relative to this file.
source = "src"

# Output root, relative to this file. Must not be inside the source root.
output = "build"

# ---------------------------------------------------------------------------
# Metadata block at the top of markdown files
# ---------------------------------------------------------------------------
[metadata]
# "toml":  +++ / title = "Hello" / +++
# "yaml":  --- / title: Hello / ---
style = "toml"

# ---------------------------------------------------------------------------
# Output paths for markdown documents
# ---------------------------------------------------------------------------
[paths]
# "pretty": posts/hello.md -> posts/hello/index.html (/posts/hello/)
# "flat":   posts/hello.md -> posts/hello.html       (/posts/hello.html)
style = "pretty"

# ---------------------------------------------------------------------------
# Layout templates
# ---------------------------------------------------------------------------
[layout]
# Every directory holding markdown files needs a layout with this name.
name = "layout.tmpl"

# ---------------------------------------------------------------------------
# Minification
# ---------------------------------------------------------------------------
[minify]
# Rendered pages and stand-alone .html templates.
html = true
# Stylesheets, scripts and SVG images.
assets = true

# ---------------------------------------------------------------------------
# Build
# ---------------------------------------------------------------------------
[build]
# Remove the output root before writing a fresh tree.
clean = true
# What to do with partial output when a build fails: "keep" or "remove".
on_failure = "keep"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel build workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Preview server
# ---------------------------------------------------------------------------
[serve]
address = "localhost:8080"
# Rebuild whenever the source tree changes.
watch = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_site_dirs() {
        let config = SiteConfig::default();
        assert_eq!(config.source, "src");
        assert_eq!(config.output, "build");
        assert_eq!(config.layout.name, "layout.tmpl");
    }

    #[test]
    fn default_styles() {
        let config = SiteConfig::default();
        assert_eq!(config.metadata.style, MetadataStyle::Toml);
        assert_eq!(config.paths.style, PathStyle::Pretty);
        assert_eq!(config.build.on_failure, FailurePolicy::Keep);
        assert!(config.build.clean);
        assert!(config.minify.html);
        assert!(config.minify.assets);
    }

    #[test]
    fn metadata_style_markers() {
        assert_eq!(MetadataStyle::Toml.delimiter(), "+++");
        assert_eq!(MetadataStyle::Toml.separator(), '=');
        assert_eq!(MetadataStyle::Yaml.delimiter(), "---");
        assert_eq!(MetadataStyle::Yaml.separator(), ':');
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[paths]
style = "flat"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.paths.style, PathStyle::Flat);
        // Defaults preserved
        assert_eq!(config.metadata.style, MetadataStyle::Toml);
        assert_eq!(config.source, "src");
    }

    #[test]
    fn parse_enum_values() {
        let toml = r#"
[metadata]
style = "yaml"

[build]
on_failure = "remove"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.metadata.style, MetadataStyle::Yaml);
        assert_eq!(config.build.on_failure, FailurePolicy::Remove);
    }

    #[test]
    fn unknown_enum_value_rejected() {
        let toml = r#"
[paths]
style = "ugly"
"#;
        let result: Result<SiteConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output, "build");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
output = "public"

[minify]
html = false
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output, "public");
        assert!(!config.minify.html);
        // Unspecified values should be defaults
        assert!(config.minify.assets);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[minify]
htm = true
"#,
        )
        .unwrap();

        let result = load_config(tmp.path());
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[layouts]\nname = \"x\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_same_source_and_output() {
        let mut config = SiteConfig::default();
        config.output = "src".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("different"));
    }

    #[test]
    fn validate_layout_name_with_separator() {
        let mut config = SiteConfig::default();
        config.layout.name = "layouts/main.tmpl".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_workers() {
        let mut config = SiteConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "source = \"\"\n").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[minify]
html = true
assets = true
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[minify]
assets = false
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let minify = merged.get("minify").unwrap();
        assert_eq!(minify.get("assets").unwrap().as_bool(), Some(false));
        assert_eq!(minify.get("html").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"output = "build""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"output = "public""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("output").unwrap().as_str(), Some("public"));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.source, "src");
        assert_eq!(config.output, "build");
        assert_eq!(config.metadata.style, MetadataStyle::Toml);
        assert_eq!(config.paths.style, PathStyle::Pretty);
        assert_eq!(config.layout.name, "layout.tmpl");
        assert_eq!(config.processing.max_processes, None);
        assert_eq!(config.serve.address, "localhost:8080");
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[metadata]",
            "[paths]",
            "[layout]",
            "[minify]",
            "[build]",
            "[processing]",
            "[serve]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        assert!(val.get("metadata").is_some());
        assert!(val.get("build").is_some());
        assert!(val.get("processing").is_some());
    }
}
