//! `[build]` section configuration.
//!
//! Every stage path is relative: sources and working outputs to
//! `build.dev`, distribution outputs to `build.dist`.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Enums
// ============================================================================

/// How page-data fragments combine into the aggregate document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Recursive object merge; the later fragment wins on any other collision.
    #[default]
    Deep,
    /// Top-level keys only; the later fragment replaces whole values.
    Shallow,
    /// Each fragment is stored under its file stem (`home.json` → `home`).
    Keyed,
}

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in stagehand.toml.
///
/// # Example
/// ```toml
/// [build]
/// dev = "dev"
/// dist = "dist"
///
/// [build.style]
/// browsers = ["last 2 versions", "> 1%"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Working directory: source root and dev-server root.
    #[serde(default = "defaults::build::dev")]
    #[educe(Default = defaults::build::dev())]
    pub dev: PathBuf,

    /// Distribution directory, wiped by `clean`.
    #[serde(default = "defaults::build::dist")]
    #[educe(Default = defaults::build::dist())]
    pub dist: PathBuf,

    pub data: DataConfig,
    pub markup: MarkupConfig,
    pub style: StyleConfig,
    pub script: ScriptConfig,
    pub images: ImagesConfig,
    pub fonts: FontsConfig,
}

/// `[build.data]` - page data fragments and their aggregate.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Directory of per-page `*.json` fragments.
    #[serde(default = "defaults::build::data::pages")]
    #[educe(Default = defaults::build::data::pages())]
    pub pages: PathBuf,

    /// Aggregate document written by the merger.
    #[serde(default = "defaults::build::data::aggregate")]
    #[educe(Default = defaults::build::data::aggregate())]
    pub aggregate: PathBuf,

    pub merge: MergePolicy,
}

/// `[build.markup]` - page templates.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    /// Directory of page templates; its parent holds layouts and partials.
    #[serde(default = "defaults::build::markup::pages")]
    #[educe(Default = defaults::build::markup::pages())]
    pub pages: PathBuf,

    /// Minify rendered HTML.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,

    /// Fail the stage when any page fails to render.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub strict: bool,
}

/// `[build.style]` - stylesheet entry point and prefixing targets.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    #[serde(default = "defaults::build::style::entry")]
    #[educe(Default = defaults::build::style::entry())]
    pub entry: PathBuf,

    #[serde(default = "defaults::build::style::output")]
    #[educe(Default = defaults::build::style::output())]
    pub output: PathBuf,

    /// Directory whose changes recompile the stylesheet.
    #[serde(default = "defaults::build::style::watch")]
    #[educe(Default = defaults::build::style::watch())]
    pub watch: PathBuf,

    /// Browserslist queries driving vendor prefixes.
    #[serde(default = "defaults::build::style::browsers")]
    #[educe(Default = defaults::build::style::browsers())]
    pub browsers: Vec<String>,

    /// IE `-ms-grid` prefixes. Unsupported, `true` fails validation.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub grid: bool,

    /// Append an inline source map.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub source_map: bool,
}

/// `[build.script]` - script entry point.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptConfig {
    #[serde(default = "defaults::build::script::entry")]
    #[educe(Default = defaults::build::script::entry())]
    pub entry: PathBuf,

    #[serde(default = "defaults::build::script::output")]
    #[educe(Default = defaults::build::script::output())]
    pub output: PathBuf,

    #[serde(default = "defaults::build::script::watch")]
    #[educe(Default = defaults::build::script::watch())]
    pub watch: PathBuf,
}

/// `[build.images]` - image optimization.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Source tree, relative to `build.dev`.
    #[serde(default = "defaults::build::images::source")]
    #[educe(Default = defaults::build::images::source())]
    pub source: PathBuf,

    /// Output tree, relative to `build.dist`.
    #[serde(default = "defaults::build::images::output")]
    #[educe(Default = defaults::build::images::output())]
    pub output: PathBuf,

    /// JPEG re-encode quality (1-100).
    #[serde(default = "defaults::build::images::jpeg_quality")]
    #[educe(Default = defaults::build::images::jpeg_quality())]
    pub jpeg_quality: u8,

    /// PNG optimization preset (0-6).
    #[serde(default = "defaults::build::images::png_level")]
    #[educe(Default = defaults::build::images::png_level())]
    pub png_level: u8,
}

/// `[build.fonts]` - verbatim font copy.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    #[serde(default = "defaults::build::fonts::source")]
    #[educe(Default = defaults::build::fonts::source())]
    pub source: PathBuf,

    #[serde(default = "defaults::build::fonts::output")]
    #[educe(Default = defaults::build::fonts::output())]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_build_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.dev, PathBuf::from("dev"));
        assert_eq!(config.build.dist, PathBuf::from("dist"));
        assert_eq!(config.build.data.merge, MergePolicy::Deep);
        assert_eq!(config.build.style.entry, PathBuf::from("sass/index.sass"));
        assert_eq!(config.build.style.browsers, vec!["last 10 versions"]);
        assert!(!config.build.style.grid);
        assert_eq!(config.build.script.output, PathBuf::from("js/main.min.js"));
        assert_eq!(config.build.images.jpeg_quality, 80);
        assert_eq!(config.build.images.png_level, 5);
        assert!(!config.build.markup.minify);
    }

    #[test]
    fn test_cascade_is_not_a_style_key() {
        assert!(toml::from_str::<SiteConfig>("[build.style]\ncascade = true").is_err());
    }

    #[test]
    fn test_merge_policy_parsing() {
        let config: SiteConfig = toml::from_str(
            r#"
            [build.data]
            merge = "keyed"
        "#,
        )
        .unwrap();
        assert_eq!(config.build.data.merge, MergePolicy::Keyed);

        let result: Result<SiteConfig, _> = toml::from_str(
            r#"
            [build.data]
            merge = "union"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_style_override() {
        let config: SiteConfig = toml::from_str(
            r#"
            [build.style]
            entry = "scss/main.scss"
            source_map = false
        "#,
        )
        .unwrap();

        assert_eq!(config.build.style.entry, PathBuf::from("scss/main.scss"));
        assert!(!config.build.style.source_map);
        assert_eq!(config.build.style.output, PathBuf::from("css/style.min.css"));
    }

    #[test]
    fn test_unknown_build_field_rejection() {
        let result: Result<SiteConfig, _> = toml::from_str(
            r#"
            [build.images]
            webp = true
        "#,
        );
        assert!(result.is_err());
    }
}
