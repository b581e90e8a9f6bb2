//! Pipeline configuration from `stagehand.toml`.
//!
//! # Sections
//!
//! | Section            | Purpose                                     |
//! |--------------------|---------------------------------------------|
//! | `[build]`          | Working and distribution directories        |
//! | `[build.data]`     | Page data fragments, aggregate, merge policy|
//! | `[build.markup]`   | Page templates                              |
//! | `[build.style]`    | Stylesheet entry, browser targets           |
//! | `[build.script]`   | Script entry                                |
//! | `[build.images]`   | Image tree and encoder settings             |
//! | `[build.fonts]`    | Font tree                                   |
//! | `[serve]`          | Dev server, live reload, watcher            |
//!
//! A missing config file means "all defaults".

mod build;
pub mod defaults;
mod error;
mod paths;
mod serve;

pub use build::MergePolicy;
pub use error::ConfigError;
pub use paths::SitePaths;

use build::BuildConfig;
use serve::ServeConfig;

use crate::{
    cli::{Cli, Commands},
    log,
};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

/// Root configuration structure representing stagehand.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute project root (set after loading)
    #[serde(skip)]
    pub root: PathBuf,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Resolve root and config file from the CLI, load, apply overrides, validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = Self::normalize_path(cli.root.as_deref().unwrap_or(Path::new("./")));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            log!("warn"; "{} not found, using defaults", cli.config.display());
            Self::default()
        };
        config.root = root;
        config.config_path = config_path;
        config.update_with_cli(cli);
        config.validate()?;

        Ok(config)
    }

    /// Resolve every stage path against the root.
    pub fn paths(&self) -> SitePaths {
        SitePaths::new(self)
    }

    /// Apply `serve` / `dev` flag overrides.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let args = match &cli.command {
            Some(Commands::Dev { serve } | Commands::Serve { serve }) => serve,
            _ => return,
        };
        Self::update_option(&mut self.serve.interface, args.interface.as_ref());
        Self::update_option(&mut self.serve.port, args.port.as_ref());
        Self::update_option(&mut self.serve.watch, args.watch.as_ref());
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Absolute form of `path`, canonical when it exists.
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Reject settings no stage can honor.
    pub fn validate(&self) -> Result<()> {
        let style = &self.build.style;
        let entry_ext = style.entry.extension().and_then(|e| e.to_str());
        if !matches!(entry_ext, Some("sass" | "scss" | "css")) {
            bail!(ConfigError::StyleEntry(style.entry.clone()));
        }

        if style.grid {
            bail!(ConfigError::Validation(
                "[build.style.grid] IE grid prefixes are not supported, lightningcss cannot emit `-ms-grid`".into()
            ));
        }

        if style.browsers.iter().all(|q| q.trim().is_empty()) {
            bail!(ConfigError::Validation(
                "[build.style.browsers] must have at least one query".into()
            ));
        }

        let images = &self.build.images;
        if !(1..=100).contains(&images.jpeg_quality) {
            bail!(ConfigError::Validation(
                "[build.images.jpeg_quality] must be between 1 and 100".into()
            ));
        }
        if images.png_level > 6 {
            bail!(ConfigError::Validation(
                "[build.images.png_level] must be between 0 and 6".into()
            ));
        }

        if self.serve.interface.parse::<IpAddr>().is_err() {
            bail!(ConfigError::Validation(format!(
                "[serve.interface] `{}` is not an IP address",
                self.serve.interface
            )));
        }

        if self.build.dev == self.build.dist {
            bail!(ConfigError::Validation(
                "[build.dev] and [build.dist] must differ".into()
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_str() {
        let config = SiteConfig::from_str(
            r#"
            [build]
            dev = "src"
            dist = "public"
        "#,
        )
        .unwrap();

        assert_eq!(config.build.dev, PathBuf::from("src"));
        assert_eq!(config.build.dist, PathBuf::from("public"));
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result = SiteConfig::from_str("[build\ndev = 1");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_from_path_missing() {
        let result = SiteConfig::from_path(Path::new("/nonexistent/stagehand.toml"));
        assert!(matches!(result, Err(ConfigError::Io(..))));
    }

    #[test]
    fn test_unknown_top_level_field_rejection() {
        let result = SiteConfig::from_str(
            r#"
            [deploy]
            provider = "github"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_validates() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_style_entry_extension() {
        let mut config = SiteConfig::default();
        config.build.style.entry = "less/index.less".into();
        let err = config.validate().unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
        assert!(err.to_string().contains("index.less"));

        config.build.style.entry = "scss/index.scss".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = SiteConfig::default();
        config.build.images.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.build.images.png_level = 7;
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.build.style.browsers = vec![" ".into()];
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.serve.interface = "localhost:3000".into();
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.build.dist = "dev".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_grid_prefixes() {
        let mut config = SiteConfig::from_str("[build.style]\ngrid = true").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("-ms-grid"));

        config.build.style.grid = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_serve() {
        let cli = Cli::parse_from(["stagehand", "serve", "--port", "8081", "-i", "0.0.0.0"]);
        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.serve.port, 8081);
        assert_eq!(config.serve.interface, "0.0.0.0");
        assert!(config.serve.watch);
    }

    #[test]
    fn test_cli_overrides_ignored_for_build() {
        let cli = Cli::parse_from(["stagehand", "build"]);
        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.serve.port, 3000);
    }

    #[test]
    fn test_load_from_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("stagehand.toml"),
            "[serve]\nport = 4100\n",
        )
        .unwrap();

        let root = dir.path().to_string_lossy().into_owned();
        let cli = Cli::parse_from(["stagehand", "--root", root.as_str(), "build"]);
        let config = SiteConfig::load(&cli).unwrap();

        assert_eq!(config.serve.port, 4100);
        assert!(config.root.is_absolute());
        assert_eq!(config.paths().dev, config.root.join("dev"));
    }
}
