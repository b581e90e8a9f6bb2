//! Resolved stage paths.
//!
//! ```text
//! SiteConfig
//!     │
//!     └── paths() → SitePaths
//!                     ├── dev / dist                  → /abs/root/dev, /abs/root/dist
//!                     ├── data_pages / aggregate      → dev/data/pages, dev/data/data.json
//!                     ├── markup_pages / markup_root  → dev/templates/pages, dev/templates
//!                     ├── style_* / script_*          → entries, outputs, watch roots
//!                     └── images_* / fonts_*          → dev sources, dist outputs
//! ```

use super::SiteConfig;
use std::path::{Path, PathBuf};

/// Absolute paths for every stage, derived once from [`SiteConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub dev: PathBuf,
    pub dist: PathBuf,

    pub data_pages: PathBuf,
    pub aggregate: PathBuf,

    pub markup_pages: PathBuf,
    /// Registration root for layouts and partials.
    pub markup_root: PathBuf,

    pub style_entry: PathBuf,
    pub style_output: PathBuf,
    pub style_watch: PathBuf,

    pub script_entry: PathBuf,
    pub script_output: PathBuf,
    pub script_watch: PathBuf,

    pub images_source: PathBuf,
    pub images_output: PathBuf,

    pub fonts_source: PathBuf,
    pub fonts_output: PathBuf,
}

impl SitePaths {
    pub fn new(config: &SiteConfig) -> Self {
        let build = &config.build;
        let dev = config.root.join(&build.dev);
        let dist = config.root.join(&build.dist);

        let markup_pages = dev.join(&build.markup.pages);
        let markup_root = markup_pages
            .parent()
            .map_or_else(|| dev.clone(), Path::to_path_buf);

        Self {
            data_pages: dev.join(&build.data.pages),
            aggregate: dev.join(&build.data.aggregate),
            markup_pages,
            markup_root,
            style_entry: dev.join(&build.style.entry),
            style_output: dev.join(&build.style.output),
            style_watch: dev.join(&build.style.watch),
            script_entry: dev.join(&build.script.entry),
            script_output: dev.join(&build.script.output),
            script_watch: dev.join(&build.script.watch),
            images_source: dev.join(&build.images.source),
            images_output: dist.join(&build.images.output),
            fonts_source: dev.join(&build.fonts.source),
            fonts_output: dist.join(&build.fonts.output),
            dev,
            dist,
        }
    }

    /// Path relative to the working directory, falling back to the input.
    pub fn dev_relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.dev).unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(root: &str) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.root = PathBuf::from(root);
        config
    }

    #[test]
    fn test_default_layout() {
        let paths = config_at("/site").paths();

        assert_eq!(paths.dev, PathBuf::from("/site/dev"));
        assert_eq!(paths.dist, PathBuf::from("/site/dist"));
        assert_eq!(paths.aggregate, PathBuf::from("/site/dev/data/data.json"));
        assert_eq!(paths.markup_pages, PathBuf::from("/site/dev/templates/pages"));
        assert_eq!(paths.markup_root, PathBuf::from("/site/dev/templates"));
        assert_eq!(paths.style_output, PathBuf::from("/site/dev/css/style.min.css"));
        assert_eq!(paths.images_output, PathBuf::from("/site/dist/img"));
        assert_eq!(paths.fonts_output, PathBuf::from("/site/dist/fonts"));
    }

    #[test]
    fn test_custom_dirs() {
        let mut config = config_at("/site");
        config.build.dev = "src".into();
        config.build.dist = "public".into();
        config.build.markup.pages = "pages".into();
        let paths = config.paths();

        assert_eq!(paths.script_entry, PathBuf::from("/site/src/js/main.js"));
        assert_eq!(paths.markup_pages, PathBuf::from("/site/src/pages"));
        // Pages directly under dev register the whole dev tree
        assert_eq!(paths.markup_root, PathBuf::from("/site/src"));
        assert_eq!(paths.images_output, PathBuf::from("/site/public/img"));
    }

    #[test]
    fn test_dev_relative() {
        let paths = config_at("/site").paths();
        assert_eq!(
            paths.dev_relative(Path::new("/site/dev/css/style.min.css")),
            Path::new("css/style.min.css")
        );
        assert_eq!(paths.dev_relative(Path::new("/other/x")), Path::new("/other/x"));
    }
}
