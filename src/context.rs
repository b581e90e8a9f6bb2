//! Per-invocation build context.
//!
//! Built once in `main` and handed to every stage: configuration, resolved
//! paths, the file provider and the live reload hub. Nothing in the
//! pipeline reads global state.

use crate::{
    config::{SiteConfig, SitePaths},
    reload::ReloadHub,
    vfs::{DiskFs, FileProvider},
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config: Arc<SiteConfig>,
    pub paths: Arc<SitePaths>,
    fs: Arc<dyn FileProvider>,
    reload: Arc<ReloadHub>,
}

impl BuildContext {
    pub fn new(config: SiteConfig, fs: Arc<dyn FileProvider>, reload: Arc<ReloadHub>) -> Self {
        let paths = config.paths();
        Self {
            config: Arc::new(config),
            paths: Arc::new(paths),
            fs,
            reload,
        }
    }

    /// Real filesystem, no live reload listener.
    pub fn on_disk(config: SiteConfig) -> Self {
        Self::new(config, Arc::new(DiskFs), Arc::new(ReloadHub::detached()))
    }

    /// Same context, broadcasting through `reload`.
    pub fn with_reload(mut self, reload: Arc<ReloadHub>) -> Self {
        self.reload = reload;
        self
    }

    pub fn fs(&self) -> &dyn FileProvider {
        self.fs.as_ref()
    }

    pub fn reload(&self) -> &ReloadHub {
        &self.reload
    }
}
