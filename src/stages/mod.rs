//! Pipeline stages.
//!
//! Each stage is a free `run(ctx)` function over a [`BuildContext`];
//! [`Task`] names them for the orchestrator and the watcher.

pub mod data;
pub mod dist;
pub mod fonts;
pub mod images;
pub mod markup;
pub mod script;
pub mod style;

use crate::context::BuildContext;
use anyhow::Result;

/// A unit of work the orchestrator or the watcher can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    /// Page data merge followed by template rendering.
    Markup,
    Style,
    Script,
    Images,
    Fonts,
    Clean,
    Assemble,
    /// Browser reload without rebuilding.
    Reload,
}

impl Task {
    pub const ALL: [Self; 8] = [
        Self::Markup,
        Self::Style,
        Self::Script,
        Self::Images,
        Self::Fonts,
        Self::Clean,
        Self::Assemble,
        Self::Reload,
    ];

    /// Task name as used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Markup => "render-markup",
            Self::Style => "compile-stylesheet",
            Self::Script => "bundle-scripts",
            Self::Images => "optimize-images",
            Self::Fonts => "copy-fonts",
            Self::Clean => "clean",
            Self::Assemble => "assemble",
            Self::Reload => "reload",
        }
    }

    pub fn run(self, ctx: &BuildContext) -> Result<()> {
        match self {
            Self::Markup => markup::run(ctx).map(drop),
            Self::Style => style::run(ctx).map(drop),
            Self::Script => script::run(ctx).map(drop),
            Self::Images => images::run(ctx).map(drop),
            Self::Fonts => fonts::run(ctx).map(drop),
            Self::Clean => dist::clean(ctx),
            Self::Assemble => dist::assemble(ctx).map(drop),
            Self::Reload => {
                ctx.reload().notify();
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
