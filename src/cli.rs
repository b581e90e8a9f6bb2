//! Command-line interface definitions.
//!
//! Every pipeline task is one subcommand; running without a subcommand is
//! the `dev` task.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stagehand static asset pipeline CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name (default: stagehand.toml)
    #[arg(short = 'C', long, default_value = "stagehand.toml")]
    pub config: PathBuf,

    /// Task to run; defaults to `dev`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Dev server overrides
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Interface to bind on
    #[arg(short, long)]
    pub interface: Option<String>,

    /// HTTP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Start the watcher together with the server
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,
}

/// Available tasks
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render markup, compile stylesheet, bundle scripts, then serve and watch
    #[command(visible_alias = "default")]
    Dev {
        #[command(flatten)]
        serve: ServeArgs,
    },

    /// Merge page data and render page templates into the working directory
    RenderMarkup,

    /// Compile the stylesheet entry into minified, prefixed CSS
    CompileStylesheet,

    /// Minify the script entry
    BundleScripts,

    /// Copy fonts into the distribution directory
    CopyFonts,

    /// Optimize the image tree into the distribution directory
    OptimizeImages,

    /// Serve the working directory with live reload
    #[command(visible_alias = "start-dev-server")]
    Serve {
        #[command(flatten)]
        serve: ServeArgs,
    },

    /// Watch sources and re-run the affected tasks
    #[command(visible_alias = "start-watcher")]
    Watch,

    /// Delete the distribution directory
    #[command(visible_alias = "clean-distribution")]
    Clean,

    /// Clean, optimize images, copy fonts, assemble the distribution
    #[command(visible_alias = "full-production-build")]
    Build,
}

impl Cli {
    /// The requested task, `dev` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Dev {
            serve: ServeArgs::default(),
        })
    }
}
