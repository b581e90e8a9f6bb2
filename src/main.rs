//! Stagehand - a static site asset pipeline with a live-reloading dev server.

mod build;
mod cli;
mod config;
mod context;
mod logger;
mod reload;
mod serve;
mod stages;
mod vfs;
mod watch;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::SiteConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SiteConfig::load(&cli)?;
    build::run(&cli.command(), config)
}
