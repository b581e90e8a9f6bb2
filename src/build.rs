//! Task orchestration.
//!
//! # Architecture
//!
//! ```text
//! dev
//!     │
//!     ├── initial_build()  ── rayon::join ──┬── render-markup
//!     │                                     ├── compile-stylesheet
//!     │                                     └── bundle-scripts
//!     │
//!     └── serve::serve() ──► dev server + watcher + live reload
//!
//! build
//!     │
//!     └── clean ──► optimize-images ──► copy-fonts ──► assemble
//! ```

use crate::{
    cli::Commands,
    config::SiteConfig,
    context::BuildContext,
    log,
    reload::ReloadHub,
    serve,
    stages::Task,
    watch,
};
use anyhow::{Context, Result};
use std::{net::IpAddr, sync::Arc};

/// Production task order.
pub const PRODUCTION: [Task; 4] = [Task::Clean, Task::Images, Task::Fonts, Task::Assemble];

/// Run the task `command` names.
pub fn run(command: &Commands, config: SiteConfig) -> Result<()> {
    match command {
        Commands::Dev { .. } => dev(config),
        Commands::Serve { .. } => {
            let ctx = with_reload_hub(config)?;
            serve::serve(&ctx, ctx.config.serve.watch)
        }
        Commands::Watch => watch::watch_blocking(&BuildContext::on_disk(config)),
        Commands::Build => production(&BuildContext::on_disk(config)),
        Commands::RenderMarkup => single(config, Task::Markup),
        Commands::CompileStylesheet => single(config, Task::Style),
        Commands::BundleScripts => single(config, Task::Script),
        Commands::CopyFonts => single(config, Task::Fonts),
        Commands::OptimizeImages => single(config, Task::Images),
        Commands::Clean => single(config, Task::Clean),
    }
}

fn single(config: SiteConfig, task: Task) -> Result<()> {
    task.run(&BuildContext::on_disk(config))
        .with_context(|| format!("{task} failed"))
}

/// Initial build, then serve with the watcher.
fn dev(config: SiteConfig) -> Result<()> {
    let ctx = with_reload_hub(config)?;
    initial_build(&ctx);
    serve::serve(&ctx, ctx.config.serve.watch)
}

/// Context whose reload hub listens next to the dev server.
fn with_reload_hub(config: SiteConfig) -> Result<BuildContext> {
    let serve = &config.serve;
    let interface: IpAddr = serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", serve.interface))?;
    let hub = ReloadHub::bind(interface, serve.reload_port())?;
    Ok(BuildContext::on_disk(config).with_reload(Arc::new(hub)))
}

/// Render, compile and bundle concurrently. Failures are logged per task;
/// the dev server still starts.
///
/// Returns the tasks that failed.
pub fn initial_build(ctx: &BuildContext) -> Vec<Task> {
    let (markup, (style, script)) = rayon::join(
        || Task::Markup.run(ctx),
        || rayon::join(|| Task::Style.run(ctx), || Task::Script.run(ctx)),
    );

    let mut failed = Vec::new();
    for (task, result) in [(Task::Markup, markup), (Task::Style, style), (Task::Script, script)] {
        if let Err(e) = result {
            log!("error"; "{task} failed: {e:#}");
            failed.push(task);
        }
    }
    failed
}

/// Clean, optimize images, copy fonts, assemble. Stops at the first failure.
pub fn production(ctx: &BuildContext) -> Result<()> {
    for task in PRODUCTION {
        task.run(ctx).with_context(|| format!("{task} failed"))?;
    }
    log!("dist"; "build complete: {}", ctx.paths.dist.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{memory_config, memory_context};
    use crate::vfs::{DiskFs, FileProvider};
    use std::path::Path;

    #[test]
    fn test_initial_build_produces_dev_artifacts() {
        let (ctx, fs) = memory_context(
            memory_config(),
            [
                ("templates/pages/index.html", "<h1>{{ title }}</h1>"),
                ("data/pages/home.json", r#"{"title":"Home"}"#),
                ("sass/index.sass", ".a\n  color: red\n"),
                ("js/main.js", "function hello() { return 1 + 2; }"),
            ],
        );

        assert!(initial_build(&ctx).is_empty());

        let paths = &ctx.paths;
        assert_eq!(fs.read_to_string(&paths.dev.join("index.html")).unwrap(), "<h1>Home</h1>");
        assert!(fs.read_to_string(&paths.style_output).unwrap().starts_with(".a{color:red}"));
        assert!(fs.is_file(&paths.script_output));
        assert!(fs.is_file(&paths.aggregate));
    }

    #[test]
    fn test_initial_build_isolates_failures() {
        let (ctx, fs) = memory_context(
            memory_config(),
            [
                ("templates/pages/index.html", "ok"),
                ("sass/index.sass", ".a\n  color: red\n"),
                ("js/main.js", "function ("),
            ],
        );

        assert_eq!(initial_build(&ctx), vec![Task::Script]);
        assert!(fs.is_file(&ctx.paths.style_output));
        assert!(fs.is_file(&ctx.paths.dev.join("index.html")));
    }

    #[test]
    fn test_production_build_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let write = |rel: &str, content: &[u8]| DiskFs.write(&root.join(rel), content).unwrap();

        write("dev/index.html", b"<p>home</p>");
        write("dev/css/style.min.css", b"a{}");
        write("dev/js/main.min.js", b"x()");
        write("dev/js/main.js", b"x ( )");
        write("dev/img/icons/logo.svg", b"<svg><!-- c --><g id=\"g\"/></svg>");
        write("dev/img/readme.txt", b"notes");
        write("dev/fonts/inter.woff2", b"woff2");
        write("dist/stale.html", b"old");

        let mut config = memory_config();
        config.root = root.to_path_buf();
        let ctx = BuildContext::on_disk(config);

        production(&ctx).unwrap();

        let dist = root.join("dist");
        let mut files: Vec<_> = DiskFs
            .list_files(&dist, true)
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(&dist).unwrap().to_path_buf())
            .collect();
        files.sort();
        assert_eq!(
            files,
            [
                "css/style.min.css",
                "fonts/inter.woff2",
                "img/icons/logo.svg",
                "img/readme.txt",
                "index.html",
                "js/main.min.js",
            ]
            .map(|p| Path::new(p).to_path_buf())
        );
        assert_eq!(
            std::fs::read_to_string(dist.join("img/icons/logo.svg")).unwrap(),
            "<svg><g id=\"g\"/></svg>"
        );
    }

    #[test]
    fn test_production_build_needs_compiled_assets() {
        let (ctx, _) = memory_context(memory_config(), [("index.html", "x")]);
        let err = production(&ctx).unwrap_err();
        assert!(format!("{err:#}").contains("assemble failed"));
    }
}
