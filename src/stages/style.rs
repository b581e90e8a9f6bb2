//! Stylesheet compiler.
//!
//! ```text
//! sass/index.sass ──grass──▶ css ──lightningcss──▶ prefixed, minified css
//!                                        │
//!                                        └──▶ source map (inline base64)
//! ```
//!
//! Imports are resolved through the build context's file provider. A
//! compile error is logged and the previous output is left in place so the
//! watcher keeps running.

use crate::{context::BuildContext, log, vfs::FileProvider};
use anyhow::{Context, Result, anyhow};
use base64::{Engine, engine::general_purpose::STANDARD};
use lightningcss::{
    stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet},
    targets::{Browsers, Targets},
};
use parcel_sourcemap::SourceMap;
use std::{
    io,
    path::{Path, PathBuf},
};

/// Result of one compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compiled {
    Written(PathBuf),
    /// Compilation failed and was logged; the old output is stale.
    Failed,
}

/// Lets grass resolve `@use`/`@import` through a [`FileProvider`].
#[derive(Debug)]
struct SassFs<'a>(&'a dyn FileProvider);

impl grass::Fs for SassFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.0.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.0.is_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.0.read(path)
    }
}

/// Compile the stylesheet entry and write the minified output.
pub fn run(ctx: &BuildContext) -> Result<Compiled> {
    let paths = &ctx.paths;
    let entry = &paths.style_entry;
    if !ctx.fs().is_file(entry) {
        anyhow::bail!("Stylesheet entry {} not found", entry.display());
    }

    let css = match compile(ctx) {
        Ok(css) => css,
        Err(e) => {
            log!("error"; "{}: {:#}", paths.dev_relative(entry).display(), e);
            return Ok(Compiled::Failed);
        }
    };

    ctx.fs()
        .write(&paths.style_output, css.as_bytes())
        .with_context(|| format!("Failed to write {}", paths.style_output.display()))?;
    log!("style"; "{} -> {}",
        paths.dev_relative(entry).display(),
        paths.dev_relative(&paths.style_output).display());

    ctx.reload().notify();
    Ok(Compiled::Written(paths.style_output.clone()))
}

/// Entry → final CSS text, source map comment included when enabled.
pub fn compile(ctx: &BuildContext) -> Result<String> {
    let entry = &ctx.paths.style_entry;
    let css = compile_sass(ctx.fs(), entry)?;

    let style = &ctx.config.build.style;
    let filename = ctx.paths.dev_relative(entry).to_string_lossy().replace('\\', "/");
    let targets = browser_targets(&style.browsers)?;
    let (code, map) = optimize(&css, &filename, targets, style.source_map)?;

    Ok(match map {
        Some(json) => with_inline_map(code, &json),
        None => code,
    })
}

fn compile_sass(fs: &dyn FileProvider, entry: &Path) -> Result<String> {
    let sass_fs = SassFs(fs);
    let options = grass::Options::default()
        .fs(&sass_fs)
        .style(grass::OutputStyle::Expanded);
    grass::from_path(entry, &options).map_err(|e| anyhow!("{e}"))
}

fn browser_targets(queries: &[String]) -> Result<Targets> {
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| anyhow!("invalid browser list {queries:?}: {e}"))?;
    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Prefix and minify `css`, returning the code and the source map JSON.
fn optimize(
    css: &str,
    filename: &str,
    targets: Targets,
    source_map: bool,
) -> Result<(String, Option<String>)> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_owned(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| anyhow!("{e}"))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| anyhow!("{e}"))?;

    let mut map = SourceMap::new("/");
    map.add_source(filename);
    map.set_source_content(0, css)
        .map_err(|e| anyhow!("{e:?}"))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            source_map: source_map.then_some(&mut map),
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("{e}"))?;

    let json = if source_map {
        Some(map.to_json(None).map_err(|e| anyhow!("{e:?}"))?)
    } else {
        None
    };
    Ok((printed.code, json))
}

fn with_inline_map(mut code: String, json: &str) -> String {
    code.push_str("\n/*# sourceMappingURL=data:application/json;base64,");
    code.push_str(&STANDARD.encode(json));
    code.push_str(" */\n");
    code
}
