//! Page template renderer.
//!
//! Every `*.html` directly in the pages directory becomes
//! `<dev>/<stem>.html`, rendered by tera with the aggregate page data as its
//! whole variable scope. Everything under the template root is registered
//! so pages can `{% extends %}` and `{% include %}` shared layouts.
//!
//! A page that fails to render is logged and skipped; the others are still
//! written.

use crate::{context::BuildContext, log, stages::data, vfs::files_with_ext};
use anyhow::{Context, Result, bail};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use tera::Tera;

/// Outcome of one render pass.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl RenderReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Merge page data, then render every page.
pub fn run(ctx: &BuildContext) -> Result<RenderReport> {
    data::run(ctx)?;
    render(ctx)
}

/// Render every page template against the current aggregate document.
pub fn render(ctx: &BuildContext) -> Result<RenderReport> {
    let paths = &ctx.paths;
    let pages = files_with_ext(ctx.fs(), &paths.markup_pages, false, &["html"])
        .with_context(|| format!("Failed to list {}", paths.markup_pages.display()))?;

    let tera = load_templates(ctx)?;
    // Read on every pass so data edits are picked up.
    let scope = tera::Context::from_value(data::load_aggregate(ctx)?)
        .context("Aggregate page data must be a JSON object")?;

    let mut report = RenderReport::default();
    for page in pages {
        match render_page(ctx, &tera, &scope, &page) {
            Ok(output) => report.written.push(output),
            Err(e) => {
                log!("error"; "{}: {:#}", paths.dev_relative(&page).display(), e);
                report.failed.push(page);
            }
        }
    }

    log!("markup"; "rendered {} pages{}",
        report.written.len(),
        if report.is_clean() { String::new() } else { format!(", {} failed", report.failed.len()) });

    if ctx.config.build.markup.strict && !report.is_clean() {
        bail!("{} page(s) failed to render", report.failed.len());
    }

    ctx.reload().notify();
    Ok(report)
}

/// Register every text file under the template root, named by its relative
/// path with `/` separators (`pages/home.html`, `layouts/base.html`).
fn load_templates(ctx: &BuildContext) -> Result<Tera> {
    let root = &ctx.paths.markup_root;
    let files = files_with_ext(ctx.fs(), root, true, &["html", "htm", "xml", "txt"])
        .with_context(|| format!("Failed to list {}", root.display()))?;

    let mut sources = Vec::with_capacity(files.len());
    for file in &files {
        let content = ctx
            .fs()
            .read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        sources.push((template_name(root, file), content));
    }

    let mut tera = Tera::default();
    if tera.add_raw_templates(pairs(&sources)).is_ok() {
        return Ok(tera);
    }

    let valid = parseable(sources);
    let mut tera = Tera::default();
    tera.add_raw_templates(pairs(&valid))
        .map_err(anyhow::Error::new)
        .context("Failed to register templates")?;
    Ok(tera)
}

fn pairs(sources: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
    sources.iter().map(|(n, c)| (n.as_str(), c.as_str()))
}

/// Templates that parse and whose `{% extends %}` chain resolves, checked
/// one by one after registering the whole set failed.
///
/// Broken templates are logged and left out, so only the pages depending
/// on them fail.
fn parseable(sources: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut valid = Vec::with_capacity(sources.len());
    let mut parents = Vec::new();

    for (name, content) in sources {
        match Tera::default().add_raw_template(&name, &content) {
            Ok(()) => valid.push((name, content)),
            Err(e) => {
                let missing = match &e.kind {
                    tera::ErrorKind::MissingParent { parent, .. } => Some(parent.clone()),
                    _ => None,
                };
                match missing {
                    Some(parent) => {
                        parents.push((name.clone(), parent));
                        valid.push((name, content));
                    }
                    None => log!("error"; "{name}: {:#}", anyhow::Error::new(e)),
                }
            }
        }
    }

    // Drop children of missing parents until the set is closed.
    loop {
        let names: FxHashSet<String> = valid.iter().map(|(n, _)| n.clone()).collect();
        let before = valid.len();
        valid.retain(|(name, _)| {
            let kept = parents
                .iter()
                .filter(|(child, _)| child == name)
                .all(|(_, parent)| names.contains(parent));
            if !kept {
                log!("error"; "{name}: extends a template that is missing or broken");
            }
            kept
        });
        if valid.len() == before {
            break;
        }
    }
    valid
}

fn template_name(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn render_page(
    ctx: &BuildContext,
    tera: &Tera,
    scope: &tera::Context,
    page: &Path,
) -> Result<PathBuf> {
    let paths = &ctx.paths;
    let name = template_name(&paths.markup_root, page);
    let stem = page
        .file_stem()
        .context("Page template has no file name")?;

    if !tera.get_template_names().any(|n| n == name) {
        bail!("template `{name}` did not parse");
    }
    let html = tera.render(&name, scope).map_err(anyhow::Error::new)?;
    let html = if ctx.config.build.markup.minify {
        minify(html.as_bytes())
    } else {
        html.into_bytes()
    };

    let mut output = paths.dev.join(stem);
    output.set_extension("html");
    ctx.fs()
        .write(&output, &html)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(output)
}

fn minify(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    minify_html::minify(html, &cfg)
}
