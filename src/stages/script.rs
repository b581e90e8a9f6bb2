//! Script bundler: minifies the single script entry.

use crate::{context::BuildContext, log};
use anyhow::{Context, Result};
use minify_js::{Session, TopLevelMode, minify};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script entry `{0}` not found")]
    MissingEntry(PathBuf),

    #[error("syntax error in `{path}`: {message}")]
    Syntax { path: PathBuf, message: String },
}

/// Minify `source`. `path` only labels the error.
pub fn minify_source(path: &std::path::Path, source: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let session = Session::new();
    let mut out = Vec::with_capacity(source.len() / 2);
    minify(&session, TopLevelMode::Global, source, &mut out).map_err(|e| ScriptError::Syntax {
        path: path.to_path_buf(),
        message: format!("{e:?}"),
    })?;
    Ok(out)
}

/// Minify the entry into the bundle output.
pub fn run(ctx: &BuildContext) -> Result<PathBuf> {
    let paths = &ctx.paths;
    let entry = &paths.script_entry;
    if !ctx.fs().is_file(entry) {
        return Err(ScriptError::MissingEntry(entry.clone()).into());
    }

    let source = ctx
        .fs()
        .read(entry)
        .with_context(|| format!("Failed to read {}", entry.display()))?;
    let minified = minify_source(entry, &source)?;

    ctx.fs()
        .write(&paths.script_output, &minified)
        .with_context(|| format!("Failed to write {}", paths.script_output.display()))?;
    log!("script"; "{} -> {} ({} -> {} bytes)",
        paths.dev_relative(entry).display(),
        paths.dev_relative(&paths.script_output).display(),
        source.len(),
        minified.len());

    ctx.reload().notify();
    Ok(paths.script_output.clone())
}
