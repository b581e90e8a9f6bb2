//! Page data merger.
//!
//! Combines every `*.json` fragment in the page-data directory into the
//! aggregate document consumed by the template renderer. Fragments are
//! taken in filename order, so the later name wins every collision.
//!
//! All fragments are parsed before anything is written: a malformed
//! fragment aborts the stage and leaves the previous aggregate untouched.

use crate::{config::MergePolicy, context::BuildContext, log, vfs::FileProvider, vfs::files_with_ext};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("malformed JSON in `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{0}` must hold a JSON object to be merged")]
    NotAnObject(PathBuf),
}

/// Page-data fragments directly inside `dir`, sorted by name.
pub fn collect_fragments(fs: &dyn FileProvider, dir: &Path) -> Result<Vec<PathBuf>, DataError> {
    files_with_ext(fs, dir, false, &["json"]).map_err(|e| DataError::Io(dir.to_path_buf(), e))
}

/// Parse and merge `paths` in order.
pub fn merge_fragments(
    fs: &dyn FileProvider,
    paths: &[PathBuf],
    policy: MergePolicy,
) -> Result<Value, DataError> {
    let fragments = paths
        .iter()
        .map(|path| parse_fragment(fs, path).map(|value| (path, value)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut merged = Map::new();
    for (path, value) in fragments {
        match policy {
            MergePolicy::Keyed => {
                merged.insert(fragment_key(path), value);
            }
            MergePolicy::Shallow => {
                let Value::Object(object) = value else {
                    return Err(DataError::NotAnObject(path.clone()));
                };
                merged.extend(object);
            }
            MergePolicy::Deep => {
                let Value::Object(object) = value else {
                    return Err(DataError::NotAnObject(path.clone()));
                };
                deep_merge(&mut merged, object);
            }
        }
    }

    Ok(Value::Object(merged))
}

fn parse_fragment(fs: &dyn FileProvider, path: &Path) -> Result<Value, DataError> {
    let bytes = fs
        .read(path)
        .map_err(|e| DataError::Io(path.to_path_buf(), e))?;
    serde_json::from_slice(&bytes).map_err(|source| DataError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `pages/home.json` → `home`
fn fragment_key(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Merge `source` into `target`: objects recurse, anything else is replaced.
fn deep_merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Merge the page-data directory and write the aggregate document.
///
/// Returns the aggregate path.
pub fn run(ctx: &BuildContext) -> Result<PathBuf> {
    let paths = &ctx.paths;
    let fragments = collect_fragments(ctx.fs(), &paths.data_pages)?;
    let merged = merge_fragments(ctx.fs(), &fragments, ctx.config.build.data.merge)?;

    let mut json = serde_json::to_vec_pretty(&merged)?;
    json.push(b'\n');
    ctx.fs()
        .write(&paths.aggregate, &json)
        .with_context(|| format!("Failed to write {}", paths.aggregate.display()))?;

    log!("data"; "merged {} fragments into {}",
        fragments.len(),
        paths.dev_relative(&paths.aggregate).display());
    Ok(paths.aggregate.clone())
}

/// Read the aggregate document; a missing file reads as `{}`.
pub fn load_aggregate(ctx: &BuildContext) -> Result<Value> {
    let path = &ctx.paths.aggregate;
    if !ctx.fs().is_file(path) {
        return Ok(Value::Object(Map::new()));
    }
    let bytes = ctx
        .fs()
        .read(path)
        .map_err(|e| DataError::Io(path.clone(), e))?;
    let value = serde_json::from_slice(&bytes).map_err(|source| DataError::Parse {
        path: path.clone(),
        source,
    })?;
    Ok(value)
}
