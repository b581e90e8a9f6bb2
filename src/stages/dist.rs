//! Distribution directory: clean and assemble.
//!
//! ```text
//! dev/                        dist/
//!   *.html            ──▶       *.html
//!   css/style.min.css ──▶       css/style.min.css
//!   js/main.min.js    ──▶       js/main.min.js
//!   img/**            ──▶       img/**    (images stage)
//!   fonts/*           ──▶       fonts/*   (fonts stage)
//! ```

use crate::{context::BuildContext, log, vfs::files_with_ext};
use anyhow::{Context, Result, bail};
use std::path::PathBuf;

/// Remove the distribution directory. A missing directory is fine.
pub fn clean(ctx: &BuildContext) -> Result<()> {
    let dist = &ctx.paths.dist;
    ctx.fs()
        .remove_dir_all(dist)
        .with_context(|| format!("Failed to remove {}", dist.display()))?;
    log!("dist"; "cleaned {}", dist.display());
    Ok(())
}

/// Copy rendered pages and compiled assets into the distribution.
///
/// Returns the copied destination paths.
pub fn assemble(ctx: &BuildContext) -> Result<Vec<PathBuf>> {
    let paths = &ctx.paths;

    for (artifact, task) in [
        (&paths.style_output, "compile-stylesheet"),
        (&paths.script_output, "bundle-scripts"),
    ] {
        if !ctx.fs().is_file(artifact) {
            bail!(
                "{} is missing, run `{task}` first",
                paths.dev_relative(artifact).display()
            );
        }
    }

    let mut sources = files_with_ext(ctx.fs(), &paths.dev, false, &["html"])
        .with_context(|| format!("Failed to list {}", paths.dev.display()))?;
    sources.push(paths.style_output.clone());
    sources.push(paths.script_output.clone());

    let mut copied = Vec::with_capacity(sources.len());
    for source in &sources {
        let target = paths.dist.join(paths.dev_relative(source));
        ctx.fs()
            .copy(source, &target)
            .with_context(|| format!("Failed to copy {}", source.display()))?;
        copied.push(target);
    }

    log!("dist"; "assembled {} files into {}", copied.len(), paths.dist.display());
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{memory_config, memory_context};
    use crate::vfs::FileProvider;
    use std::path::Path;

    fn dev_tree() -> [(&'static str, &'static str); 7] {
        [
            ("index.html", "<p>home</p>"),
            ("about.html", "<p>about</p>"),
            ("css/style.min.css", "a{}"),
            ("js/main.min.js", "x()"),
            ("js/main.js", "x ( )"),
            ("sass/index.sass", "a\n  b: c"),
            ("templates/pages/index.html", "{{ title }}"),
        ]
    }

    #[test]
    fn test_assemble_copies_exact_file_set() {
        let (ctx, fs) = memory_context(memory_config(), dev_tree());
        let dist = &ctx.paths.dist;

        assemble(&ctx).unwrap();

        let in_dist: Vec<_> = fs
            .paths()
            .into_iter()
            .filter(|p| p.starts_with(dist))
            .collect();
        assert_eq!(
            in_dist,
            vec![
                dist.join("about.html"),
                dist.join("css/style.min.css"),
                dist.join("index.html"),
                dist.join("js/main.min.js"),
            ]
        );
        assert_eq!(fs.read(&dist.join("index.html")).unwrap(), b"<p>home</p>");
    }

    #[test]
    fn test_assemble_requires_compiled_assets() {
        let (ctx, _) = memory_context(memory_config(), [("index.html", "x"), ("js/main.min.js", "y")]);

        let err = assemble(&ctx).unwrap_err().to_string();
        assert!(err.contains("compile-stylesheet"), "{err}");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let (ctx, fs) = memory_context(memory_config(), dev_tree());
        assemble(&ctx).unwrap();

        clean(&ctx).unwrap();
        clean(&ctx).unwrap();

        assert!(!fs.is_dir(&ctx.paths.dist));
        assert!(fs.is_file(&ctx.paths.dev.join("index.html")));
    }

    #[test]
    fn test_clean_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = memory_config();
        config.root = dir.path().to_path_buf();
        let ctx = BuildContext::on_disk(config);

        clean(&ctx).unwrap();
        std::fs::create_dir_all(ctx.paths.dist.join("img")).unwrap();
        std::fs::write(ctx.paths.dist.join("img/a.png"), b"x").unwrap();
        clean(&ctx).unwrap();
        assert!(!Path::new(&ctx.paths.dist).exists());
    }
}
