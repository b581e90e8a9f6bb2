//! Image optimizer.
//!
//! Walks the image tree and writes one file per source into the
//! distribution, mirroring relative paths:
//!
//! | extension      | treatment                                  |
//! |----------------|--------------------------------------------|
//! | `gif`          | lossless re-encode, interlaced frames      |
//! | `jpg` / `jpeg` | re-encode at `jpeg_quality`                |
//! | `png`          | oxipng preset `png_level`                  |
//! | `svg`          | [`svg::optimize`]                          |
//! | anything else  | copied verbatim                            |
//!
//! A JPEG or PNG result larger than its source is discarded for the source
//! bytes. A file that fails to decode is logged and copied verbatim.

mod raster;
mod svg;

use crate::{context::BuildContext, log, logger::ProgressBars};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// What happened to one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Optimized,
    /// The optimized result was larger, the source bytes were kept.
    KeptOriginal,
    /// Not an optimizable format.
    Copied,
    /// Optimization failed; the source was copied.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Gif,
    Jpeg,
    Png,
    Svg,
    Other,
}

impl Kind {
    fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("gif") => Self::Gif,
            Some("jpg" | "jpeg") => Self::Jpeg,
            Some("png") => Self::Png,
            Some("svg") => Self::Svg,
            _ => Self::Other,
        }
    }
}

/// Optimize every image under the source tree.
pub fn run(ctx: &BuildContext) -> Result<Vec<(PathBuf, Outcome)>> {
    let paths = &ctx.paths;
    let files = ctx
        .fs()
        .list_files(&paths.images_source, true)
        .with_context(|| format!("Failed to list {}", paths.images_source.display()))?;

    let progress = ProgressBars::new_filtered(&[("images", files.len())]);
    let results = files
        .par_iter()
        .map(|file| {
            let outcome = process(ctx, file);
            if let Some(progress) = &progress {
                progress.inc(0);
            }
            outcome.map(|o| (file.clone(), o))
        })
        .collect::<Result<Vec<_>>>();
    drop(progress);
    let results = results?;

    let optimized = results.iter().filter(|(_, o)| *o == Outcome::Optimized).count();
    log!("images"; "{} files, {} optimized", results.len(), optimized);
    Ok(results)
}

fn process(ctx: &BuildContext, source: &Path) -> Result<Outcome> {
    let paths = &ctx.paths;
    let relative = source.strip_prefix(&paths.images_source).unwrap_or(source);
    let target = paths.images_output.join(relative);

    let data = ctx
        .fs()
        .read(source)
        .with_context(|| format!("Failed to read {}", source.display()))?;
    let (bytes, outcome) = optimize(ctx, Kind::of(source), &data, relative);

    ctx.fs()
        .write(&target, bytes.as_deref().unwrap_or(&data))
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(outcome)
}

/// Optimized bytes, `None` meaning the source is written unchanged.
fn optimize(ctx: &BuildContext, kind: Kind, data: &[u8], relative: &Path) -> (Option<Vec<u8>>, Outcome) {
    let images = &ctx.config.build.images;
    let result = match kind {
        Kind::Other => return (None, Outcome::Copied),
        Kind::Gif => raster::gif(data),
        Kind::Jpeg => raster::jpeg(data, images.jpeg_quality),
        Kind::Png => raster::png(data, images.png_level),
        Kind::Svg => svg::optimize(data),
    };

    match result {
        Err(e) => {
            log!("error"; "{}: {:#}, copied as is", relative.display(), e);
            (None, Outcome::Failed)
        }
        Ok(out) if matches!(kind, Kind::Jpeg | Kind::Png) && out.len() >= data.len() => {
            (None, Outcome::KeptOriginal)
        }
        Ok(out) => (Some(out), Outcome::Optimized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{memory_config, memory_context};
    use crate::vfs::FileProvider;
    use image::ImageFormat;
    use raster::tests::{sample, striped_gif};

    fn outcome_of(results: &[(PathBuf, Outcome)], name: &str) -> Outcome {
        results
            .iter()
            .find(|(p, _)| p.ends_with(name))
            .map(|(_, o)| *o)
            .unwrap()
    }

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(Kind::of(Path::new("a/b.JPG")), Kind::Jpeg);
        assert_eq!(Kind::of(Path::new("b.jpeg")), Kind::Jpeg);
        assert_eq!(Kind::of(Path::new("c.png")), Kind::Png);
        assert_eq!(Kind::of(Path::new("d.gif")), Kind::Gif);
        assert_eq!(Kind::of(Path::new("e.svg")), Kind::Svg);
        assert_eq!(Kind::of(Path::new("f.webp")), Kind::Other);
        assert_eq!(Kind::of(Path::new("README")), Kind::Other);
    }

    #[test]
    fn test_tree_mirrored_into_dist() {
        let svg = r#"<svg width="2" height="2" viewBox="0 0 2 2"><!-- x --><rect id="r"/></svg>"#;
        let (ctx, fs) = memory_context(
            memory_config(),
            [
                ("img/icons/logo.svg", svg.as_bytes().to_vec()),
                ("img/photo.jpg", sample(ImageFormat::Jpeg, 64)),
                ("img/anim/spinner.gif", striped_gif(8, 8)),
                ("img/favicon.ico", b"ico".to_vec()),
            ],
        );

        let results = run(&ctx).unwrap();
        let out = &ctx.paths.images_output;

        assert_eq!(results.len(), 4);
        assert_eq!(
            fs.read_to_string(&out.join("icons/logo.svg")).unwrap(),
            r#"<svg width="2" height="2"><rect id="r"/></svg>"#
        );
        assert!(fs.is_file(&out.join("photo.jpg")));
        assert!(fs.is_file(&out.join("anim/spinner.gif")));
        assert_eq!(fs.read(&out.join("favicon.ico")).unwrap(), b"ico");

        assert_eq!(outcome_of(&results, "logo.svg"), Outcome::Optimized);
        assert_eq!(outcome_of(&results, "spinner.gif"), Outcome::Optimized);
        assert_eq!(outcome_of(&results, "favicon.ico"), Outcome::Copied);
    }

    #[test]
    fn test_jpeg_and_png_never_grow() {
        let mut config = memory_config();
        config.build.images.jpeg_quality = 100;
        let jpg = sample(ImageFormat::Jpeg, 16);
        let png = sample(ImageFormat::Png, 16);
        let (ctx, fs) = memory_context(config, [("img/a.jpg", jpg.clone()), ("img/b.png", png.clone())]);

        let results = run(&ctx).unwrap();
        let out = &ctx.paths.images_output;

        assert!(fs.read(&out.join("a.jpg")).unwrap().len() <= jpg.len());
        assert!(fs.read(&out.join("b.png")).unwrap().len() <= png.len());
        for (_, outcome) in results {
            assert!(matches!(outcome, Outcome::Optimized | Outcome::KeptOriginal));
        }
    }

    #[test]
    fn test_undecodable_file_copied_verbatim() {
        let (ctx, fs) = memory_context(memory_config(), [("img/broken.png", b"definitely not png")]);

        let results = run(&ctx).unwrap();

        assert_eq!(results[0].1, Outcome::Failed);
        assert_eq!(
            fs.read(&ctx.paths.images_output.join("broken.png")).unwrap(),
            b"definitely not png"
        );
    }

    #[test]
    fn test_empty_tree() {
        let (ctx, _) = memory_context(memory_config(), Vec::<(&str, &str)>::new());
        assert!(run(&ctx).unwrap().is_empty());
    }
}
