//! Font copier: font files go to the distribution unchanged.

use crate::{context::BuildContext, log};
use anyhow::{Context, Result};

/// Copy every file directly in the font source dir. Returns the copy count.
pub fn run(ctx: &BuildContext) -> Result<usize> {
    let paths = &ctx.paths;
    let fonts = ctx
        .fs()
        .list_files(&paths.fonts_source, false)
        .with_context(|| format!("Failed to list {}", paths.fonts_source.display()))?;

    for font in &fonts {
        let Some(name) = font.file_name() else {
            continue;
        };
        let target = paths.fonts_output.join(name);
        ctx.fs()
            .copy(font, &target)
            .with_context(|| format!("Failed to copy {}", font.display()))?;
    }

    log!("fonts"; "copied {} files", fonts.len());
    Ok(fonts.len())
}
