//! Raster image encoders: JPEG re-encode, PNG optimize, GIF interlace.

use anyhow::{Context, Result};
use gif::{ColorOutput, DecodeOptions, Encoder};
use image::{DynamicImage, ImageFormat};
use jpeg_encoder::{ColorType, Encoder as JpegEncoder};
use std::{borrow::Cow, io::Cursor};

/// Progressive re-encode of a JPEG at `quality` (1..=100).
pub fn jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .context("Failed to decode JPEG")?;
    let width = u16::try_from(img.width()).context("JPEG too wide")?;
    let height = u16::try_from(img.height()).context("JPEG too tall")?;

    let (pixels, color) = match img {
        DynamicImage::ImageLuma8(gray) => (gray.into_raw(), ColorType::Luma),
        other => (other.into_rgb8().into_raw(), ColorType::Rgb),
    };

    let mut out = Vec::with_capacity(data.len());
    let mut encoder = JpegEncoder::new(&mut out, quality);
    encoder.set_progressive(true);
    encoder
        .encode(&pixels, width, height, color)
        .context("Failed to encode JPEG")?;
    Ok(out)
}

/// Lossless PNG recompression at oxipng preset `level` (0..=6).
pub fn png(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let options = oxipng::Options::from_preset(level);
    oxipng::optimize_from_memory(data, &options).context("Failed to optimize PNG")
}

/// Lossless GIF re-encode with every frame stored interlaced.
///
/// Global palette, loop count, timing and disposal are carried over.
pub fn gif(data: &[u8]) -> Result<Vec<u8>> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::Indexed);
    let mut decoder = options
        .read_info(Cursor::new(data))
        .context("Failed to decode GIF")?;

    let palette = decoder.global_palette().map(<[u8]>::to_vec).unwrap_or_default();
    let (width, height) = (decoder.width(), decoder.height());

    let mut out = Vec::with_capacity(data.len());
    {
        let mut encoder = Encoder::new(&mut out, width, height, &palette)?;
        let mut repeat_written = false;

        while let Some(frame) = decoder.read_next_frame().context("Failed to decode GIF frame")? {
            let mut frame = frame.clone();
            if !repeat_written {
                // Loop extension precedes the first frame, so it is known here.
                encoder.set_repeat(decoder.repeat())?;
                repeat_written = true;
            }

            if !frame.interlaced {
                let rows = interlace(&frame.buffer, usize::from(frame.width), usize::from(frame.height));
                frame.buffer = Cow::Owned(rows);
                frame.interlaced = true;
            }
            encoder.write_frame(&frame)?;
        }
    }
    Ok(out)
}

/// Row indices in GIF interlaced storage order.
///
/// Pass 1 every 8th row from 0, pass 2 every 8th from 4, pass 3 every 4th
/// from 2, pass 4 every 2nd from 1.
pub fn interlaced_rows(height: usize) -> impl Iterator<Item = usize> {
    [(0, 8), (4, 8), (2, 4), (1, 2)]
        .into_iter()
        .flat_map(move |(start, step)| (start..height).step_by(step))
}

/// Reorder a row-major indexed buffer into interlaced storage order.
fn interlace(buffer: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.len());
    for row in interlaced_rows(height) {
        let start = row * width;
        if let Some(line) = buffer.get(start..start + width) {
            out.extend_from_slice(line);
        }
    }
    out
}
