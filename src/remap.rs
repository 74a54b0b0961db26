//! Mapping pixels onto a palette.
//!
//! Every pixel is matched to the palette color nearest to its original (unmasked) color,
//! using the squared euclidean distance over red, green, and blue.
//! Ties go to the palette color with the lowest index.

use crate::{color::NearestTable, ColorComponents, PixelBuffer, MAX_K};

use palette::cast::AsArrays;
#[cfg(feature = "threads")]
use rayon::prelude::*;
use tracing::debug;

/// Determines what happens to the alpha channel of RGBA pixels when they are remapped.
///
/// This has no effect on RGB pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    /// Keep each pixel's original alpha and only replace red, green, and blue.
    #[default]
    Preserve,
    /// Replace the alpha as well, with the alpha of the matched palette color.
    FromCenter,
}

/// Writes `center` into `pixel` according to `alpha_mode`.
#[inline]
fn write<const N: usize>(pixel: &mut [u8; N], center: [u8; N], alpha_mode: AlphaMode) {
    pixel[..3].copy_from_slice(&center[..3]);
    if N == 4 && alpha_mode == AlphaMode::FromCenter {
        pixel[3] = center[3];
    }
}

/// Remaps a chunk of pixels, returning the per palette color counts for the chunk.
fn remap_chunk<const N: usize>(
    pixels: &mut [[u8; N]],
    palette: &[[u8; N]],
    table: &NearestTable,
    alpha_mode: AlphaMode,
) -> Vec<u32> {
    let mut counts = vec![0; palette.len()];
    for pixel in pixels {
        let i = table.nearest(*pixel);
        counts[i] += 1;
        write(pixel, palette[i], alpha_mode);
    }
    counts
}

/// Replaces each pixel with its nearest color in `palette`.
///
/// Returns the number of pixels mapped to each palette color.
/// If `palette` is empty, the pixels are left untouched.
///
/// # Examples
/// ```
/// # use kquant::{remap::{self, AlphaMode}, PixelBuffer};
/// # use palette::Srgba;
/// let mut pixels = vec![Srgba::new(10u8, 10, 10, 128), Srgba::new(240, 240, 240, 255)];
/// let mut buffer = PixelBuffer::new(&mut pixels, 2, 1).unwrap();
/// let palette = [Srgba::new(0, 0, 0, 255), Srgba::new(255, 255, 255, 255)];
///
/// let counts = remap::remap(&mut buffer, &palette, AlphaMode::Preserve);
/// assert_eq!(counts, vec![1, 1]);
/// assert_eq!(pixels[0], Srgba::new(0, 0, 0, 128));
/// ```
pub fn remap<Color, const N: usize>(
    buffer: &mut PixelBuffer<'_, Color>,
    palette: &[Color],
    alpha_mode: AlphaMode,
) -> Vec<u32>
where
    Color: ColorComponents<u8, N>,
{
    if palette.is_empty() {
        return Vec::new();
    }

    let palette = palette.as_arrays();
    let table = NearestTable::new(palette);
    let counts = remap_chunk(buffer.components_mut(), palette, &table, alpha_mode);

    debug!(
        pixels = buffer.num_pixels(),
        colors = palette.len(),
        alpha_from_center = alpha_mode == AlphaMode::FromCenter,
        "remapped pixels"
    );

    counts
}

/// Replaces each pixel with its nearest color in `palette` in parallel.
///
/// The result is identical to [`remap`].
#[cfg(feature = "threads")]
pub fn remap_par<Color, const N: usize>(
    buffer: &mut PixelBuffer<'_, Color>,
    palette: &[Color],
    alpha_mode: AlphaMode,
) -> Vec<u32>
where
    Color: ColorComponents<u8, N>,
{
    if palette.is_empty() {
        return Vec::new();
    }

    let palette = palette.as_arrays();
    let table = NearestTable::new(palette);
    let num_pixels = buffer.num_pixels();
    let pixels = buffer.components_mut();
    let chunk_size = pixels.len().div_ceil(rayon::current_num_threads()).max(1);

    let counts = pixels
        .par_chunks_mut(chunk_size)
        .map(|chunk| remap_chunk(chunk, palette, &table, alpha_mode))
        .reduce_with(|mut a, b| {
            for (a, b) in a.iter_mut().zip(b) {
                *a += b;
            }
            a
        })
        .unwrap_or_else(|| vec![0; palette.len()]);

    debug!(
        pixels = num_pixels,
        colors = palette.len(),
        alpha_from_center = alpha_mode == AlphaMode::FromCenter,
        "remapped pixels"
    );

    counts
}

/// Computes the index of the nearest palette color for each pixel without modifying the pixels.
///
/// Only the first [`MAX_COLORS`](crate::MAX_COLORS) palette colors are considered,
/// so every index fits in a `u8`.
/// If `palette` is empty, an empty `Vec` is returned.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn indices<Color, const N: usize>(buffer: &PixelBuffer<'_, Color>, palette: &[Color]) -> Vec<u8>
where
    Color: ColorComponents<u8, N>,
{
    if palette.is_empty() {
        return Vec::new();
    }

    let palette = &palette.as_arrays()[..palette.len().min(MAX_K)];
    let table = NearestTable::new(palette);

    buffer
        .components()
        .iter()
        .map(|&color| table.nearest(color) as u8)
        .collect()
}

/// Computes the index of the nearest palette color for each pixel in parallel.
///
/// The result is identical to [`indices`].
#[cfg(feature = "threads")]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn indices_par<Color, const N: usize>(
    buffer: &PixelBuffer<'_, Color>,
    palette: &[Color],
) -> Vec<u8>
where
    Color: ColorComponents<u8, N>,
{
    if palette.is_empty() {
        return Vec::new();
    }

    let palette = &palette.as_arrays()[..palette.len().min(MAX_K)];
    let table = NearestTable::new(palette);

    buffer
        .components()
        .par_iter()
        .map(|&color| table.nearest(color) as u8)
        .collect()
}

/// Paints the palette onto the image as `size` by `size` squares.
///
/// Swatches are laid out from the top-left corner, 32 per row,
/// and are clipped to the image bounds.
/// This is meant for inspecting a palette, not as part of quantization.
pub fn paint_swatches<Color>(buffer: &mut PixelBuffer<'_, Color>, palette: &[Color], size: u32)
where
    Color: Copy,
{
    const PER_ROW: usize = 32;

    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    let size = size as usize;
    let pixels = buffer.as_mut_slice();

    for (i, &color) in palette.iter().enumerate() {
        let x0 = (i % PER_ROW).saturating_mul(size);
        let y0 = (i / PER_ROW).saturating_mul(size);
        if x0 >= width || y0 >= height {
            continue;
        }

        let x1 = x0.saturating_add(size).min(width);
        let y1 = y0.saturating_add(size).min(height);
        for y in y0..y1 {
            pixels[(y * width + x0)..(y * width + x1)].fill(color);
        }
    }
}
