//! Contains the color histogram: pixel deduplication after an optional [`ColorMask`].

use crate::{ColorComponents, ColorMask, MAX_PIXELS};
use bitvec::vec::BitVec;
use palette::cast::{self, AsArrays};
#[cfg(feature = "threads")]
use rayon::prelude::*;
use std::ops::Range;

/// A byte-sized Radix
const RADIX: usize = u8::MAX as usize + 1;

/// Buckets with fewer pixels than this track touched table entries in a bitset
/// instead of scanning the whole table.
const SPARSE_BUCKET: usize = RADIX * RADIX / 4;

/// Returns the range associated with the `i`-th chunk.
#[inline]
fn chunk_range(chunks: &[u32], i: usize) -> Range<usize> {
    (chunks[i] as usize)..(chunks[i + 1] as usize)
}

/// Computes the prefix sum of the array in place.
#[inline]
fn prefix_sum<const M: usize>(counts: &mut [u32; M]) {
    for i in 1..M {
        counts[i] += counts[i - 1];
    }
}

/// Count the first (red) component of each masked color.
fn red_counts<const N: usize>(pixels: &[[u8; N]], mask: ColorMask, counts: &mut [u32; RADIX + 1]) {
    for &color in pixels {
        counts[usize::from(mask.apply(color)[0])] += 1;
    }
}

/// Packs every component but red into a key that sorts in component order.
#[inline]
fn rest_key<const N: usize>(color: [u8; N]) -> u32 {
    color[1..].iter().fold(0, |key, &c| (key << 8) | u32::from(c))
}

/// The inverse of [`rest_key`].
#[inline]
fn from_rest_key<const N: usize>(red: u8, mut key: u32) -> [u8; N] {
    let mut color = [0; N];
    color[0] = red;
    for c in color[1..].iter_mut().rev() {
        #[allow(clippy::cast_possible_truncation)]
        {
            *c = key as u8;
        }
        key >>= 8;
    }
    color
}

/// Sorts the pixels by their masked red component,
/// returning the [`rest_key`] of each sorted pixel.
///
/// `red_prefix` must hold the prefix sums of the red counts.
/// Afterwards, it holds the start of each red bucket
/// with the last element being the total number of pixels.
fn bucket_by_red<const N: usize>(
    pixels: &[[u8; N]],
    mask: ColorMask,
    red_prefix: &mut [u32; RADIX + 1],
) -> Vec<u32> {
    let mut rest = vec![0; pixels.len()];

    for &color in pixels {
        let color = mask.apply(color);
        let r = usize::from(color[0]);
        let j = red_prefix[r] - 1;
        rest[j as usize] = rest_key(color);
        red_prefix[r] = j;
    }

    #[allow(clippy::cast_possible_truncation)]
    {
        red_prefix[RADIX] = pixels.len() as u32;
    }

    rest
}

/// Reusable buffers for counting the colors in a single red bucket.
struct Scratch {
    /// Counts indexed by the green and blue components (only used for RGB colors).
    table: Vec<u32>,
    /// The entries of `table` that are currently non-zero.
    touched: BitVec,
}

impl Scratch {
    /// Creates the scratch buffers for colors with `N` components.
    fn new<const N: usize>() -> Self {
        if N == 3 {
            Self {
                table: vec![0; RADIX * RADIX],
                touched: BitVec::repeat(false, RADIX * RADIX),
            }
        } else {
            Self {
                table: Vec::new(),
                touched: BitVec::new(),
            }
        }
    }
}

/// Deduplicates the colors of a single red bucket,
/// appending them in ascending order to `colors` and their counts to `counts`.
fn count_bucket<Color, const N: usize>(
    red: u8,
    keys: &mut [u32],
    scratch: &mut Scratch,
    colors: &mut Vec<Color>,
    counts: &mut Vec<u32>,
) where
    Color: ColorComponents<u8, N>,
{
    let mut push = |key: u32, count: u32| {
        colors.push(cast::from_array(from_rest_key(red, key)));
        counts.push(count);
    };

    if N == 3 {
        let Scratch { table, touched } = scratch;

        if keys.len() < SPARSE_BUCKET {
            for &key in &*keys {
                let key = key as usize;
                table[key] += 1;
                touched.set(key, true);
            }

            for key in touched.iter_ones() {
                #[allow(clippy::cast_possible_truncation)]
                push(key as u32, table[key]);
                table[key] = 0;
            }

            touched.fill(false);
        } else {
            for &key in &*keys {
                table[key as usize] += 1;
            }

            for (key, count) in table.iter_mut().enumerate() {
                if *count > 0 {
                    #[allow(clippy::cast_possible_truncation)]
                    push(key as u32, *count);
                    *count = 0;
                }
            }
        }
    } else {
        keys.sort_unstable();

        let mut keys = keys.iter().copied();
        if let Some(first) = keys.next() {
            let mut run = (first, 1);
            for key in keys {
                if key == run.0 {
                    run.1 += 1;
                } else {
                    push(run.0, run.1);
                    run = (key, 1);
                }
            }
            push(run.0, run.1);
        }
    }
}

/// Deduplicated (masked) colors and their occurrence counts.
///
/// The colors are unique, sorted in ascending component order, and every count is non-zero.
/// The counts sum to the number of pixels the histogram was built from.
///
/// Colors with 3 (RGB) and 4 (RGBA) components are supported.
/// Alpha takes part in deduplication like any other component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram<Color, const N: usize>
where
    Color: ColorComponents<u8, N>,
{
    /// The unique colors.
    colors: Vec<Color>,
    /// The number of times each color was present in the original pixels.
    counts: Vec<u32>,
    /// The total number of pixels.
    total_count: u32,
}

impl<Color, const N: usize> Default for Histogram<Color, N>
where
    Color: ColorComponents<u8, N>,
{
    fn default() -> Self {
        Self {
            colors: Vec::new(),
            counts: Vec::new(),
            total_count: 0,
        }
    }
}

impl<Color, const N: usize> Histogram<Color, N>
where
    Color: ColorComponents<u8, N>,
{
    /// Returns the slice of unique colors.
    #[must_use]
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Returns the slice of unique colors as component arrays.
    #[must_use]
    pub fn color_components(&self) -> &[[u8; N]] {
        self.colors.as_arrays()
    }

    /// Returns a slice for the number of times each unique color was present in the original pixels.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Returns the number of original pixels.
    ///
    /// This is equal to the sum of [`Histogram::counts`].
    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    /// Returns the number of unique colors.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_colors(&self) -> u32 {
        self.colors.len() as u32
    }

    /// Returns the number of unique colors as a `usize`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether or not the histogram has no colors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Creates a new [`Histogram`] from a slice of pixels, applying `mask` to each pixel first.
    ///
    /// Only the first [`MAX_PIXELS`] pixels are considered.
    #[must_use]
    pub fn new(pixels: &[Color], mask: ColorMask) -> Self {
        let pixels = &pixels[..pixels.len().min(MAX_PIXELS as usize)];
        if pixels.is_empty() {
            return Self::default();
        }

        let pixels: &[[u8; N]] = pixels.as_arrays();

        let mut red_prefix = [0; RADIX + 1];
        red_counts(pixels, mask, &mut red_prefix);
        prefix_sum(&mut red_prefix);
        let mut keys = bucket_by_red(pixels, mask, &mut red_prefix);

        let mut colors = Vec::new();
        let mut counts = Vec::new();
        let mut scratch = Scratch::new::<N>();

        for r in 0..RADIX {
            let bucket = &mut keys[chunk_range(&red_prefix, r)];
            if !bucket.is_empty() {
                #[allow(clippy::cast_possible_truncation)]
                count_bucket(r as u8, bucket, &mut scratch, &mut colors, &mut counts);
            }
        }

        Self {
            colors,
            counts,
            total_count: red_prefix[RADIX],
        }
    }

    /// Creates a new [`Histogram`] in parallel from a slice of pixels, applying `mask` to each pixel first.
    ///
    /// The result is identical to [`Histogram::new`].
    /// Only the first [`MAX_PIXELS`] pixels are considered.
    #[cfg(feature = "threads")]
    #[must_use]
    pub fn new_par(pixels: &[Color], mask: ColorMask) -> Self
    where
        Color: Send + Sync,
    {
        let pixels = &pixels[..pixels.len().min(MAX_PIXELS as usize)];
        if pixels.is_empty() {
            return Self::default();
        }

        let pixels: &[[u8; N]] = pixels.as_arrays();

        let chunk_size = pixels.len().div_ceil(rayon::current_num_threads());
        let mut red_prefix = pixels
            .par_chunks(chunk_size)
            .map(|chunk| {
                let mut counts = [0; RADIX + 1];
                red_counts(chunk, mask, &mut counts);
                counts
            })
            .reduce(
                || [0; RADIX + 1],
                |mut total, counts| {
                    for (total, count) in total.iter_mut().zip(counts) {
                        *total += count;
                    }
                    total
                },
            );

        prefix_sum(&mut red_prefix);
        let mut keys = bucket_by_red(pixels, mask, &mut red_prefix);

        let mut buckets = Vec::with_capacity(RADIX);
        let mut remaining = keys.as_mut_slice();
        for r in 0..RADIX {
            let len = chunk_range(&red_prefix, r).len();
            let (bucket, tail) = std::mem::take(&mut remaining).split_at_mut(len);
            if !bucket.is_empty() {
                #[allow(clippy::cast_possible_truncation)]
                buckets.push((r as u8, bucket));
            }
            remaining = tail;
        }

        let parts = buckets
            .into_par_iter()
            .map_init(Scratch::new::<N>, |scratch, (red, bucket)| {
                let mut colors = Vec::<Color>::new();
                let mut counts = Vec::new();
                count_bucket::<Color, N>(red, bucket, scratch, &mut colors, &mut counts);
                (colors, counts)
            })
            .collect::<Vec<_>>();

        let len = parts.iter().map(|(colors, _)| colors.len()).sum();
        let mut colors = Vec::with_capacity(len);
        let mut counts = Vec::with_capacity(len);
        for (part_colors, part_counts) in parts {
            colors.extend(part_colors);
            counts.extend(part_counts);
        }

        Self {
            colors,
            counts,
            total_count: red_prefix[RADIX],
        }
    }
}
