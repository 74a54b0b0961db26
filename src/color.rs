//! Channel packing, masking, and the distance functions shared by k-means and remapping.

use std::array;

use wide::{f32x8, CmpLt};

/// Packs the components of a color into a `u32`, red in the lowest byte.
///
/// Unused high bytes (e.g., for RGB colors) are zero.
///
/// # Panics
/// Panics if `N` is greater than `4`.
#[must_use]
#[inline]
pub fn pack<const N: usize>(color: [u8; N]) -> u32 {
    let mut bytes = [0; 4];
    bytes[..N].copy_from_slice(&color);
    u32::from_le_bytes(bytes)
}

/// Unpacks the lowest `N` bytes of a `u32` into color components, red first.
///
/// This is the inverse of [`pack`].
///
/// # Panics
/// Panics if `N` is greater than `4`.
#[must_use]
#[inline]
pub fn unpack<const N: usize>(packed: u32) -> [u8; N] {
    let bytes = packed.to_le_bytes();
    array::from_fn(|i| bytes[i])
}

/// A per-channel bitmask applied to pixel colors before they are deduplicated.
///
/// Dropping low bits merges similar colors into a single histogram entry,
/// which makes k-means cheaper at the cost of slightly coarser palette colors.
/// For example, [`ColorMask::drop_low_bits(1)`](ColorMask::drop_low_bits) reduces the
/// `(2^8)^3` possible RGB colors to `(2^7)^3`.
///
/// The mask is stored packed in the same layout as [`pack`]: red, green, blue, then alpha.
/// It only affects the histogram; remapping always uses the original pixel colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ColorMask(u32);

impl ColorMask {
    /// A mask that keeps every bit of every channel.
    pub const IDENTITY: Self = Self(u32::MAX);

    /// The default mask: drops the lowest bit of red, green, and blue, and keeps alpha exact.
    ///
    /// Opaque pixels stay at `255` when alpha is written back from the palette.
    pub const DEFAULT: Self = Self::from_channels([0xfe, 0xfe, 0xfe, 0xff]);

    /// Creates a [`ColorMask`] from the masks for the red, green, blue, and alpha channels.
    #[must_use]
    pub const fn from_channels(channels: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(channels))
    }

    /// Creates a [`ColorMask`] that clears the lowest `bits` bits of every channel (alpha included).
    ///
    /// Values of `bits` of `8` or more clear the channels entirely.
    #[must_use]
    pub const fn drop_low_bits(bits: u8) -> Self {
        let channel = if bits >= 8 { 0 } else { u8::MAX << bits };
        Self::from_channels([channel; 4])
    }

    /// Returns the masks for the red, green, blue, and alpha channels.
    #[must_use]
    pub const fn channels(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Returns the packed mask.
    #[must_use]
    pub const fn into_inner(self) -> u32 {
        self.0
    }

    /// Applies the mask to the given color components.
    #[must_use]
    #[inline]
    pub fn apply<const N: usize>(self, color: [u8; N]) -> [u8; N] {
        unpack(pack(color) & self.0)
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Returns the red, green, and blue components of a color.
#[inline]
pub(crate) fn rgb<const N: usize>(color: [u8; N]) -> [u8; 3] {
    [color[0], color[1], color[2]]
}

/// The squared euclidean distance between the RGB components of two colors.
#[cfg(test)]
pub(crate) fn squared_distance<const N: usize>(a: [u8; N], b: [u8; N]) -> u32 {
    rgb(a)
        .into_iter()
        .zip(rgb(b))
        .map(|(a, b)| {
            let diff = u32::from(a.abs_diff(b));
            diff * diff
        })
        .sum()
}

/// The L1 (manhattan) distance between the RGB components of two colors.
#[inline]
pub(crate) fn l1_distance<const N: usize>(a: [u8; N], b: [u8; N]) -> u32 {
    rgb(a)
        .into_iter()
        .zip(rgb(b))
        .map(|(a, b)| u32::from(a.abs_diff(b)))
        .sum()
}

/// The index of the nearest center by [`squared_distance`], preferring the lowest index on ties.
#[cfg(test)]
pub(crate) fn nearest_scalar<const N: usize>(centers: &[[u8; N]], color: [u8; N]) -> usize {
    let mut nearest = 0;
    let mut min_distance = u32::MAX;
    for (i, &center) in centers.iter().enumerate() {
        let distance = squared_distance(center, color);
        if distance < min_distance {
            min_distance = distance;
            nearest = i;
        }
    }
    nearest
}

/// The RGB components of a set of centers laid out in 8-lane chunks for nearest neighbor search.
///
/// All squared distances between `u8` colors are below `2^24`,
/// so they are computed exactly in `f32`.
pub(crate) struct NearestTable {
    /// The red, green, and blue lanes of each chunk of 8 centers.
    /// Lanes past the last center are filled with infinity.
    chunks: Vec<[f32x8; 3]>,
}

impl NearestTable {
    /// Creates a new [`NearestTable`] from the given centers.
    pub(crate) fn new<const N: usize>(centers: &[[u8; N]]) -> Self {
        let chunks = centers
            .chunks(8)
            .map(|chunk| {
                let mut lanes = [[f32::INFINITY; 8]; 3];
                for (lane, &center) in chunk.iter().enumerate() {
                    for (channel, c) in lanes.iter_mut().zip(rgb(center)) {
                        channel[lane] = f32::from(c);
                    }
                }
                lanes.map(f32x8::new)
            })
            .collect();

        Self { chunks }
    }

    /// Returns the index of the center nearest to `color`.
    ///
    /// Ties are resolved to the lowest index.
    #[inline]
    #[allow(clippy::float_cmp)]
    pub(crate) fn nearest<const N: usize>(&self, color: [u8; N]) -> usize {
        let query = rgb(color).map(|c| f32x8::splat(f32::from(c)));
        let incr = f32x8::splat(1.0);
        let mut cur_chunk = f32x8::ZERO;
        let mut min_chunk = cur_chunk;
        let mut min_distance = f32x8::splat(f32::INFINITY);

        for chunk in &self.chunks {
            let [r, g, b] = array::from_fn::<_, 3, _>(|i| {
                let diff = query[i] - chunk[i];
                diff * diff
            });
            let distance = r + g + b;

            // strict comparison keeps the earliest chunk for each lane
            let mask = distance.cmp_lt(min_distance);
            min_chunk = mask.blend(cur_chunk, min_chunk);
            min_distance = mask.blend(distance, min_distance);
            cur_chunk += incr;
        }

        let mut nearest = 0;
        let mut min_dist = f32::INFINITY;
        for (lane, (&dist, &chunk)) in min_distance
            .as_array_ref()
            .iter()
            .zip(min_chunk.as_array_ref())
            .enumerate()
        {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let i = chunk as usize * 8 + lane;
            if dist < min_dist || (dist == min_dist && i < nearest) {
                min_dist = dist;
                nearest = i;
            }
        }

        nearest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use palette::cast::{AsArrays, IntoArrays};

    #[test]
    fn pack_layout() {
        assert_eq!(pack([1, 2, 3]), 0x00_03_02_01);
        assert_eq!(pack([1, 2, 3, 4]), 0x04_03_02_01);
        assert_eq!(unpack::<3>(0xff_03_02_01), [1, 2, 3]);
        assert_eq!(unpack::<4>(0x04_03_02_01), [1, 2, 3, 4]);
    }

    #[test]
    fn mask_drops_low_bits() {
        let mask = ColorMask::drop_low_bits(1);
        assert_eq!(mask.channels(), [0xfe; 4]);
        assert_eq!(mask.apply([254, 255, 1]), [254, 254, 0]);
        assert_eq!(mask.apply([255, 128, 7, 255]), [254, 128, 6, 254]);

        assert_eq!(ColorMask::drop_low_bits(2).apply([255, 3, 4]), [252, 0, 4]);
        assert_eq!(ColorMask::drop_low_bits(8).apply([255, 3, 4]), [0, 0, 0]);
        assert_eq!(ColorMask::IDENTITY.apply([255, 3, 4, 9]), [255, 3, 4, 9]);
    }

    #[test]
    fn default_mask_keeps_alpha() {
        let mask = ColorMask::default();
        assert_eq!(mask, ColorMask::DEFAULT);
        assert_eq!(mask.channels(), [0xfe, 0xfe, 0xfe, 0xff]);
        assert_eq!(mask.apply([255, 129, 3, 255]), [254, 128, 2, 255]);
        assert_eq!(mask.apply([7, 7, 7, 1]), [6, 6, 6, 1]);
    }

    #[test]
    fn mask_per_channel() {
        let mask = ColorMask::from_channels([0xff, 0xf0, 0x0f, 0x00]);
        assert_eq!(
            mask.apply([0xab, 0xab, 0xab, 0xab]),
            [0xab, 0xa0, 0x0b, 0x00]
        );
    }

    #[test]
    fn distances_ignore_alpha() {
        assert_eq!(squared_distance([0, 0, 0, 0], [1, 2, 3, 255]), 14);
        assert_eq!(l1_distance([0, 0, 0, 0], [1, 2, 3, 255]), 6);
        assert_eq!(squared_distance([255, 255, 255], [0, 0, 0]), 3 * 255 * 255);
    }

    #[test]
    fn simd_matches_scalar() {
        let k = 249; // use non-multiple of 8 to test remainder handling
        let centers = test_data_256();
        let centers = &centers.as_arrays()[..k];
        let table = NearestTable::new(centers);

        for color in test_data_1024().into_arrays() {
            assert_eq!(table.nearest(color), nearest_scalar(centers, color));
        }
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let centers = [[10, 10, 10], [0, 0, 0], [20, 20, 20], [0, 0, 0], [0, 0, 0]]
            .into_iter()
            .cycle()
            .take(19)
            .collect::<Vec<_>>();
        let table = NearestTable::new(&centers);
        assert_eq!(table.nearest([0, 0, 0]), 1);
        assert_eq!(table.nearest([5, 5, 5]), 0);
        assert_eq!(table.nearest([15, 15, 15]), 0);
        assert_eq!(table.nearest([20, 20, 20]), 2);

        let same = vec![[7, 7, 7]; 17];
        assert_eq!(NearestTable::new(&same).nearest([0, 0, 0]), 0);
    }
}
