//! Seeded sampling of the initial k-means centers.

use super::{Centroids, KmeansOptions};
use crate::{ColorComponents, ConfigError, Histogram, PaletteSize, QuantizeError};

use rand::{prelude::Distribution, SeedableRng};
use rand_distr::{weighted_alias::WeightedAliasIndex, Uniform};
use rand_xoshiro::Xoroshiro128PlusPlus;
use tracing::trace;

/// How the initial k-means centers are drawn from the distinct colors of a [`Histogram`].
///
/// In both cases, draws are independent and with replacement,
/// so several centers may start on the same color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Initialization {
    /// Every distinct color is equally likely to be drawn.
    #[default]
    Uniform,
    /// Each distinct color is drawn with probability proportional to its count.
    Weighted,
}

/// Creates a distribution that samples indices in proportion to `counts`.
#[allow(clippy::unwrap_used)]
fn alias_index(counts: &[u32]) -> WeightedAliasIndex<u64> {
    // WeightedAliasIndex::new fails if:
    // - The vector is empty => checked by the caller
    // - The vector is longer than u32::MAX =>
    //      a histogram has at most MAX_PIXELS = u32::MAX entries
    // - For any weight w: w < 0 or w > max where max = W::MAX / weights.len() =>
    //      max count and max length are u32::MAX, so converting all counts to u64 will prevent this
    // - The sum of weights is zero =>
    //      every histogram count is > 0
    WeightedAliasIndex::new(counts.iter().copied().map(u64::from).collect()).unwrap()
}

/// Draws `k` colors from the histogram with indices sampled from `distribution`.
fn draw<Color, const N: usize>(
    histogram: &Histogram<Color, N>,
    k: usize,
    seed: u64,
    distribution: &impl Distribution<usize>,
) -> Vec<Color>
where
    Color: ColorComponents<u8, N>,
{
    let rng = &mut Xoroshiro128PlusPlus::seed_from_u64(seed);
    let colors = histogram.colors();
    (0..k).map(|_| colors[distribution.sample(rng)]).collect()
}

/// Draws `k` initial centers from the distinct colors of `histogram`.
///
/// The draws are made by a [`Xoroshiro128PlusPlus`] generator seeded with
/// [`KmeansOptions::seed`], so the same histogram, `k`, and options
/// always give the same centers.
///
/// # Errors
/// Returns [`ConfigError::ZeroPaletteSize`] if `k` is zero
/// or [`QuantizeError::EmptyInput`] if the histogram is empty.
pub fn sample_centers<Color, const N: usize>(
    histogram: &Histogram<Color, N>,
    k: PaletteSize,
    options: &KmeansOptions,
) -> Result<Centroids<Color>, QuantizeError>
where
    Color: ColorComponents<u8, N>,
{
    let k = k.as_usize();
    if k == 0 {
        return Err(ConfigError::ZeroPaletteSize.into());
    }
    if histogram.is_empty() {
        return Err(QuantizeError::EmptyInput);
    }

    let centers = match options.initialization {
        Initialization::Uniform => {
            let distribution = Uniform::new(0, histogram.len());
            draw(histogram, k, options.seed, &distribution)
        }
        Initialization::Weighted => {
            let distribution = alias_index(histogram.counts());
            draw(histogram, k, options.seed, &distribution)
        }
    };

    trace!(
        k,
        seed = options.seed,
        weighted = options.initialization == Initialization::Weighted,
        "sampled initial centers"
    );

    // k <= PaletteSize::MAX
    Ok(Centroids::from_truncated(centers))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{tests::*, ColorMask};
    use palette::Srgb;

    #[test]
    fn draws_k_centers_from_histogram() {
        let colors = test_data_1024();
        let histogram = Histogram::new(&colors, ColorMask::IDENTITY);

        for initialization in [Initialization::Uniform, Initialization::Weighted] {
            let options = KmeansOptions::new().initialization(initialization);
            for k in [1, 7, 28, 256] {
                let centers =
                    sample_centers(&histogram, PaletteSize::from_clamped(k), &options).unwrap();
                assert_eq!(centers.num_colors(), k);
                for center in centers.as_slice() {
                    assert!(histogram.colors().contains(center));
                }
            }
        }
    }

    #[test]
    fn k_may_exceed_distinct_colors() {
        let pixels = vec![Srgb::new(1u8, 2, 3), Srgb::new(4, 5, 6)];
        let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);
        let centers = sample_centers(&histogram, 5.into(), &KmeansOptions::new()).unwrap();
        assert_eq!(centers.num_colors(), 5);
    }

    #[test]
    fn same_seed_same_centers() {
        let colors = test_data_1024();
        let histogram = Histogram::new(&colors, ColorMask::default());

        for initialization in [Initialization::Uniform, Initialization::Weighted] {
            let options = KmeansOptions::new().initialization(initialization).seed(11);
            let first = sample_centers(&histogram, 64.into(), &options).unwrap();
            let second = sample_centers(&histogram, 64.into(), &options).unwrap();
            assert_eq!(first, second);

            let other = sample_centers(&histogram, 64.into(), &options.seed(12)).unwrap();
            assert_ne!(first, other);
        }
    }

    #[test]
    fn weighted_prefers_common_colors() {
        let common = Srgb::new(10u8, 20, 30);
        let mut pixels = vec![common; 10_000];
        pixels.push(Srgb::new(200, 200, 200));
        let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);

        let options = KmeansOptions::new().initialization(Initialization::Weighted);
        let centers = sample_centers(&histogram, 64.into(), &options).unwrap();
        let hits = centers.as_slice().iter().filter(|&&c| c == common).count();
        assert!(hits >= 60);
    }

    #[test]
    fn rejects_zero_and_empty() {
        let histogram = Histogram::<Srgb<u8>, 3>::default();
        assert_eq!(
            sample_centers(&histogram, 1.into(), &KmeansOptions::new()),
            Err(QuantizeError::EmptyInput)
        );

        let pixels = vec![Srgb::new(1u8, 2, 3)];
        let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);
        assert_eq!(
            sample_centers(&histogram, 0.into(), &KmeansOptions::new()),
            Err(QuantizeError::InvalidConfiguration(ConfigError::ZeroPaletteSize))
        );
    }
}
