//! Lloyd's k-means over a color [`Histogram`].
//!
//! Each iteration assigns every distinct color to its nearest center
//! (squared euclidean distance over red, green, and blue; ties go to the lowest index)
//! and then moves each center to the mean of its assigned colors.
//! A center that receives no colors is left where it is.
//! Iteration stops once no center moves by at least the convergence threshold
//! (L1 distance over red, green, and blue), or after the maximum number of iterations.
//!
//! All arithmetic is done on integers, so the sequential and parallel versions
//! give identical results.
//!
//! # Examples
//! ```
//! # use kquant::{kmeans::{self, KmeansOptions}, ColorMask, Histogram};
//! # use palette::Srgb;
//! let pixels = vec![Srgb::new(0u8, 0, 0), Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)];
//! let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);
//!
//! let options = KmeansOptions::new();
//! let centroids = kmeans::sample_centers(&histogram, 2.into(), &options).unwrap();
//! let output = kmeans::run(&histogram, centroids, &options);
//! assert!(output.iterations <= options.get_max_iterations());
//! ```

mod init;
mod lloyd;

pub use init::*;

use crate::{ColorComponents, ConfigError, Histogram, QuantizeError, PaletteSize, MAX_K};
use palette::cast;

/// How much each distinct color contributes to the mean of its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Weighting {
    /// Each distinct color is weighted by its occurrence count,
    /// so that centers approximate the per-pixel centroids.
    #[default]
    Count,
    /// Each distinct color contributes once, regardless of how many pixels share it.
    ///
    /// This emphasizes color diversity over area.
    Uniform,
}

impl Weighting {
    /// The weight of a distinct color that occurs `count` times.
    #[inline]
    pub(crate) fn weight(self, count: u32) -> u64 {
        match self {
            Weighting::Count => count.into(),
            Weighting::Uniform => 1,
        }
    }
}

/// A list of initial centers for k-means.
///
/// This is a new type wrapper around `Vec<Color>`
/// with the invariant that it holds at most [`MAX_COLORS`](crate::MAX_COLORS) colors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Centroids<Color>(Vec<Color>);

impl<Color> Centroids<Color> {
    /// Returns the inner `Vec` of colors.
    #[must_use]
    pub fn into_inner(self) -> Vec<Color> {
        self.0
    }

    /// Returns the colors as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Color] {
        &self.0
    }

    /// Creates a new [`Centroids`] by truncating the given colors to [`MAX_COLORS`](crate::MAX_COLORS).
    #[must_use]
    pub fn from_truncated(mut centroids: Vec<Color>) -> Self {
        centroids.truncate(MAX_K);
        Self(centroids)
    }

    /// Returns the number of centers.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn num_colors(&self) -> u16 {
        self.0.len() as u16
    }
}

impl<Color> From<Centroids<Color>> for Vec<Color> {
    fn from(value: Centroids<Color>) -> Self {
        value.into_inner()
    }
}

impl<Color> TryFrom<Vec<Color>> for Centroids<Color> {
    type Error = ConfigError;

    fn try_from(colors: Vec<Color>) -> Result<Self, Self::Error> {
        if colors.len() <= MAX_K {
            Ok(Self(colors))
        } else {
            Err(ConfigError::PaletteTooLarge {
                k: colors.len(),
                max: MAX_K,
            })
        }
    }
}

/// A builder struct to specify the parameters for k-means.
///
/// # Examples
/// ```
/// # use kquant::kmeans::{KmeansOptions, Weighting, Initialization};
/// let options = KmeansOptions::new()
///     .max_iterations(32)
///     .convergence_threshold(2)
///     .weighting(Weighting::Uniform)
///     .initialization(Initialization::Weighted)
///     .seed(42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KmeansOptions {
    /// The maximum number of iterations to run.
    pub(crate) max_iterations: u32,
    /// Iteration stops once the largest center movement is below this value.
    pub(crate) convergence_threshold: u32,
    /// How distinct colors are weighted when computing means.
    pub(crate) weighting: Weighting,
    /// How the initial centers are sampled.
    pub(crate) initialization: Initialization,
    /// The seed value for the random number generator.
    pub(crate) seed: u64,
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl KmeansOptions {
    /// The default maximum number of iterations.
    pub const DEFAULT_MAX_ITERATIONS: u32 = 64;

    /// The default convergence threshold, on the `0..=255` channel scale.
    pub const DEFAULT_CONVERGENCE_THRESHOLD: u32 = 4;

    /// The default seed.
    pub const DEFAULT_SEED: u64 = 123 * 321;

    /// Creates a new [`KmeansOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            convergence_threshold: Self::DEFAULT_CONVERGENCE_THRESHOLD,
            weighting: Weighting::Count,
            initialization: Initialization::Uniform,
            seed: Self::DEFAULT_SEED,
        }
    }

    /// Sets the maximum number of iterations.
    ///
    /// The default is [`KmeansOptions::DEFAULT_MAX_ITERATIONS`].
    /// A value of `0` leaves the initial centers untouched.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the convergence threshold.
    ///
    /// After each iteration, the L1 distance each center moved (over red, green, and blue) is computed.
    /// If the largest of these is below the threshold, iteration stops early.
    /// A threshold of `0` disables early stopping.
    ///
    /// The default is [`KmeansOptions::DEFAULT_CONVERGENCE_THRESHOLD`].
    #[must_use]
    pub const fn convergence_threshold(mut self, threshold: u32) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Sets how distinct colors are weighted when computing cluster means.
    ///
    /// The default is [`Weighting::Count`].
    #[must_use]
    pub const fn weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Sets how the initial centers are sampled from the distinct colors.
    ///
    /// The default is [`Initialization::Uniform`].
    #[must_use]
    pub const fn initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    /// Sets the seed value for the random number generator.
    ///
    /// The default is [`KmeansOptions::DEFAULT_SEED`].
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the maximum number of iterations.
    #[must_use]
    pub const fn get_max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Returns the convergence threshold.
    #[must_use]
    pub const fn get_convergence_threshold(&self) -> u32 {
        self.convergence_threshold
    }

    /// Returns the weighting mode.
    #[must_use]
    pub const fn get_weighting(&self) -> Weighting {
        self.weighting
    }

    /// Returns the initialization mode.
    #[must_use]
    pub const fn get_initialization(&self) -> Initialization {
        self.initialization
    }

    /// Returns the seed.
    #[must_use]
    pub const fn get_seed(&self) -> u64 {
        self.seed
    }
}

/// The result of running k-means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmeansOutput<Color> {
    /// The final centers, in the same order as the initial centers.
    pub palette: Vec<Color>,
    /// The number of iterations that were run. Never greater than the maximum number of iterations.
    pub iterations: u32,
    /// Whether iteration stopped because the center movement fell below the convergence threshold.
    pub converged: bool,
}

/// Converts colors into component arrays.
fn to_components<Color, const N: usize>(colors: Vec<Color>) -> Vec<[u8; N]>
where
    Color: ColorComponents<u8, N>,
{
    colors.into_iter().map(cast::into_array).collect()
}

/// Converts component arrays back into colors.
fn from_components<Color, const N: usize>(centers: Vec<[u8; N]>) -> Vec<Color>
where
    Color: ColorComponents<u8, N>,
{
    centers.into_iter().map(cast::from_array).collect()
}

/// Runs k-means on the given histogram starting from `initial_centroids`.
///
/// If the histogram or the initial centroids are empty,
/// the centroids are returned as is with zero iterations.
#[must_use]
pub fn run<Color, const N: usize>(
    histogram: &Histogram<Color, N>,
    initial_centroids: Centroids<Color>,
    options: &KmeansOptions,
) -> KmeansOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    let mut centers = to_components(initial_centroids.into_inner());

    let (iterations, converged) = if histogram.is_empty() || centers.is_empty() {
        (0, false)
    } else {
        lloyd::iterate(histogram, &mut centers, options, lloyd::accumulate::<N>)
    };

    KmeansOutput {
        palette: from_components(centers),
        iterations,
        converged,
    }
}

/// Runs k-means in parallel on the given histogram starting from `initial_centroids`.
///
/// The result is identical to [`run`].
#[cfg(feature = "threads")]
#[must_use]
pub fn run_par<Color, const N: usize>(
    histogram: &Histogram<Color, N>,
    initial_centroids: Centroids<Color>,
    options: &KmeansOptions,
) -> KmeansOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    let mut centers = to_components(initial_centroids.into_inner());

    let (iterations, converged) = if histogram.is_empty() || centers.is_empty() {
        (0, false)
    } else {
        lloyd::iterate(histogram, &mut centers, options, lloyd::accumulate_par::<N>)
    };

    KmeansOutput {
        palette: from_components(centers),
        iterations,
        converged,
    }
}

/// Samples `k` initial centers from the histogram and runs k-means.
///
/// # Errors
/// Returns an error if `k` is zero or the histogram is empty.
pub fn palette<Color, const N: usize>(
    histogram: &Histogram<Color, N>,
    k: PaletteSize,
    options: &KmeansOptions,
) -> Result<KmeansOutput<Color>, QuantizeError>
where
    Color: ColorComponents<u8, N>,
{
    let centroids = sample_centers(histogram, k, options)?;
    Ok(run(histogram, centroids, options))
}

/// Samples `k` initial centers from the histogram and runs k-means in parallel.
///
/// # Errors
/// Returns an error if `k` is zero or the histogram is empty.
#[cfg(feature = "threads")]
pub fn palette_par<Color, const N: usize>(
    histogram: &Histogram<Color, N>,
    k: PaletteSize,
    options: &KmeansOptions,
) -> Result<KmeansOutput<Color>, QuantizeError>
where
    Color: ColorComponents<u8, N>,
{
    let centroids = sample_centers(histogram, k, options)?;
    Ok(run_par(histogram, centroids, options))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{tests::*, ColorMask};
    use palette::{Srgb, Srgba};

    fn sorted(mut palette: Vec<Srgb<u8>>) -> Vec<Srgb<u8>> {
        palette.sort_by_key(|&c| cast::into_array(c));
        palette
    }

    #[test]
    fn two_colors_separate_from_any_seed() {
        let black = Srgb::new(0u8, 0, 0);
        let white = Srgb::new(255u8, 255, 255);
        let pixels = vec![black, black, white, white];
        let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);

        for weighting in [Weighting::Count, Weighting::Uniform] {
            for seed in 0..32 {
                let options = KmeansOptions::new().weighting(weighting).seed(seed);
                let output = palette(&histogram, 2.into(), &options).unwrap();
                assert_eq!(sorted(output.palette), vec![black, white]);
                assert!(output.converged);
            }
        }

        // both centers start on the same color
        for start in [black, white] {
            let centroids = Centroids::try_from(vec![start, start]).unwrap();
            let output = run(&histogram, centroids, &KmeansOptions::new());
            assert_eq!(sorted(output.palette), vec![black, white]);
        }
    }

    #[test]
    fn solid_color() {
        let color = Srgb::new(30u8, 60, 90);
        let pixels = vec![color; 16];
        let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);
        assert_eq!(histogram.counts(), &[16]);

        let output = palette(&histogram, 2.into(), &KmeansOptions::new()).unwrap();
        assert_eq!(output.palette, vec![color, color]);
        assert_eq!(output.iterations, 1);
        assert!(output.converged);
    }

    #[test]
    fn empty_cluster_keeps_center() {
        let black = Srgb::new(0u8, 0, 0);
        let gray = Srgb::new(10u8, 10, 10);
        let far = Srgb::new(200u8, 200, 200);
        let pixels = vec![black, black, black, gray];
        let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);
        let centroids = Centroids::try_from(vec![Srgb::new(5, 5, 5), far]).unwrap();

        let output = run(&histogram, centroids.clone(), &KmeansOptions::new());
        assert_eq!(output.palette, vec![Srgb::new(2, 2, 2), far]);
        assert_eq!(output.iterations, 2);
        assert!(output.converged);

        let options = KmeansOptions::new().weighting(Weighting::Uniform);
        let output = run(&histogram, centroids, &options);
        assert_eq!(output.palette, vec![Srgb::new(5, 5, 5), far]);
        assert_eq!(output.iterations, 1);
    }

    #[test]
    fn distinct_colors_are_a_fixed_point() {
        let colors = test_data_1024();
        let histogram = Histogram::new(&colors[..64], ColorMask::IDENTITY);
        let centroids = Centroids::try_from(histogram.colors().to_vec()).unwrap();

        for weighting in [Weighting::Count, Weighting::Uniform] {
            let options = KmeansOptions::new().weighting(weighting);
            let output = run(&histogram, centroids.clone(), &options);
            assert_eq!(output.palette, centroids.as_slice());
            assert_eq!(output.iterations, 1);
            assert!(output.converged);
        }
    }

    #[test]
    fn iteration_cap() {
        let colors = gradient_image();
        let histogram = Histogram::new(&colors, ColorMask::IDENTITY);

        let options = KmeansOptions::new().max_iterations(5).convergence_threshold(0);
        let output = palette(&histogram, 16.into(), &options).unwrap();
        assert_eq!(output.iterations, 5);
        assert!(!output.converged);

        let options = KmeansOptions::new().max_iterations(0);
        let centroids = sample_centers(&histogram, 16.into(), &options).unwrap();
        let output = run(&histogram, centroids.clone(), &options);
        assert_eq!(output.palette, centroids.into_inner());
        assert_eq!(output.iterations, 0);

        let options = KmeansOptions::new();
        let output = palette(&histogram, 16.into(), &options).unwrap();
        assert!(output.iterations <= options.get_max_iterations());
    }

    #[test]
    fn empty_inputs() {
        let histogram = Histogram::<Srgb<u8>, 3>::default();
        let centroids = Centroids::try_from(vec![Srgb::new(1u8, 2, 3)]).unwrap();
        let output = run(&histogram, centroids, &KmeansOptions::new());
        assert_eq!(output.palette, vec![Srgb::new(1, 2, 3)]);
        assert_eq!(output.iterations, 0);

        let pixels = vec![Srgb::new(1u8, 2, 3)];
        let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);
        let output = run(
            &histogram,
            Centroids::from_truncated(Vec::new()),
            &KmeansOptions::new(),
        );
        assert!(output.palette.is_empty());
    }

    #[test]
    fn deterministic() {
        let colors = test_data_1024();
        let histogram = Histogram::new(&colors, ColorMask::drop_low_bits(1));
        let options = KmeansOptions::new().seed(7);

        let first = palette(&histogram, 32.into(), &options).unwrap();
        let second = palette(&histogram, 32.into(), &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.palette.len(), 32);
    }

    #[test]
    fn rgba_centers_average_alpha() {
        let pixels = vec![
            Srgba::new(0u8, 0, 0, 0),
            Srgba::new(0, 0, 0, 100),
            Srgba::new(0, 0, 0, 100),
            Srgba::new(250, 250, 250, 255),
        ];
        let histogram = Histogram::new(&pixels, ColorMask::IDENTITY);
        let centers = vec![Srgba::new(0, 0, 0, 0), Srgba::new(255, 255, 255, 0)];
        let centroids = Centroids::try_from(centers).unwrap();

        let output = run(&histogram, centroids.clone(), &KmeansOptions::new());
        assert_eq!(
            output.palette,
            vec![Srgba::new(0, 0, 0, 66), Srgba::new(250, 250, 250, 255)]
        );

        let options = KmeansOptions::new().weighting(Weighting::Uniform);
        let output = run(&histogram, centroids, &options);
        assert_eq!(
            output.palette,
            vec![Srgba::new(0, 0, 0, 50), Srgba::new(250, 250, 250, 255)]
        );
    }

    #[test]
    fn too_many_centroids() {
        let colors = vec![Srgb::new(0u8, 0, 0); MAX_K + 1];
        assert_eq!(
            Centroids::try_from(colors.clone()),
            Err(ConfigError::PaletteTooLarge {
                k: MAX_K + 1,
                max: MAX_K,
            })
        );
        assert_eq!(Centroids::from_truncated(colors).num_colors(), 256);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn single_and_multi_threaded_match() {
        let colors = [test_data_1024().as_slice(), gradient_image().as_slice()].concat();
        let histogram = Histogram::new(&colors, ColorMask::IDENTITY);

        for weighting in [Weighting::Count, Weighting::Uniform] {
            let options = KmeansOptions::new().weighting(weighting).seed(3);
            let single = palette(&histogram, 64.into(), &options).unwrap();
            let par = palette_par(&histogram, 64.into(), &options).unwrap();
            assert_eq!(single, par);
        }
    }
}
