//! Contains the types and functions for the high level quantization API.

mod quantizer;

pub use quantizer::{FixedPalette, Quantizer};

pub use crate::{
    kmeans::{Initialization, KmeansOptions, Weighting},
    remap::AlphaMode,
};

use crate::{
    kmeans, remap, ColorComponents, ColorMask, ConfigError, Histogram, PaletteSize, PixelBuffer,
    QuantizeError, QuantizeOutput,
};
use tracing::debug;

/// A builder struct to specify the parameters for quantization.
///
/// # Examples
/// ```
/// # use kquant::{QuantizeOptions, ColorMask, AlphaMode, Weighting};
/// let options = QuantizeOptions::new()
///     .palette_size(64.into())
///     .color_mask(ColorMask::drop_low_bits(2))
///     .alpha_mode(AlphaMode::FromCenter)
///     .weighting(Weighting::Uniform)
///     .max_iterations(16)
///     .seed(7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantizeOptions {
    /// The number of centers.
    palette_size: PaletteSize,
    /// The mask applied to pixel colors when building the histogram.
    color_mask: ColorMask,
    /// How the alpha channel is written back.
    alpha_mode: AlphaMode,
    /// The k-means parameters.
    kmeans: KmeansOptions,
}

impl Default for QuantizeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl QuantizeOptions {
    /// The default palette size.
    pub const DEFAULT_PALETTE_SIZE: PaletteSize = PaletteSize::from_clamped(28);

    /// Creates a new [`QuantizeOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            palette_size: Self::DEFAULT_PALETTE_SIZE,
            color_mask: ColorMask::DEFAULT,
            alpha_mode: AlphaMode::Preserve,
            kmeans: KmeansOptions::new(),
        }
    }

    /// Sets the palette size which determines the number of centers (the maximum number of colors in the output).
    ///
    /// The default palette size is [`QuantizeOptions::DEFAULT_PALETTE_SIZE`].
    #[must_use]
    pub const fn palette_size(mut self, size: PaletteSize) -> Self {
        self.palette_size = size;
        self
    }

    /// Sets the mask applied to each pixel's color before the colors are counted.
    ///
    /// The default is [`ColorMask::DEFAULT`], which drops the lowest bit of red, green, and blue.
    /// Use [`ColorMask::IDENTITY`] to count every color exactly.
    ///
    /// Quantizing an already quantized image again is generally not a no-op.
    /// Initial centers are drawn with replacement, so some palette colors may go unused,
    /// and a lossy mask moves any palette color with bits it clears
    /// (e.g., an odd channel value under the default mask) before k-means starts.
    /// Use [`FixedPalette`] to reapply a known palette exactly.
    #[must_use]
    pub const fn color_mask(mut self, mask: ColorMask) -> Self {
        self.color_mask = mask;
        self
    }

    /// Sets how the alpha channel of RGBA pixels is written back.
    ///
    /// The default is [`AlphaMode::Preserve`].
    #[must_use]
    pub const fn alpha_mode(mut self, alpha_mode: AlphaMode) -> Self {
        self.alpha_mode = alpha_mode;
        self
    }

    /// Replaces all of the k-means parameters at once.
    #[must_use]
    pub const fn kmeans(mut self, kmeans: KmeansOptions) -> Self {
        self.kmeans = kmeans;
        self
    }

    /// Sets the maximum number of k-means iterations.
    ///
    /// See [`KmeansOptions::max_iterations`].
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.kmeans = self.kmeans.max_iterations(max_iterations);
        self
    }

    /// Sets the k-means convergence threshold.
    ///
    /// See [`KmeansOptions::convergence_threshold`].
    #[must_use]
    pub const fn convergence_threshold(mut self, threshold: u32) -> Self {
        self.kmeans = self.kmeans.convergence_threshold(threshold);
        self
    }

    /// Sets how distinct colors are weighted when computing cluster means.
    ///
    /// See [`KmeansOptions::weighting`].
    #[must_use]
    pub const fn weighting(mut self, weighting: Weighting) -> Self {
        self.kmeans = self.kmeans.weighting(weighting);
        self
    }

    /// Sets how the initial centers are sampled.
    ///
    /// See [`KmeansOptions::initialization`].
    #[must_use]
    pub const fn initialization(mut self, initialization: Initialization) -> Self {
        self.kmeans = self.kmeans.initialization(initialization);
        self
    }

    /// Sets the seed value for the random number generator.
    ///
    /// See [`KmeansOptions::seed`].
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.kmeans = self.kmeans.seed(seed);
        self
    }

    /// Returns the palette size.
    #[must_use]
    pub const fn get_palette_size(&self) -> PaletteSize {
        self.palette_size
    }

    /// Returns the color mask.
    #[must_use]
    pub const fn get_color_mask(&self) -> ColorMask {
        self.color_mask
    }

    /// Returns the alpha mode.
    #[must_use]
    pub const fn get_alpha_mode(&self) -> AlphaMode {
        self.alpha_mode
    }

    /// Returns the k-means parameters.
    #[must_use]
    pub const fn get_kmeans(&self) -> &KmeansOptions {
        &self.kmeans
    }

    /// Checks these options against an image of `num_pixels` pixels.
    ///
    /// # Errors
    /// Returns [`QuantizeError::EmptyInput`] if there are no pixels,
    /// [`ConfigError::ZeroPaletteSize`] if the palette size is zero,
    /// or [`ConfigError::PaletteExceedsPixels`] if the palette size is larger than the number of pixels.
    pub fn validate(&self, num_pixels: u32) -> Result<(), QuantizeError> {
        let k = self.palette_size.as_usize();
        let pixels = num_pixels as usize;

        if pixels == 0 {
            Err(QuantizeError::EmptyInput)
        } else if k == 0 {
            Err(ConfigError::ZeroPaletteSize.into())
        } else if k > pixels {
            Err(ConfigError::PaletteExceedsPixels { k, pixels }.into())
        } else {
            Ok(())
        }
    }
}

/// Quantizes the image in `buffer` in place using k-means.
///
/// The options are validated before the pixels are touched,
/// so on error the buffer is left unchanged.
///
/// # Errors
/// See [`QuantizeOptions::validate`].
///
/// # Examples
/// ```
/// # use kquant::{PixelBuffer, QuantizeOptions, QuantizeError, ColorMask};
/// # use palette::Srgb;
/// # fn main() -> Result<(), QuantizeError> {
/// let mut pixels = vec![Srgb::new(0u8, 0, 0), Srgb::new(0, 0, 0), Srgb::new(255, 255, 255), Srgb::new(255, 255, 255)];
/// let mut buffer = PixelBuffer::new(&mut pixels, 2, 2)?;
///
/// let options = QuantizeOptions::new()
///     .palette_size(2.into())
///     .color_mask(ColorMask::IDENTITY);
///
/// let output = kquant::quantize(&mut buffer, &options)?;
/// assert_eq!(output.counts.iter().sum::<u32>(), 4);
/// assert_eq!(pixels[3], Srgb::new(255, 255, 255));
/// # Ok(())
/// # }
/// ```
pub fn quantize<Color, const N: usize>(
    buffer: &mut PixelBuffer<'_, Color>,
    options: &QuantizeOptions,
) -> Result<QuantizeOutput<Color>, QuantizeError>
where
    Color: ColorComponents<u8, N>,
{
    options.validate(buffer.num_pixels())?;

    debug!(
        width = buffer.width(),
        height = buffer.height(),
        k = options.palette_size.into_inner(),
        "quantizing"
    );

    let histogram = Histogram::new(buffer.as_slice(), options.color_mask);
    debug!(colors = histogram.num_colors(), "built histogram");

    let kmeans::KmeansOutput {
        palette,
        iterations,
        converged,
    } = kmeans::palette(&histogram, options.palette_size, &options.kmeans)?;

    let counts = remap::remap(buffer, &palette, options.alpha_mode);

    Ok(QuantizeOutput {
        palette,
        counts,
        iterations,
        converged,
    })
}

/// Quantizes the image in `buffer` in place using k-means, in parallel.
///
/// The result is identical to [`quantize`].
///
/// # Errors
/// See [`QuantizeOptions::validate`].
#[cfg(feature = "threads")]
pub fn quantize_par<Color, const N: usize>(
    buffer: &mut PixelBuffer<'_, Color>,
    options: &QuantizeOptions,
) -> Result<QuantizeOutput<Color>, QuantizeError>
where
    Color: ColorComponents<u8, N> + Send + Sync,
{
    options.validate(buffer.num_pixels())?;

    debug!(
        width = buffer.width(),
        height = buffer.height(),
        k = options.palette_size.into_inner(),
        "quantizing in parallel"
    );

    let histogram = Histogram::new_par(buffer.as_slice(), options.color_mask);
    debug!(colors = histogram.num_colors(), "built histogram");

    let kmeans::KmeansOutput {
        palette,
        iterations,
        converged,
    } = kmeans::palette_par(&histogram, options.palette_size, &options.kmeans)?;

    let counts = remap::remap_par(buffer, &palette, options.alpha_mode);

    Ok(QuantizeOutput {
        palette,
        counts,
        iterations,
        converged,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;
    use palette::{cast, Srgb, Srgba};
    use std::collections::HashSet;

    fn distinct<Color, const N: usize>(pixels: &[Color]) -> HashSet<[u8; N]>
    where
        Color: ColorComponents<u8, N>,
    {
        pixels.iter().map(|&c| cast::into_array(c)).collect()
    }

    #[test]
    fn invalid_options_leave_pixels_untouched() {
        let mut pixels = Vec::<Srgb<u8>>::new();
        let mut buffer = PixelBuffer::new(&mut pixels, 0, 0).unwrap();
        assert_eq!(
            quantize(&mut buffer, &QuantizeOptions::new()),
            Err(QuantizeError::EmptyInput)
        );

        let original = test_data_1024()[..4].to_vec();
        let mut pixels = original.clone();
        let mut buffer = PixelBuffer::new(&mut pixels, 2, 2).unwrap();
        assert_eq!(
            quantize(&mut buffer, &QuantizeOptions::new().palette_size(0.into())),
            Err(QuantizeError::InvalidConfiguration(ConfigError::ZeroPaletteSize))
        );
        assert_eq!(
            quantize(&mut buffer, &QuantizeOptions::new().palette_size(5.into())),
            Err(QuantizeError::InvalidConfiguration(ConfigError::PaletteExceedsPixels {
                k: 5,
                pixels: 4,
            }))
        );
        assert_eq!(pixels, original);
    }

    #[test]
    fn solid_color() {
        let color = Srgb::new(31u8, 61, 91);
        let mut pixels = vec![color; 16];
        let mut buffer = PixelBuffer::new(&mut pixels, 4, 4).unwrap();
        let options = QuantizeOptions::new()
            .palette_size(2.into())
            .color_mask(ColorMask::IDENTITY);

        let output = quantize(&mut buffer, &options).unwrap();
        assert_eq!(output.palette, vec![color, color]);
        assert_eq!(output.counts, vec![16, 0]);
        assert_eq!(output.iterations, 1);
        assert!(output.converged);
        assert_eq!(pixels, vec![color; 16]);
    }

    #[test]
    fn two_colors() {
        let black = Srgb::new(0u8, 0, 0);
        let white = Srgb::new(255u8, 255, 255);
        let original = vec![black, black, white, white];

        for seed in 0..16 {
            let mut pixels = original.clone();
            let mut buffer = PixelBuffer::new(&mut pixels, 2, 2).unwrap();
            let options = QuantizeOptions::new()
                .palette_size(2.into())
                .color_mask(ColorMask::IDENTITY)
                .seed(seed);

            let output = quantize(&mut buffer, &options).unwrap();
            assert!(output.palette.contains(&black));
            assert!(output.palette.contains(&white));
            assert_eq!(pixels, original);
        }
    }

    #[test]
    fn mask_merges_low_bit() {
        let mut pixels = vec![Srgb::new(254u8, 10, 10), Srgb::new(255, 10, 10)];
        let histogram = Histogram::new(&pixels, ColorMask::drop_low_bits(1));
        assert_eq!(histogram.len(), 1);
        assert_eq!(histogram.counts(), &[2]);

        let mut buffer = PixelBuffer::new(&mut pixels, 2, 1).unwrap();
        let output = quantize(&mut buffer, &QuantizeOptions::new().palette_size(1.into())).unwrap();
        assert_eq!(output.palette, vec![Srgb::new(254, 10, 10)]);
        assert_eq!(pixels, vec![Srgb::new(254, 10, 10); 2]);
    }

    #[test]
    fn palette_bound() {
        let mut pixels = test_data_1024();
        let mut buffer = PixelBuffer::new(&mut pixels, 32, 32).unwrap();
        let options = QuantizeOptions::new().palette_size(16.into());

        let output = quantize(&mut buffer, &options).unwrap();
        assert_eq!(output.palette.len(), 16);
        assert_eq!(output.counts.iter().sum::<u32>(), 1024);
        assert!(output.iterations <= options.get_kmeans().get_max_iterations());
        assert!(distinct(&pixels).len() <= 16);
        for pixel in &pixels {
            assert!(output.palette.contains(pixel));
        }
    }

    #[test]
    fn preserves_alpha() {
        let original = random_srgba(1024, 3);
        let mut pixels = original.clone();
        let mut buffer = PixelBuffer::new(&mut pixels, 32, 32).unwrap();
        let options = QuantizeOptions::new().palette_size(8.into());

        let output = quantize(&mut buffer, &options).unwrap();
        for (before, after) in original.iter().zip(&pixels) {
            assert_eq!(before.alpha, after.alpha);
            assert!(output.palette.iter().any(|c| c.color == after.color));
        }
    }

    #[test]
    fn alpha_from_center() {
        let mut pixels = random_srgba(1024, 4);
        let mut buffer = PixelBuffer::new(&mut pixels, 32, 32).unwrap();
        let options = QuantizeOptions::new()
            .palette_size(8.into())
            .alpha_mode(AlphaMode::FromCenter);

        let output = quantize(&mut buffer, &options).unwrap();
        for pixel in &pixels {
            assert!(output.palette.contains(pixel));
        }
    }

    #[test]
    fn opaque_stays_opaque() {
        let mut pixels = random_srgb(1024, 8)
            .into_iter()
            .map(|c| Srgba::new(c.red, c.green, c.blue, 255))
            .collect::<Vec<_>>();
        pixels.extend(vec![Srgba::new(3u8, 5, 7, 255); 64]);
        let mut buffer = PixelBuffer::new(&mut pixels, 32, 34).unwrap();
        let options = QuantizeOptions::new()
            .palette_size(8.into())
            .alpha_mode(AlphaMode::FromCenter);

        let output = quantize(&mut buffer, &options).unwrap();
        assert!(output.palette.iter().all(|c| c.alpha == 255));
        assert!(pixels.iter().all(|p| p.alpha == 255));
    }

    #[test]
    fn deterministic() {
        let original = gradient_image();
        let options = QuantizeOptions::new().palette_size(12.into()).seed(99);

        let mut first = original.clone();
        let mut buffer = PixelBuffer::new(&mut first, 64, 64).unwrap();
        let first_output = quantize(&mut buffer, &options).unwrap();

        let mut second = original;
        let mut buffer = PixelBuffer::new(&mut second, 64, 64).unwrap();
        let second_output = quantize(&mut buffer, &options).unwrap();

        assert_eq!(first_output, second_output);
        assert_eq!(first, second);
    }

    #[test]
    fn remapping_output_is_stable() {
        let mut pixels = gradient_image();
        let mut buffer = PixelBuffer::new(&mut pixels, 64, 64).unwrap();
        let output =
            quantize(&mut buffer, &QuantizeOptions::new().palette_size(10.into())).unwrap();

        let quantized = pixels.clone();
        let fixed = FixedPalette::new(output.palette.clone()).unwrap();
        let mut buffer = PixelBuffer::new(&mut pixels, 64, 64).unwrap();
        let again = fixed.quantize(&mut buffer).unwrap();

        assert_eq!(again.counts, output.counts);
        assert_eq!(pixels, quantized);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn single_and_multi_threaded_match() {
        let original = [test_data_1024(), gradient_image()].concat();

        for weighting in [Weighting::Count, Weighting::Uniform] {
            let options = QuantizeOptions::new()
                .palette_size(32.into())
                .weighting(weighting);

            let mut single = original.clone();
            let mut buffer = PixelBuffer::new(&mut single, 64, 80).unwrap();
            let single_output = quantize(&mut buffer, &options).unwrap();

            let mut par = original.clone();
            let mut buffer = PixelBuffer::new(&mut par, 64, 80).unwrap();
            let par_output = quantize_par(&mut buffer, &options).unwrap();

            assert_eq!(single_output, par_output);
            assert_eq!(single, par);
        }
    }

    #[test]
    #[cfg(feature = "image")]
    fn quantize_rgb_image() {
        #[allow(clippy::cast_possible_truncation)]
        let mut image = image::RgbImage::from_fn(16, 8, |x, y| {
            image::Rgb([(x * 16) as u8, (y * 32) as u8, 128])
        });
        let mut buffer = PixelBuffer::try_from(&mut image).unwrap();
        let output = quantize(&mut buffer, &QuantizeOptions::new().palette_size(4.into())).unwrap();

        assert_eq!(output.counts.iter().sum::<u32>(), 16 * 8);
        for pixel in image.pixels() {
            let color = Srgb::new(pixel[0], pixel[1], pixel[2]);
            assert!(output.palette.contains(&color));
        }
    }

    #[test]
    #[cfg(feature = "image")]
    fn quantize_rgba_image() {
        let mut image = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 40]));
        let mut buffer = PixelBuffer::try_from(&mut image).unwrap();
        let options = QuantizeOptions::new()
            .palette_size(1.into())
            .color_mask(ColorMask::IDENTITY)
            .alpha_mode(AlphaMode::FromCenter);

        let output = quantize(&mut buffer, &options).unwrap();
        assert_eq!(output.palette, vec![Srgba::new(10, 20, 30, 40)]);
        assert!(image.pixels().all(|p| p.0 == [10, 20, 30, 40]));
    }
}
