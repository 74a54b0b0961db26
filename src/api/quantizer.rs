//! The [`Quantizer`] strategy trait and its implementors.

use super::QuantizeOptions;
use crate::{
    remap::{self, AlphaMode},
    ColorComponents, ConfigError, PixelBuffer, QuantizeError, QuantizeOutput, MAX_K,
};

/// A strategy for reducing an image to a palette in place.
///
/// This allows alternative quantizer configurations to be swapped in behind one interface:
/// [`QuantizeOptions`] computes the palette with k-means,
/// while [`FixedPalette`] maps onto a palette given up front.
///
/// # Examples
/// ```
/// # use kquant::{FixedPalette, PixelBuffer, QuantizeOptions, QuantizeError, Quantizer};
/// # use palette::Srgb;
/// # fn main() -> Result<(), QuantizeError> {
/// fn run(quantizer: &impl Quantizer<Srgb<u8>, 3>, pixels: &mut [Srgb<u8>]) -> Result<usize, QuantizeError> {
///     let mut buffer = PixelBuffer::new(pixels, 2, 1)?;
///     Ok(quantizer.quantize(&mut buffer)?.palette.len())
/// }
///
/// let mut pixels = vec![Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)];
/// assert_eq!(run(&QuantizeOptions::new().palette_size(2.into()), &mut pixels)?, 2);
///
/// let fixed = FixedPalette::new(vec![Srgb::new(0, 0, 0)])?;
/// assert_eq!(run(&fixed, &mut pixels)?, 1);
/// # Ok(())
/// # }
/// ```
pub trait Quantizer<Color, const N: usize>
where
    Color: ColorComponents<u8, N>,
{
    /// Quantizes the image in `buffer` in place.
    ///
    /// # Errors
    /// Returns an error if the image or parameters are invalid,
    /// in which case the buffer is left unchanged.
    fn quantize(
        &self,
        buffer: &mut PixelBuffer<'_, Color>,
    ) -> Result<QuantizeOutput<Color>, QuantizeError>;

    /// Quantizes the image in `buffer` in place, in parallel.
    ///
    /// By default, this falls back to [`Quantizer::quantize`].
    ///
    /// # Errors
    /// Returns an error if the image or parameters are invalid,
    /// in which case the buffer is left unchanged.
    #[cfg(feature = "threads")]
    fn quantize_par(
        &self,
        buffer: &mut PixelBuffer<'_, Color>,
    ) -> Result<QuantizeOutput<Color>, QuantizeError>
    where
        Color: Send + Sync,
    {
        self.quantize(buffer)
    }
}

impl<Color, const N: usize> Quantizer<Color, N> for QuantizeOptions
where
    Color: ColorComponents<u8, N>,
{
    fn quantize(
        &self,
        buffer: &mut PixelBuffer<'_, Color>,
    ) -> Result<QuantizeOutput<Color>, QuantizeError> {
        crate::quantize(buffer, self)
    }

    #[cfg(feature = "threads")]
    fn quantize_par(
        &self,
        buffer: &mut PixelBuffer<'_, Color>,
    ) -> Result<QuantizeOutput<Color>, QuantizeError>
    where
        Color: Send + Sync,
    {
        crate::quantize_par(buffer, self)
    }
}

/// A quantizer that maps every pixel onto a palette chosen up front.
///
/// No k-means is run, so [`QuantizeOutput::iterations`] is always `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPalette<Color> {
    /// The palette, holding between 1 and [`MAX_COLORS`](crate::MAX_COLORS) colors.
    palette: Vec<Color>,
    /// How the alpha channel is written back.
    alpha_mode: AlphaMode,
}

impl<Color> FixedPalette<Color> {
    /// Creates a new [`FixedPalette`] from the given colors.
    ///
    /// # Errors
    /// Returns an error if `palette` is empty or has more than [`MAX_COLORS`](crate::MAX_COLORS) colors.
    pub fn new(palette: Vec<Color>) -> Result<Self, ConfigError> {
        if palette.is_empty() {
            Err(ConfigError::ZeroPaletteSize)
        } else if palette.len() > MAX_K {
            Err(ConfigError::PaletteTooLarge {
                k: palette.len(),
                max: MAX_K,
            })
        } else {
            Ok(Self {
                palette,
                alpha_mode: AlphaMode::Preserve,
            })
        }
    }

    /// Sets how the alpha channel of RGBA pixels is written back.
    ///
    /// The default is [`AlphaMode::Preserve`].
    #[must_use]
    pub fn alpha_mode(mut self, alpha_mode: AlphaMode) -> Self {
        self.alpha_mode = alpha_mode;
        self
    }

    /// Returns the palette.
    #[must_use]
    pub fn palette(&self) -> &[Color] {
        &self.palette
    }
}

impl<Color, const N: usize> Quantizer<Color, N> for FixedPalette<Color>
where
    Color: ColorComponents<u8, N>,
{
    fn quantize(
        &self,
        buffer: &mut PixelBuffer<'_, Color>,
    ) -> Result<QuantizeOutput<Color>, QuantizeError> {
        if buffer.is_empty() {
            return Err(QuantizeError::EmptyInput);
        }

        let counts = remap::remap(buffer, &self.palette, self.alpha_mode);
        Ok(QuantizeOutput {
            palette: self.palette.clone(),
            counts,
            iterations: 0,
            converged: false,
        })
    }

    #[cfg(feature = "threads")]
    fn quantize_par(
        &self,
        buffer: &mut PixelBuffer<'_, Color>,
    ) -> Result<QuantizeOutput<Color>, QuantizeError>
    where
        Color: Send + Sync,
    {
        if buffer.is_empty() {
            return Err(QuantizeError::EmptyInput);
        }

        let counts = remap::remap_par(buffer, &self.palette, self.alpha_mode);
        Ok(QuantizeOutput {
            palette: self.palette.clone(),
            counts,
            iterations: 0,
            converged: false,
        })
    }
}
