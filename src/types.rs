//! Contains various types needed across the crate.

use crate::{ColorComponents, ConfigError, MAX_COLORS, MAX_PIXELS};
use palette::cast::{AsArrays, AsArraysMut};
use std::fmt::Display;
#[cfg(feature = "image")]
use {
    image::{RgbImage, RgbaImage},
    palette::{cast, Srgb, Srgba},
};

/// A mutable, row-major view of an image's pixels together with its dimensions.
///
/// The invariants are that `width * height` equals the number of pixels,
/// the number of pixels is not greater than [`MAX_PIXELS`],
/// and the color type has 3 (RGB) or 4 (RGBA) components.
/// Quantization writes its result into the borrowed pixels and never resizes them.
///
/// # Examples
/// From a raw color slice:
/// ```
/// # use kquant::{PixelBuffer, QuantizeError};
/// # use palette::Srgb;
/// # fn main() -> Result<(), QuantizeError> {
/// let mut pixels = vec![Srgb::new(0u8, 0, 0); 6];
/// let buffer = PixelBuffer::new(&mut pixels, 3, 2)?;
/// assert_eq!(buffer.num_pixels(), 6);
/// # Ok(())
/// # }
/// ```
///
/// From an image (needs the `image` feature to be enabled):
/// ```no_run
/// # use kquant::PixelBuffer;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut img = image::open("some image")?.into_rgba8();
/// let buffer = PixelBuffer::try_from(&mut img)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct PixelBuffer<'a, Color> {
    /// The pixels of the image in row-major order.
    pixels: &'a mut [Color],
    /// The width of the image.
    width: u32,
    /// The height of the image.
    height: u32,
}

impl<'a, Color> PixelBuffer<'a, Color> {
    /// Creates a new [`PixelBuffer`] from a slice of pixels and the image dimensions.
    ///
    /// # Errors
    /// Returns an error if `pixels.len()` is not equal to `width * height`,
    /// if there are more than [`MAX_PIXELS`] pixels,
    /// or if `Color` does not have 3 or 4 components.
    pub fn new<const N: usize>(
        pixels: &'a mut [Color],
        width: u32,
        height: u32,
    ) -> Result<Self, ConfigError>
    where
        Color: ColorComponents<u8, N>,
    {
        if N != 3 && N != 4 {
            return Err(ConfigError::UnsupportedChannels(N));
        }

        let len = pixels.len();
        if len > MAX_PIXELS as usize {
            return Err(ConfigError::TooManyPixels {
                pixels: len,
                max: MAX_PIXELS,
            });
        }

        if u64::from(width) * u64::from(height) != len as u64 {
            return Err(ConfigError::DimensionMismatch { len, width, height });
        }

        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Returns the width of the image.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the image.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns the number of pixels in the image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_pixels(&self) -> u32 {
        self.pixels.len() as u32
    }

    /// Whether or not the image has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Returns the pixels as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Color] {
        &*self.pixels
    }

    /// Returns the pixels as a mutable slice.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [Color] {
        &mut *self.pixels
    }

    /// Returns the pixels as component arrays.
    pub(crate) fn components<const N: usize>(&self) -> &[[u8; N]]
    where
        Color: ColorComponents<u8, N>,
    {
        self.pixels.as_arrays()
    }

    /// Returns the pixels as mutable component arrays.
    pub(crate) fn components_mut<const N: usize>(&mut self) -> &mut [[u8; N]]
    where
        Color: ColorComponents<u8, N>,
    {
        self.pixels.as_arrays_mut()
    }
}

impl<'a, Color> AsRef<[Color]> for PixelBuffer<'a, Color> {
    fn as_ref(&self) -> &[Color] {
        &*self.pixels
    }
}

#[cfg(feature = "image")]
impl<'a> TryFrom<&'a mut RgbImage> for PixelBuffer<'a, Srgb<u8>> {
    type Error = ConfigError;

    fn try_from(image: &'a mut RgbImage) -> Result<Self, Self::Error> {
        let (width, height) = image.dimensions();
        let pixels = cast::from_component_slice_mut::<Srgb<u8>>(&mut **image);
        Self::new(pixels, width, height)
    }
}

#[cfg(feature = "image")]
impl<'a> TryFrom<&'a mut RgbaImage> for PixelBuffer<'a, Srgba<u8>> {
    type Error = ConfigError;

    fn try_from(image: &'a mut RgbaImage) -> Result<Self, Self::Error> {
        let (width, height) = image.dimensions();
        let pixels = cast::from_component_slice_mut::<Srgba<u8>>(&mut **image);
        Self::new(pixels, width, height)
    }
}

/// This type is used to specify the number of colors (centers) in a palette.
///
/// This is a simple new type wrapper around `u16` with the invariant that it must be
/// less than or equal to [`MAX_COLORS`].
///
/// A [`PaletteSize`] of `0` can be constructed,
/// but it is rejected with [`ConfigError::ZeroPaletteSize`] before quantization starts.
///
/// # Examples
/// Use `into` to create [`PaletteSize`]s from `u8`s.
/// For `u16`s, use `try_into` or [`PaletteSize::from_clamped`].
/// You can also use the [`PaletteSize::MAX`] constant.
///
/// From a `u8`:
/// ```
/// # use kquant::PaletteSize;
/// let size = PaletteSize::from(16);
/// let size: PaletteSize = 16.into();
/// ```
///
/// From a `u16`:
/// ```
/// # use kquant::{PaletteSize, ConfigError};
/// # fn main() -> Result<(), ConfigError> {
/// let size = PaletteSize::try_from(128u16)?;
/// let size: PaletteSize = 128u16.try_into()?;
/// let size = PaletteSize::from_clamped(1024);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PaletteSize(u16);

impl PaletteSize {
    /// The maximum supported palette size (given by [`MAX_COLORS`]).
    pub const MAX: Self = Self(MAX_COLORS);

    /// Gets the inner `u16` value.
    #[must_use]
    pub const fn into_inner(self) -> u16 {
        self.0
    }

    /// Gets the inner value as a `usize`.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Creates a [`PaletteSize`] by clamping the given `u16` to be less than or equal to [`MAX_COLORS`].
    #[must_use]
    pub const fn from_clamped(value: u16) -> Self {
        if value <= MAX_COLORS {
            Self(value)
        } else {
            Self(MAX_COLORS)
        }
    }
}

impl Default for PaletteSize {
    fn default() -> Self {
        Self(28)
    }
}

impl From<PaletteSize> for u16 {
    fn from(val: PaletteSize) -> Self {
        val.into_inner()
    }
}

impl From<u8> for PaletteSize {
    fn from(value: u8) -> Self {
        Self(value.into())
    }
}

impl TryFrom<u16> for PaletteSize {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= MAX_COLORS {
            Ok(PaletteSize(value))
        } else {
            Err(ConfigError::PaletteTooLarge {
                k: value.into(),
                max: MAX_COLORS.into(),
            })
        }
    }
}

impl Display for PaletteSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_inner())
    }
}

/// The output struct returned by the quantization functions.
///
/// The pixel buffer itself is modified in place; this only summarizes the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizeOutput<Color> {
    /// The final palette (the k-means centers).
    ///
    /// The colors in the palette are not guaranteed to be unique,
    /// since coinciding initial centers may never separate.
    pub palette: Vec<Color>,
    /// The number of pixels that were remapped to each color in `palette`.
    ///
    /// Each count is not guaranteed to be non-zero.
    pub counts: Vec<u32>,
    /// The number of k-means iterations that were run.
    ///
    /// This is never greater than the configured maximum number of iterations,
    /// and it is `0` for quantizers that do not iterate.
    pub iterations: u32,
    /// Whether k-means stopped because the center movement fell below the convergence threshold.
    pub converged: bool,
}

impl<Color> Default for QuantizeOutput<Color> {
    fn default() -> Self {
        Self {
            palette: Vec::new(),
            counts: Vec::new(),
            iterations: 0,
            converged: false,
        }
    }
}
