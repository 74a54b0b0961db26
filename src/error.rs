//! Error types returned when validating quantization inputs.

use thiserror::Error;

/// An invalid combination of quantization parameters or buffer dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A palette of zero colors was requested.
    #[error("palette size must be at least 1")]
    ZeroPaletteSize,

    /// The requested palette size is above [`MAX_COLORS`](crate::MAX_COLORS).
    #[error("palette size {k} is above the maximum of {max}")]
    PaletteTooLarge {
        /// The requested palette size.
        k: usize,
        /// The maximum supported palette size.
        max: usize,
    },

    /// The requested palette size is larger than the number of pixels in the image.
    #[error("palette size {k} is larger than the image's {pixels} pixels")]
    PaletteExceedsPixels {
        /// The requested palette size.
        k: usize,
        /// The number of pixels in the image.
        pixels: usize,
    },

    /// The length of the pixel slice does not equal `width * height`.
    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch {
        /// The length of the pixel slice.
        len: usize,
        /// The given image width.
        width: u32,
        /// The given image height.
        height: u32,
    },

    /// The image has more than [`MAX_PIXELS`](crate::MAX_PIXELS) pixels.
    #[error("image of {pixels} pixels is above the maximum of {max}")]
    TooManyPixels {
        /// The number of pixels in the image.
        pixels: usize,
        /// The maximum supported number of pixels.
        max: u32,
    },

    /// The color type has a number of components other than 3 (RGB) or 4 (RGBA).
    #[error("colors with {0} components are not supported, expected 3 or 4")]
    UnsupportedChannels(usize),
}

/// The error type for quantization.
///
/// Every error is reported before the pixel buffer is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantizeError {
    /// The parameters or buffer dimensions are invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    /// The pixel buffer contains no pixels.
    #[error("the pixel buffer has no pixels")]
    EmptyInput,
}
