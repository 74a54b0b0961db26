//! Traits shared across the crate.

use palette::cast::ArrayCast;

/// A color type that can be viewed as an array of `N` components.
///
/// The quantization stages work with `ColorComponents<u8, 3>` (RGB)
/// and `ColorComponents<u8, 4>` (RGBA, with alpha as the last component).
/// This is implemented for color types like [`palette::Srgb<u8>`] and [`palette::Srgba<u8>`].
pub trait ColorComponents<Component, const N: usize>:
    ArrayCast<Array = [Component; N]> + Copy + 'static
{
}

impl<Color, Component, const N: usize> ColorComponents<Component, N> for Color where
    Color: ArrayCast<Array = [Component; N]> + Copy + 'static
{
}
