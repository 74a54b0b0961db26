//! A library for deterministic color quantization through k-means clustering.
//!
//! `kquant` reduces an RGB or RGBA pixel buffer to a small palette in place.
//! Quantization runs in four stages:
//! 1. A [`Histogram`] deduplicates the (optionally masked) pixel colors.
//! 2. Initial centers are drawn from the distinct colors with a seeded random number generator
//!    (see [`kmeans::sample_centers`]).
//! 3. Lloyd's k-means refines the centers over the histogram (see [`kmeans::run`]).
//! 4. Every pixel is replaced by its nearest center (see [`remap`]).
//!
//! # Features
//! - `threads`: exposes parallel versions of each stage via [`rayon`].
//! - `image`: enables integration with the [`image`] crate.
//!
//! # Example
//! ```
//! # use kquant::{PixelBuffer, QuantizeOptions, QuantizeError, Weighting};
//! # use palette::Srgb;
//! # fn main() -> Result<(), QuantizeError> {
//! let mut pixels = vec![Srgb::new(0u8, 0, 0), Srgb::new(255, 255, 255), Srgb::new(250, 250, 250), Srgb::new(4, 4, 4)];
//! let mut buffer = PixelBuffer::new(&mut pixels, 2, 2)?;
//!
//! let options = QuantizeOptions::new()
//!     .palette_size(2.into())
//!     .weighting(Weighting::Uniform);
//!
//! let output = kquant::quantize(&mut buffer, &options)?;
//! assert!(output.palette.len() == 2);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod api;
mod color;
mod error;
mod histogram;
mod traits;
mod types;

pub mod kmeans;
pub mod remap;

pub use api::*;
pub use color::{pack, unpack, ColorMask};
pub use error::*;
pub use histogram::Histogram;
pub use traits::*;
pub use types::*;

/// The maximum supported image size in number of pixels is `u32::MAX`.
pub const MAX_PIXELS: u32 = u32::MAX;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// `MAX_COLORS` as a `usize` for array and `Vec` lengths.
pub(crate) const MAX_K: usize = MAX_COLORS as usize;

#[cfg(test)]
pub(crate) mod tests {
    //! Shared test data generators.

    use palette::{Srgb, Srgba};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;

    /// Generates `len` random RGB colors from a fixed seed.
    pub fn random_srgb(len: usize, seed: u64) -> Vec<Srgb<u8>> {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
        (0..len)
            .map(|_| Srgb::new(rng.gen(), rng.gen(), rng.gen()))
            .collect()
    }

    /// Generates `len` random RGBA colors from a fixed seed.
    pub fn random_srgba(len: usize, seed: u64) -> Vec<Srgba<u8>> {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
        (0..len)
            .map(|_| Srgba::new(rng.gen(), rng.gen(), rng.gen(), rng.gen()))
            .collect()
    }

    /// 1024 random RGB colors.
    pub fn test_data_1024() -> Vec<Srgb<u8>> {
        random_srgb(1024, 42)
    }

    /// 256 random RGB colors, suitable as a full palette.
    pub fn test_data_256() -> Vec<Srgb<u8>> {
        random_srgb(256, 7)
    }

    /// A 64x64 image made of a few smooth gradients, so that it has many repeated colors.
    pub fn gradient_image() -> Vec<Srgb<u8>> {
        #[allow(clippy::cast_possible_truncation)]
        (0..64u32)
            .flat_map(|y| {
                (0..64u32)
                    .map(move |x| Srgb::new((x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8))
            })
            .collect()
    }
}
