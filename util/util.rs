#![allow(dead_code)]

use std::sync::OnceLock;

use image::RgbImage;
use kquant::{ColorMask, Histogram};
use palette::{cast, Srgb};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

pub const SIZES: [(u32, u32); 3] = [(480, 270), (960, 540), (1920, 1080)];

/// Smooth gradients with a little noise, so that there are many distinct but clustered colors.
pub fn synthetic_image(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as i32;
        let g = (y * 255 / height.max(1)) as i32;
        let b = ((x + y) * 127 / (width + height).max(1)) as i32;
        let noise = |c: i32, rng: &mut Xoroshiro128PlusPlus| {
            (c + rng.gen_range(-12..=12)).clamp(0, 255) as u8
        };
        image::Rgb([noise(r, &mut rng), noise(g, &mut rng), noise(b, &mut rng)])
    })
}

static SYNTHETIC_IMAGES: OnceLock<Vec<(String, RgbImage)>> = OnceLock::new();

pub fn synthetic_images() -> &'static [(String, RgbImage)] {
    SYNTHETIC_IMAGES.get_or_init(|| {
        SIZES
            .iter()
            .zip(0..)
            .map(|(&(w, h), seed)| (format!("{w}x{h}"), synthetic_image(w, h, seed)))
            .collect()
    })
}

pub fn pixels(image: &RgbImage) -> &[Srgb<u8>] {
    cast::from_component_slice(image.as_raw())
}

pub fn to_histograms(images: &[(String, RgbImage)]) -> Vec<(String, Histogram<Srgb<u8>, 3>)> {
    images
        .iter()
        .map(|(name, image)| {
            (
                name.clone(),
                Histogram::new_par(pixels(image), ColorMask::default()),
            )
        })
        .collect()
}
