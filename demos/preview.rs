#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice
)]

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use kquant::{
    remap, AlphaMode, ColorComponents, ColorMask, Initialization, PaletteSize, PixelBuffer,
    QuantizeOptions, QuantizeOutput, Quantizer, Weighting,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Copy, Clone, ValueEnum)]
enum CliWeighting {
    Count,
    Uniform,
}

impl From<CliWeighting> for Weighting {
    fn from(value: CliWeighting) -> Self {
        match value {
            CliWeighting::Count => Weighting::Count,
            CliWeighting::Uniform => Weighting::Uniform,
        }
    }
}

#[derive(Parser)]
pub struct Options {
    #[arg(short, long, default_value_t = PaletteSize::default(), value_parser = parse_palette_size)]
    k: PaletteSize,

    /// Number of low bits to drop from each channel before counting colors.
    #[arg(long, default_value_t = 1)]
    mask_bits: u8,

    #[arg(long, value_enum, default_value_t = CliWeighting::Count)]
    weighting: CliWeighting,

    /// Draw initial centers in proportion to color counts.
    #[arg(long)]
    weighted_init: bool,

    #[arg(long, default_value_t = 64)]
    max_iterations: u32,

    #[arg(long, default_value_t = 4)]
    threshold: u32,

    #[arg(long, default_value_t = 123 * 321)]
    seed: u64,

    /// Quantize the alpha channel too instead of keeping it.
    #[arg(long)]
    alpha: bool,

    /// Paint the palette over the top-left corner as squares of this size.
    #[arg(long)]
    swatches: Option<u32>,

    #[arg(short, long, default_value_t = 0)]
    threads: u8,

    input: PathBuf,

    output: PathBuf,
}

fn parse_palette_size(s: &str) -> Result<PaletteSize, String> {
    let value: u16 = s.parse().map_err(|e| format!("{e}"))?;
    value.try_into().map_err(|e| format!("{e}"))
}

fn run<Color, const N: usize>(
    buffer: &mut PixelBuffer<'_, Color>,
    options: &QuantizeOptions,
    threads: u8,
    swatches: Option<u32>,
) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N> + Send + Sync,
{
    let time = std::time::Instant::now();
    let output = match threads {
        0 => options.quantize_par(buffer),
        1 => options.quantize(buffer),
        t => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(t.into())
                .build()
                .unwrap();

            pool.install(|| options.quantize_par(buffer))
        }
    }
    .unwrap();

    info!(
        elapsed_ms = time.elapsed().as_millis(),
        iterations = output.iterations,
        converged = output.converged,
        "quantized"
    );

    if let Some(size) = swatches {
        remap::paint_swatches(buffer, &output.palette, size);
    }

    output
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "preview=info,kquant=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let Options {
        k,
        mask_bits,
        weighting,
        weighted_init,
        max_iterations,
        threshold,
        seed,
        alpha,
        swatches,
        threads,
        input,
        output,
    } = Options::parse();

    let options = QuantizeOptions::new()
        .palette_size(k)
        .color_mask(ColorMask::drop_low_bits(mask_bits))
        .weighting(weighting.into())
        .initialization(if weighted_init {
            Initialization::Weighted
        } else {
            Initialization::Uniform
        })
        .max_iterations(max_iterations)
        .convergence_threshold(threshold)
        .seed(seed)
        .alpha_mode(if alpha {
            AlphaMode::FromCenter
        } else {
            AlphaMode::Preserve
        });

    let image = image::open(&input).unwrap();
    info!(
        width = image.width(),
        height = image.height(),
        "read {}",
        input.display()
    );

    if alpha {
        let mut image = image.into_rgba8();
        let mut buffer = PixelBuffer::try_from(&mut image).unwrap();
        let summary = run(&mut buffer, &options, threads, swatches);
        info!(
            colors = summary.palette.len(),
            "writing {}",
            output.display()
        );
        image.save(output).unwrap();
    } else {
        let mut image = image.into_rgb8();
        let mut buffer = PixelBuffer::try_from(&mut image).unwrap();
        let summary = run(&mut buffer, &options, threads, swatches);
        info!(
            colors = summary.palette.len(),
            "writing {}",
            output.display()
        );
        image.save(output).unwrap();
    }
}
