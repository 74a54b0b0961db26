//! Lloyd iterations over the histogram colors.

use super::{KmeansOptions, Weighting};
use crate::{
    color::{l1_distance, NearestTable},
    ColorComponents, Histogram,
};

use tracing::{debug, trace};
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The weighted channel sums of the colors assigned to each center during one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClusterSums<const N: usize> {
    /// The weighted sum of each channel, per center.
    sums: Vec<[u64; N]>,
    /// The total weight assigned to each center.
    weights: Vec<u64>,
}

impl<const N: usize> ClusterSums<N> {
    /// Creates zeroed sums for `k` centers.
    pub(crate) fn new(k: usize) -> Self {
        Self {
            sums: vec![[0; N]; k],
            weights: vec![0; k],
        }
    }

    /// Adds `color` with the given weight to the sums of `center`.
    #[inline]
    pub(crate) fn add(&mut self, center: usize, color: [u8; N], weight: u64) {
        for (sum, c) in self.sums[center].iter_mut().zip(color) {
            *sum += u64::from(c) * weight;
        }
        self.weights[center] += weight;
    }

    /// Element-wise adds the sums of `other` into `self`.
    #[must_use]
    pub(crate) fn merge(mut self, other: Self) -> Self {
        for (sum, other) in self.sums.iter_mut().zip(other.sums) {
            for (a, b) in sum.iter_mut().zip(other) {
                *a += b;
            }
        }
        for (weight, other) in self.weights.iter_mut().zip(other.weights) {
            *weight += other;
        }
        self
    }

    /// Moves each non-empty center to the truncated mean of its assigned colors.
    ///
    /// Returns the largest L1 distance moved by any center.
    pub(crate) fn update(&self, centers: &mut [[u8; N]]) -> u32 {
        let mut movement = 0;
        for ((center, sum), &weight) in centers.iter_mut().zip(&self.sums).zip(&self.weights) {
            if weight == 0 {
                continue;
            }

            // the mean of u8 values fits in a u8
            #[allow(clippy::cast_possible_truncation)]
            let mean = sum.map(|s| (s / weight) as u8);
            movement = movement.max(l1_distance(*center, mean));
            *center = mean;
        }
        movement
    }
}

/// Assigns each distinct color to its nearest center and sums the results.
pub(crate) fn accumulate<const N: usize>(
    colors: &[[u8; N]],
    counts: &[u32],
    table: &NearestTable,
    weighting: Weighting,
    k: usize,
) -> ClusterSums<N> {
    let mut sums = ClusterSums::new(k);
    for (&color, &count) in colors.iter().zip(counts) {
        sums.add(table.nearest(color), color, weighting.weight(count));
    }
    sums
}

/// Like [`accumulate`], but each rayon worker sums into its own [`ClusterSums`]
/// which are then merged.
#[cfg(feature = "threads")]
pub(crate) fn accumulate_par<const N: usize>(
    colors: &[[u8; N]],
    counts: &[u32],
    table: &NearestTable,
    weighting: Weighting,
    k: usize,
) -> ClusterSums<N> {
    colors
        .par_iter()
        .zip(counts)
        .fold(
            || ClusterSums::new(k),
            |mut sums, (&color, &count)| {
                sums.add(table.nearest(color), color, weighting.weight(count));
                sums
            },
        )
        .reduce(|| ClusterSums::new(k), ClusterSums::merge)
}

/// Runs Lloyd iterations on `centers` in place.
///
/// Returns the number of iterations run and whether the iterations converged.
pub(crate) fn iterate<Color, const N: usize>(
    histogram: &Histogram<Color, N>,
    centers: &mut [[u8; N]],
    options: &KmeansOptions,
    accumulate: impl Fn(&[[u8; N]], &[u32], &NearestTable, Weighting, usize) -> ClusterSums<N>,
) -> (u32, bool)
where
    Color: ColorComponents<u8, N>,
{
    let KmeansOptions {
        max_iterations,
        convergence_threshold,
        weighting,
        ..
    } = *options;

    let colors = histogram.color_components();
    let counts = histogram.counts();
    let k = centers.len();

    for iteration in 1..=max_iterations {
        let table = NearestTable::new(centers);
        let sums = accumulate(colors, counts, &table, weighting, k);
        let movement = sums.update(centers);

        trace!(iteration, movement, "k-means iteration");

        if movement < convergence_threshold {
            debug!(iterations = iteration, k, "k-means converged");
            return (iteration, true);
        }
    }

    debug!(
        iterations = max_iterations,
        k,
        "k-means stopped at the iteration limit"
    );
    (max_iterations, false)
}
