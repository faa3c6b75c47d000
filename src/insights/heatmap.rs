use image::{Rgb, RgbImage};
use nalgebra as na;
use ndarray::prelude::*;

// viridis sampled at 0, 1/4, 1/2, 3/4 and 1
const VIRIDIS: [[f32; 3]; 5] = [
    [68.0, 1.0, 84.0],
    [59.0, 82.0, 139.0],
    [33.0, 145.0, 140.0],
    [94.0, 201.0, 98.0],
    [253.0, 231.0, 37.0],
];

pub fn viridis(t: f32) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f32;
    let lo = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lo as f32;

    let mut out = [0u8; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let v = VIRIDIS[lo][c] * (1.0 - frac) + VIRIDIS[lo + 1][c] * frac;
        *o = v.round() as u8;
    }

    Rgb(out)
}

/// 2-D position histogram, `counts[[x_bin, y_bin]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub counts: Array2<u32>,
    pub x_range: (f32, f32),
    pub y_range: (f32, f32),
}

impl Heatmap {
    /// Bins `positions` into a `bins` x `bins` grid spanning the data. The last bin of
    /// each axis includes its right edge; an axis without spread covers `v ± 0.5`.
    pub fn from_positions(positions: &[na::Point2<f32>], bins: usize) -> Self {
        let bins = bins.max(1);
        let mut counts = Array2::zeros((bins, bins));

        if positions.is_empty() {
            return Self {
                counts,
                x_range: (0.0, 1.0),
                y_range: (0.0, 1.0),
            };
        }

        let x_range = axis_range(positions.iter().map(|p| p.x));
        let y_range = axis_range(positions.iter().map(|p| p.y));

        for p in positions {
            let i = bin_of(p.x, x_range, bins);
            let j = bin_of(p.y, y_range, bins);
            counts[[i, j]] += 1;
        }

        Self {
            counts,
            x_range,
            y_range,
        }
    }

    #[inline]
    pub fn total(&self) -> u32 {
        self.counts.sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// x bins run left to right, y bins top to bottom, each bin is `cell` px square.
    pub fn render(&self, cell: u32) -> RgbImage {
        let cell = cell.max(1);
        let (bx, by) = self.counts.dim();
        let peak = self.counts.iter().copied().max().unwrap_or(0);

        RgbImage::from_fn(bx as u32 * cell, by as u32 * cell, |x, y| {
            let count = self.counts[[(x / cell) as usize, (y / cell) as usize]];
            if peak == 0 {
                viridis(0.0)
            } else {
                viridis(count as f32 / peak as f32)
            }
        })
    }
}

fn axis_range(values: impl Iterator<Item = f32>) -> (f32, f32) {
    let (lo, hi) = values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if lo == hi {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

#[inline]
fn bin_of(v: f32, (lo, hi): (f32, f32), bins: usize) -> usize {
    let idx = ((v - lo) / (hi - lo) * bins as f32).floor() as usize;
    idx.min(bins - 1)
}
