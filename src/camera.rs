//! Camera motion estimation from background feature flow.
//!
//! Corners are picked on the previous frame outside every foreground box, followed
//! into the current frame by SAD block matching, and the per-frame estimate is folded
//! into a cumulative offset that tracked positions are compensated with.

use nalgebra as na;
use ndarray::prelude::*;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bbox::BBox;
use crate::category::Category;
use crate::frame::Frame;
use crate::store::TrackStore;

pub type Displacement = na::Vector2<f32>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MotionAggregate {
    /// Largest feature displacement.
    MaxMagnitude,
    /// Component-wise median of the feature displacements.
    Median,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CameraConfig {
    /// Motion at or below this magnitude (px) counts as a static camera
    pub min_distance: f32,
    /// Maximum number of features tracked per frame
    pub max_features: usize,
    /// Minimum corner response relative to the strongest corner in the frame
    pub quality_level: f32,
    /// Minimum distance between two selected features (px)
    pub min_feature_spacing: f32,
    /// Half size of the matching block and of the corner window
    pub block_radius: usize,
    /// Maximum displacement searched in each direction (px)
    pub search_range: usize,
    /// Frames with fewer features fall back to zero motion
    pub min_features: usize,
    /// A shifted block must reach at most this fraction of the zero offset SAD
    pub match_ratio: f32,
    /// Flows within this distance (px) of the median flow agree with it
    pub inlier_tolerance: f32,
    /// Share of agreeing flows needed before the frame is trusted to have moved
    pub min_inlier_fraction: f32,
    pub aggregate: MotionAggregate,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_distance: 5.0,
            max_features: 100,
            quality_level: 0.3,
            min_feature_spacing: 3.0,
            block_radius: 3,
            search_range: 12,
            min_features: 1,
            match_ratio: 0.8,
            inlier_tolerance: 1.5,
            min_inlier_fraction: 0.5,
            aggregate: MotionAggregate::MaxMagnitude,
        }
    }
}

/// Per-frame camera displacement and its running sum. Index 0 is always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraMotion {
    pub per_frame: Vec<Displacement>,
    pub cumulative: Vec<Displacement>,
}

impl CameraMotion {
    pub fn from_deltas(per_frame: Vec<Displacement>) -> Self {
        let cumulative = accumulate(&per_frame);

        Self {
            per_frame,
            cumulative,
        }
    }

    /// Zero motion over `frames` frames.
    pub fn still(frames: usize) -> Self {
        Self::from_deltas(vec![Displacement::zeros(); frames])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.per_frame.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.per_frame.is_empty()
    }

    /// Offset of `frame` relative to frame 0; frames past the end reuse the last one.
    #[inline]
    pub fn offset(&self, frame: usize) -> Displacement {
        self.cumulative
            .get(frame)
            .or_else(|| self.cumulative.last())
            .copied()
            .unwrap_or_else(Displacement::zeros)
    }
}

/// Running sum of per-frame deltas, a strict left-to-right fold.
pub fn accumulate(deltas: &[Displacement]) -> Vec<Displacement> {
    deltas
        .iter()
        .scan(Displacement::zeros(), |acc, d| {
            *acc += d;
            Some(*acc)
        })
        .collect()
}

/// Writes `raw - cumulative[frame]` into the adjusted position of every record of
/// `category`. Always derived from the raw position, so running it twice is harmless.
pub fn adjust_category(store: &mut TrackStore, category: Category, motion: &CameraMotion) {
    for (frame, _, track) in store.iter_mut(category) {
        track.position_adjusted = Some(track.position - motion.offset(frame));
    }
}

pub fn adjust_positions(store: &mut TrackStore, motion: &CameraMotion) {
    for category in Category::ALL {
        adjust_category(store, category, motion);
    }
}

pub struct CameraMotionEstimator {
    config: CameraConfig,
    dims: (u32, u32),
    foreground: Vec<Category>,
}

impl CameraMotionEstimator {
    /// `first` fixes the expected frame size, boxes of `foreground` categories are
    /// never used as background features.
    pub fn new(first: &Frame, foreground: &[Category], config: CameraConfig) -> Self {
        Self {
            config,
            dims: first.dims(),
            foreground: foreground.to_vec(),
        }
    }

    #[inline]
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn estimate(&self, frames: &[Frame], store: &TrackStore) -> CameraMotion {
        if frames.is_empty() {
            return CameraMotion::still(0);
        }

        let gray_of = |f: &Frame| (f.dims() == self.dims).then(|| f.gray());

        let mut deltas = Vec::with_capacity(frames.len());
        deltas.push(Displacement::zeros());

        let mut prev = gray_of(&frames[0]);
        for (idx, frame) in frames.iter().enumerate().skip(1) {
            let curr = gray_of(frame);

            let delta = match (&prev, &curr) {
                (Some(p), Some(c)) => {
                    let mask = self.foreground_mask(store, idx - 1);
                    self.frame_delta(p, c, &mask).unwrap_or_else(|| {
                        debug!("frame {}: degenerate background, assuming no motion", idx);
                        Displacement::zeros()
                    })
                }
                _ => {
                    debug!("frame {}: size differs from the first frame, assuming no motion", idx);
                    Displacement::zeros()
                }
            };

            deltas.push(delta);
            prev = curr;
        }

        let motion = CameraMotion::from_deltas(deltas);
        info!(
            "camera motion: {} frames, {} with movement, total offset ({:.1}, {:.1})",
            motion.len(),
            motion.per_frame.iter().filter(|d| d.norm() > 0.0).count(),
            motion.offset(motion.len()).x,
            motion.offset(motion.len()).y,
        );

        motion
    }

    /// Pixels covered by a foreground box (grown by the block radius) are `true`.
    fn foreground_mask(&self, store: &TrackStore, frame: usize) -> Array2<bool> {
        let (w, h) = self.dims;
        let mut mask = Array2::from_elem((h as usize, w as usize), false);
        let pad = self.config.block_radius as f32;

        for &category in &self.foreground {
            for (_, track) in store.frame(category, frame) {
                let b = BBox::ltrb(
                    track.bbox.left() - pad,
                    track.bbox.top() - pad,
                    track.bbox.right() + pad + 1.0,
                    track.bbox.bottom() + pad + 1.0,
                );

                if let Some((x, y, bw, bh)) = b.clip(w, h) {
                    let (x, y) = (x as usize, y as usize);
                    mask.slice_mut(s![y..y + bh as usize, x..x + bw as usize])
                        .fill(true);
                }
            }
        }

        mask
    }

    /// Camera displacement between two frames, `Some(zero)` for a static camera and
    /// `None` when there is nothing to track.
    fn frame_delta(
        &self,
        prev: &Array2<f32>,
        curr: &Array2<f32>,
        mask: &Array2<bool>,
    ) -> Option<Displacement> {
        let features = self.select_features(prev, mask);
        if features.is_empty() || features.len() < self.config.min_features {
            return None;
        }

        let flows: Vec<Displacement> = features
            .par_iter()
            .filter_map(|&(x, y)| self.match_block(prev, curr, x, y))
            .collect();

        if flows.is_empty() {
            return None;
        }

        // a pan moves most blocks alike, noise does not
        let median = component_median(&flows);
        let inliers: Vec<Displacement> = flows
            .iter()
            .copied()
            .filter(|f| (f - median).norm() <= self.config.inlier_tolerance)
            .collect();

        if (inliers.len() as f32) < self.config.min_inlier_fraction * flows.len() as f32 {
            debug!(
                "{} of {} feature flows agree, assuming no motion",
                inliers.len(),
                flows.len()
            );
            return Some(Displacement::zeros());
        }

        let estimate = match self.config.aggregate {
            MotionAggregate::MaxMagnitude => {
                let mut best = Displacement::zeros();
                for f in &inliers {
                    if f.norm() > best.norm() {
                        best = *f;
                    }
                }
                best
            }
            MotionAggregate::Median => median,
        };

        if estimate.norm() > self.config.min_distance {
            Some(estimate)
        } else {
            Some(Displacement::zeros())
        }
    }

    /// Shi-Tomasi corners on the background, strongest first, spaced apart.
    fn select_features(&self, gray: &Array2<f32>, mask: &Array2<bool>) -> Vec<(usize, usize)> {
        let (h, w) = gray.dim();
        let r = self.config.block_radius;
        let margin = r + self.config.search_range + 1;

        if w <= 2 * margin || h <= 2 * margin {
            return Vec::new();
        }

        let (sxx, syy, sxy) = structure_integrals(gray);
        let window = |ii: &Array2<f64>, x: usize, y: usize| -> f64 {
            let (x0, y0, x1, y1) = (x - r, y - r, x + r + 1, y + r + 1);
            ii[[y1, x1]] - ii[[y0, x1]] - ii[[y1, x0]] + ii[[y0, x0]]
        };

        let mut candidates = Vec::new();
        let mut strongest = 0.0f64;
        for y in margin..h - margin {
            for x in margin..w - margin {
                if mask[[y, x]] {
                    continue;
                }

                let a = window(&sxx, x, y);
                let b = window(&syy, x, y);
                let c = window(&sxy, x, y);
                let response = (a + b) / 2.0 - (((a - b) / 2.0).powi(2) + c * c).sqrt();

                if response > 1e-6 {
                    strongest = strongest.max(response);
                    candidates.push((response, x, y));
                }
            }
        }

        let threshold = strongest * self.config.quality_level as f64;
        candidates.retain(|c| c.0 >= threshold);
        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| (a.2, a.1).cmp(&(b.2, b.1)))
        });

        let spacing2 = self.config.min_feature_spacing.powi(2);
        let mut selected: Vec<(usize, usize)> = Vec::with_capacity(self.config.max_features);
        for (_, x, y) in candidates {
            if selected.len() >= self.config.max_features {
                break;
            }

            let crowded = selected.iter().any(|&(sx, sy)| {
                let dx = sx as f32 - x as f32;
                let dy = sy as f32 - y as f32;
                dx * dx + dy * dy < spacing2
            });

            if !crowded {
                selected.push((x, y));
            }
        }

        selected
    }

    /// Displacement of the block around `(x, y)` from `prev` into `curr`. The zero
    /// offset is tried first; a shifted block replaces it only when its SAD is at
    /// most `match_ratio` of the zero offset SAD. `None` if the block does not fit.
    fn match_block(
        &self,
        prev: &Array2<f32>,
        curr: &Array2<f32>,
        x: usize,
        y: usize,
    ) -> Option<Displacement> {
        let r = self.config.block_radius as isize;
        let range = self.config.search_range as isize;
        let (h, w) = curr.dim();
        let (x, y) = (x as isize, y as isize);

        let reference = prev.slice(s![y - r..=y + r, x - r..=x + r]);
        let sad = |dx: isize, dy: isize| -> Option<f32> {
            let (cx, cy) = (x + dx, y + dy);
            if cx - r < 0 || cy - r < 0 || cx + r >= w as isize || cy + r >= h as isize {
                return None;
            }

            let target = curr.slice(s![cy - r..=cy + r, cx - r..=cx + r]);
            Some(
                reference
                    .iter()
                    .zip(target.iter())
                    .map(|(a, b)| (a - b).abs())
                    .sum(),
            )
        };

        let zero_sad = sad(0, 0)?;
        let mut best = (0isize, 0isize);
        let mut best_sad = zero_sad;

        for dy in -range..=range {
            for dx in -range..=range {
                if let Some(score) = sad(dx, dy) {
                    if score < best_sad {
                        best_sad = score;
                        best = (dx, dy);
                    }
                }
            }
        }

        if best != (0, 0) && best_sad > self.config.match_ratio * zero_sad {
            return Some(Displacement::zeros());
        }

        Some(Displacement::new(best.0 as f32, best.1 as f32))
    }
}

fn component_median(flows: &[Displacement]) -> Displacement {
    let mut xs: Vec<f32> = flows.iter().map(|f| f.x).collect();
    let mut ys: Vec<f32> = flows.iter().map(|f| f.y).collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    ys.sort_by(|a, b| a.total_cmp(b));
    Displacement::new(xs[xs.len() / 2], ys[ys.len() / 2])
}

/// Integral images of Ix², Iy² and IxIy, `(h + 1) x (w + 1)` each.
fn structure_integrals(gray: &Array2<f32>) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
    let (h, w) = gray.dim();
    let mut sxx = Array2::<f64>::zeros((h + 1, w + 1));
    let mut syy = Array2::<f64>::zeros((h + 1, w + 1));
    let mut sxy = Array2::<f64>::zeros((h + 1, w + 1));

    for y in 0..h {
        for x in 0..w {
            let (ix, iy) = if x > 0 && y > 0 && x + 1 < w && y + 1 < h {
                (
                    (gray[[y, x + 1]] - gray[[y, x - 1]]) as f64 / 2.0,
                    (gray[[y + 1, x]] - gray[[y - 1, x]]) as f64 / 2.0,
                )
            } else {
                (0.0, 0.0)
            };

            sxx[[y + 1, x + 1]] = ix * ix + sxx[[y, x + 1]] + sxx[[y + 1, x]] - sxx[[y, x]];
            syy[[y + 1, x + 1]] = iy * iy + syy[[y, x + 1]] + syy[[y + 1, x]] - syy[[y, x]];
            sxy[[y + 1, x + 1]] = ix * iy + sxy[[y, x + 1]] + sxy[[y + 1, x]] - sxy[[y, x]];
        }
    }

    (sxx, syy, sxy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(x: i64, y: i64) -> u8 {
        let mut v = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663)) as u64;
        v ^= v >> 13;
        v = v.wrapping_mul(0x5bd1_e995);
        (v >> 7) as u8
    }

    /// Textured frame whose content is moved by `(sx, sy)` pixels.
    fn shifted_frame(w: u32, h: u32, sx: i64, sy: i64) -> Frame {
        let px = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, _)| {
            texture(x as i64 - sx, y as i64 - sy)
        });
        Frame::new(px, 0.0)
    }

    fn estimator(first: &Frame) -> CameraMotionEstimator {
        CameraMotionEstimator::new(first, &[Category::Players], CameraConfig::default())
    }

    #[test]
    fn test_accumulate_is_running_sum() {
        let d = vec![
            Displacement::zeros(),
            Displacement::new(1.0, 2.0),
            Displacement::new(-3.0, 0.5),
        ];
        assert_eq!(
            accumulate(&d),
            vec![
                Displacement::zeros(),
                Displacement::new(1.0, 2.0),
                Displacement::new(-2.0, 2.5)
            ]
        );
    }

    #[test]
    fn test_identical_frames_have_no_motion() {
        let frames: Vec<_> = (0..4).map(|_| shifted_frame(96, 64, 0, 0)).collect();
        let mut store = TrackStore::new(4);
        for f in 0..4 {
            store.insert(Category::Players, f, 1, BBox::ltrb(40.0, 20.0, 50.0, 40.0));
        }

        let motion = estimator(&frames[0]).estimate(&frames, &store);
        assert!(motion.per_frame.iter().all(|d| *d == Displacement::zeros()));

        adjust_positions(&mut store, &motion);
        for (_, _, t) in store.iter(Category::Players) {
            assert_eq!(t.position_adjusted, Some(t.position));
        }
    }

    #[test]
    fn test_pan_is_detected_and_compensated() {
        let frames: Vec<_> = (0..3).map(|i| shifted_frame(96, 64, 8 * i, 0)).collect();
        let mut store = TrackStore::new(3);
        // a player standing still on the pitch drifts with the background
        for f in 0..3 {
            let x = 40.0 + 8.0 * f as f32;
            store.insert(Category::Players, f, 1, BBox::ltrb(x, 20.0, x + 10.0, 40.0));
        }

        let motion = estimator(&frames[0]).estimate(&frames, &store);
        assert_eq!(motion.per_frame[0], Displacement::zeros());
        assert_eq!(motion.per_frame[1], Displacement::new(8.0, 0.0));
        assert_eq!(motion.per_frame[2], Displacement::new(8.0, 0.0));
        assert_eq!(motion.cumulative[2], Displacement::new(16.0, 0.0));

        adjust_positions(&mut store, &motion);
        adjust_positions(&mut store, &motion);
        for (_, _, t) in store.iter(Category::Players) {
            assert_eq!(t.adjusted(), na::Point2::new(45.0, 30.0));
        }
    }

    #[test]
    fn test_small_motion_is_suppressed() {
        let frames = vec![shifted_frame(96, 64, 0, 0), shifted_frame(96, 64, 3, 0)];
        let motion = estimator(&frames[0]).estimate(&frames, &TrackStore::new(2));
        assert_eq!(motion.per_frame[1], Displacement::zeros());
    }

    #[test]
    fn test_degenerate_frames_fall_back_to_zero() {
        let flat = vec![
            Frame::filled(96, 64, [10, 10, 10], 0.0),
            Frame::filled(96, 64, [10, 10, 10], 0.0),
            Frame::filled(50, 20, [10, 10, 10], 0.0),
        ];
        let motion = estimator(&flat[0]).estimate(&flat, &TrackStore::new(3));
        assert_eq!(motion, CameraMotion::still(3));

        let tiny = vec![shifted_frame(20, 20, 0, 0), shifted_frame(20, 20, 8, 0)];
        let motion = estimator(&tiny[0]).estimate(&tiny, &TrackStore::new(2));
        assert_eq!(motion, CameraMotion::still(2));
    }

    #[test]
    fn test_foreground_is_masked() {
        let frame = shifted_frame(96, 64, 0, 0);
        let mut store = TrackStore::new(1);
        store.insert(Category::Players, 0, 1, BBox::ltrb(0.0, 0.0, 96.0, 64.0));

        let est = estimator(&frame);
        let mask = est.foreground_mask(&store, 0);
        assert!(est.select_features(&frame.gray(), &mask).is_empty());
        assert!(!est
            .select_features(&frame.gray(), &Array2::from_elem((64, 96), false))
            .is_empty());
    }

    #[test]
    fn test_median_aggregate() {
        let frames = vec![shifted_frame(96, 64, 0, 0), shifted_frame(96, 64, 0, -7)];
        let config = CameraConfig {
            aggregate: MotionAggregate::Median,
            ..CameraConfig::default()
        };
        let est = CameraMotionEstimator::new(&frames[0], &[], config);
        let motion = est.estimate(&frames, &TrackStore::new(2));
        assert_eq!(motion.per_frame[1], Displacement::new(0.0, -7.0));
    }

    #[test]
    fn test_noisy_static_camera_has_no_motion() {
        // mid-grey low-contrast texture with fresh sensor noise in every frame
        let frames: Vec<_> = (0..6i64)
            .map(|f| {
                let px = Array3::from_shape_fn((120, 200, 3), |(y, x, _)| {
                    let (x, y) = (x as i64, y as i64);
                    let base = 100 + (texture(x, y) % 21) as i32 - 10;
                    let noise = (texture(x + 1000 * f, y + 7) % 13) as i32 - 6;
                    (base + noise) as u8
                });
                Frame::new(px, f as f32)
            })
            .collect();

        for aggregate in [MotionAggregate::MaxMagnitude, MotionAggregate::Median] {
            let config = CameraConfig {
                aggregate,
                ..CameraConfig::default()
            };
            let est = CameraMotionEstimator::new(&frames[0], &[], config);
            let motion = est.estimate(&frames, &TrackStore::new(6));
            assert_eq!(motion, CameraMotion::still(6), "{:?}", aggregate);
        }
    }

    #[test]
    fn test_size_change_mid_clip() {
        let frames = vec![
            shifted_frame(96, 64, 0, 0),
            shifted_frame(96, 64, 8, 0),
            shifted_frame(50, 20, 16, 0),
            shifted_frame(96, 64, 16, 0),
            shifted_frame(96, 64, 24, 0),
        ];
        let motion = estimator(&frames[0]).estimate(&frames, &TrackStore::new(5));

        let pan = Displacement::new(8.0, 0.0);
        let zero = Displacement::zeros();
        assert_eq!(motion.per_frame, vec![zero, pan, zero, zero, pan]);
        assert_eq!(motion.offset(4), Displacement::new(16.0, 0.0));
    }
}
