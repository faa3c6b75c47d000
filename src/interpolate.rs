use tracing::debug;

use crate::bbox::{BBox, Ltrb};
use crate::category::Category;
use crate::store::TrackStore;
use crate::track::{Track, TrackId};

/// Id given to ball records that had no detection of their own.
pub const INTERPOLATED_BALL_ID: TrackId = 1;

/// Fills every frame without a ball detection. Gaps between two detections are
/// linear in the bbox, leading frames copy the first detection and trailing frames
/// the last one. A clip with no ball at all is left untouched.
///
/// Returns the number of frames filled.
pub fn interpolate_ball_positions(store: &mut TrackStore) -> usize {
    let known: Vec<(usize, TrackId, BBox<Ltrb>)> = (0..store.len())
        .filter_map(|f| store.ball(f).map(|(id, t)| (f, id, t.bbox)))
        .collect();

    let (Some(first), Some(last)) = (known.first().copied(), known.last().copied()) else {
        debug!("no ball detected in the clip, nothing to interpolate");
        return 0;
    };

    let mut filled = Vec::new();

    for frame in 0..first.0 {
        filled.push((frame, first.2));
    }

    for pair in known.windows(2) {
        let (f0, _, b0) = pair[0];
        let (f1, _, b1) = pair[1];
        let span = (f1 - f0) as f32;

        for frame in f0 + 1..f1 {
            filled.push((frame, b0.lerp(&b1, (frame - f0) as f32 / span)));
        }
    }

    for frame in last.0 + 1..store.len() {
        filled.push((frame, last.2));
    }

    let count = filled.len();
    for (frame, bbox) in filled {
        let mut track = Track::new(bbox);
        track.interpolated = true;
        store.insert_track(Category::Ball, frame, INTERPOLATED_BALL_ID, track);
    }

    debug!(
        "ball interpolation: {} detected, {} filled",
        known.len(),
        count
    );

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_x(store: &TrackStore, frame: usize) -> Option<f32> {
        store.ball(frame).map(|(_, t)| t.position.x)
    }

    #[test]
    fn test_linear_fill_with_edges() {
        let mut store = TrackStore::new(7);
        store.insert(Category::Ball, 2, 1, BBox::ltrb(0.0, 0.0, 10.0, 10.0));
        store.insert(Category::Ball, 5, 1, BBox::ltrb(30.0, 0.0, 40.0, 10.0));

        assert_eq!(interpolate_ball_positions(&mut store), 5);

        let xs: Vec<_> = (0..7).map(|f| ball_x(&store, f).unwrap()).collect();
        for (x, expected) in xs.iter().zip([5.0, 5.0, 5.0, 15.0, 25.0, 35.0, 35.0]) {
            assert!((x - expected).abs() < 1e-4, "{:?}", xs);
        }
        assert!(store.ball(3).unwrap().1.interpolated);
        assert!(!store.ball(2).unwrap().1.interpolated);
    }

    #[test]
    fn test_no_ball_leaves_store_untouched() {
        let mut store = TrackStore::new(3);
        assert_eq!(interpolate_ball_positions(&mut store), 0);
        assert!((0..3).all(|f| store.ball(f).is_none()));
    }

    #[test]
    fn test_fully_detected_is_noop() {
        let mut store = TrackStore::new(2);
        store.insert(Category::Ball, 0, 3, BBox::ltrb(0.0, 0.0, 2.0, 2.0));
        store.insert(Category::Ball, 1, 3, BBox::ltrb(2.0, 0.0, 4.0, 2.0));
        assert_eq!(interpolate_ball_positions(&mut store), 0);
        assert_eq!(store.ball(1).map(|(id, _)| id), Some(3));
    }
}
