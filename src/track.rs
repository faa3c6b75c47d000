use crate::bbox::{BBox, Ltrb};
use nalgebra as na;

pub type TrackId = u32;

/// Geometry of one tracked object in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub bbox: BBox<Ltrb>,

    // bbox center in raw pixel space, as detected
    pub position: na::Point2<f32>,

    // camera-stabilized position, `None` until camera compensation ran
    pub position_adjusted: Option<na::Point2<f32>>,

    // filled by ball interpolation rather than by the detector
    pub interpolated: bool,
}

impl Track {
    pub fn new(bbox: BBox<Ltrb>) -> Self {
        Self {
            position: bbox.center(),
            bbox,
            position_adjusted: None,
            interpolated: false,
        }
    }

    /// Best available position: camera-adjusted when present, raw otherwise.
    #[inline]
    pub fn adjusted(&self) -> na::Point2<f32> {
        self.position_adjusted.unwrap_or(self.position)
    }
}

impl From<BBox<Ltrb>> for Track {
    #[inline]
    fn from(bbox: BBox<Ltrb>) -> Self {
        Track::new(bbox)
    }
}
