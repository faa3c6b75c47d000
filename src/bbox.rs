use nalgebra as na;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

// Boxes travel as plain `[a, b, c, d]` arrays, the format is known from context.
impl<F: BBoxFormat> Serialize for BBox<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, F: BBoxFormat> Deserialize<'de> for BBox<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <[f32; 4]>::deserialize(deserializer).map(|v| BBox(v, PhantomData))
    }
}

impl<F: BBoxFormat> BBox<F> {
    /// Component-wise linear blend, `t = 0` gives `self`, `t = 1` gives `other`.
    #[inline]
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let mut out = self.0;
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a * (1.0 - t) + b * t;
        }

        BBox(out, PhantomData)
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        na::Point2::new(
            (self.0[0] + self.0[2]) / 2.0,
            (self.0[1] + self.0[3]) / 2.0,
        )
    }

    /// Bottom corners of the box, approximately where the feet of a player are.
    #[inline]
    pub fn feet(&self) -> [na::Point2<f32>; 2] {
        [
            na::Point2::new(self.0[0], self.0[3]),
            na::Point2::new(self.0[2], self.0[3]),
        ]
    }

    /// Integer pixel rectangle `(x, y, w, h)` clipped to a `width` x `height` frame,
    /// `None` when nothing of the box is left inside.
    pub fn clip(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.0[0].max(0.0).min(width as f32) as u32;
        let y1 = self.0[1].max(0.0).min(height as f32) as u32;
        let x2 = self.0[2].max(0.0).min(width as f32) as u32;
        let y2 = self.0[3].max(0.0).min(height as f32) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some((x1, y1, x2 - x1, y2 - y1))
    }
}
