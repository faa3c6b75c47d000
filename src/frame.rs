use image::RgbImage;
use ndarray::aview1;
use ndarray::prelude::*;

/// One decoded RGB video frame, stored row-major as `[height, width, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub pixels: Array3<u8>,
    pub timestamp: f32, // in seconds
}

impl Frame {
    #[inline]
    pub fn new(pixels: Array3<u8>, timestamp: f32) -> Self {
        Self { pixels, timestamp }
    }

    /// Solid colour frame, handy for synthetic clips.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], timestamp: f32) -> Self {
        let pixels = Array3::from_shape_fn((height as usize, width as usize, 3), |(_, _, c)| rgb[c]);

        Self { pixels, timestamp }
    }

    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, timestamp: f32) -> Option<Self> {
        let pixels = Array3::from_shape_vec((height as usize, width as usize, 3), data).ok()?;

        Some(Self { pixels, timestamp })
    }

    /// (width, height)
    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        let shape = self.pixels.shape();
        (shape[1] as u32, shape[0] as u32)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        [
            self.pixels[[y, x, 0]],
            self.pixels[[y, x, 1]],
            self.pixels[[y, x, 2]],
        ]
    }

    /// Paints `rgb` into the `(x, y, w, h)` rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, rgb: [u8; 3]) {
        let (fw, fh) = self.dims();
        let x2 = (x + w).min(fw as usize);
        let y2 = (y + h).min(fh as usize);

        if x >= x2 || y >= y2 {
            return;
        }

        let mut region = self.pixels.slice_mut(s![y..y2, x..x2, ..]);
        for mut px in region.lanes_mut(Axis(2)) {
            px.assign(&aview1(&rgb));
        }
    }

    /// BT.601 luma plane.
    pub fn gray(&self) -> Array2<f32> {
        let (w, h) = self.dims();

        Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
            0.299 * self.pixels[[y, x, 0]] as f32
                + 0.587 * self.pixels[[y, x, 1]] as f32
                + 0.114 * self.pixels[[y, x, 2]] as f32
        })
    }

    pub fn to_image(&self) -> RgbImage {
        let (w, h) = self.dims();

        RgbImage::from_fn(w, h, |x, y| image::Rgb(self.pixel(x as usize, y as usize)))
    }

    pub fn from_image(img: &RgbImage, timestamp: f32) -> Self {
        let (w, h) = img.dimensions();
        let pixels = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
            img.get_pixel(x as u32, y as u32)[c]
        });

        Self { pixels, timestamp }
    }
}

/// A fully decoded video: every frame in memory plus its frame rate.
#[derive(Debug, Clone)]
pub struct VideoClip {
    pub frames: Vec<Frame>,
    pub fps: f32,
}

impl VideoClip {
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    #[inline]
    pub fn dims(&self) -> Option<(u32, u32)> {
        self.frames.first().map(Frame::dims)
    }
}
