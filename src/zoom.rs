use image::imageops::{self, FilterType};

use crate::bbox::{BBox, Ltrb};
use crate::frame::Frame;

/// Crops `frame` to `bbox` (clamped to the frame) and scales the crop back up to the
/// full frame size. No box, or a box with nothing left inside the frame, gives the
/// frame unchanged.
pub fn crop_and_zoom(frame: &Frame, bbox: Option<&BBox<Ltrb>>) -> Frame {
    let (width, height) = frame.dims();

    let Some((x, y, w, h)) = bbox.and_then(|b| b.clip(width, height)) else {
        return frame.clone();
    };

    let image = frame.to_image();
    let crop = imageops::crop_imm(&image, x, y, w, h).to_image();
    let zoomed = imageops::resize(&crop, width, height, FilterType::Triangle);

    Frame::from_image(&zoomed, frame.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadrants() -> Frame {
        let mut f = Frame::filled(40, 20, [0, 0, 0], 1.5);
        f.fill_rect(20, 0, 20, 10, [255, 0, 0]);
        f.fill_rect(0, 10, 20, 10, [0, 0, 255]);
        f
    }

    fn close(a: [u8; 3], b: [u8; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (*x as i16 - *y as i16).abs() <= 1)
    }

    #[test]
    fn test_zoom_into_quadrant() {
        let frame = quadrants();
        let zoomed = crop_and_zoom(&frame, Some(&BBox::ltrb(20.0, 0.0, 40.0, 10.0)));

        assert_eq!(zoomed.dims(), (40, 20));
        assert_eq!(zoomed.timestamp, 1.5);
        assert!(close(zoomed.pixel(0, 0), [255, 0, 0]));
        assert!(close(zoomed.pixel(39, 19), [255, 0, 0]));
    }

    #[test]
    fn test_box_is_clamped_to_frame() {
        let frame = quadrants();
        let zoomed = crop_and_zoom(&frame, Some(&BBox::ltrb(-30.0, 12.0, 15.0, 90.0)));

        assert_eq!(zoomed.dims(), (40, 20));
        assert!(close(zoomed.pixel(20, 10), [0, 0, 255]));
    }

    #[test]
    fn test_no_box_or_degenerate_box_keeps_frame() {
        let frame = quadrants();

        assert_eq!(crop_and_zoom(&frame, None), frame);
        assert_eq!(crop_and_zoom(&frame, Some(&BBox::ltrb(50.0, 5.0, 60.0, 15.0))), frame);
        assert_eq!(crop_and_zoom(&frame, Some(&BBox::ltrb(10.0, 5.0, 10.0, 15.0))), frame);
    }
}
