//! Draw overlay boxes onto the displayed image.

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use std::path::Path;

use super::OverlayBox;

const STROKE: i64 = 2;

pub fn annotate(image: &RgbaImage, overlays: &[OverlayBox]) -> RgbaImage {
    let mut out = image.clone();
    for overlay in overlays {
        let [r, g, b] = overlay.bucket.color();
        draw_rectangle(
            &mut out,
            overlay.left.round() as i64,
            overlay.top.round() as i64,
            (overlay.left + overlay.width).round() as i64,
            (overlay.top + overlay.height).round() as i64,
            Rgba([r, g, b, 255]),
        );
    }
    out
}

pub fn save_annotated(image: &RgbaImage, overlays: &[OverlayBox], path: &Path) -> Result<()> {
    annotate(image, overlays)
        .save(path)
        .with_context(|| format!("write annotated image to {}", path.display()))
}

fn draw_rectangle(image: &mut RgbaImage, left: i64, top: i64, right: i64, bottom: i64, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;
    let left = left.clamp(0, max_x);
    let right = right.clamp(0, max_x);
    let top = top.clamp(0, max_y);
    let bottom = bottom.clamp(0, max_y);

    for offset in 0..STROKE {
        for x in left..=right {
            put(image, x, top + offset, color);
            put(image, x, bottom - offset, color);
        }
        for y in top..=bottom {
            put(image, left + offset, y, color);
            put(image, right - offset, y, color);
        }
    }
}

fn put(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ConfidenceBucket;

    #[test]
    fn box_edges_are_painted_in_bucket_color() {
        let base = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let overlay = OverlayBox {
            rank: 1,
            bucket: ConfidenceBucket::High,
            left: 5.0,
            top: 5.0,
            width: 10.0,
            height: 10.0,
        };
        let out = annotate(&base, &[overlay]);
        let [r, g, b] = ConfidenceBucket::High.color();
        assert_eq!(out.get_pixel(5, 5), &Rgba([r, g, b, 255]));
        assert_eq!(out.get_pixel(15, 10), &Rgba([r, g, b, 255]));
        assert_eq!(out.get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn out_of_range_boxes_are_clipped() {
        let base = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let overlay = OverlayBox {
            rank: 1,
            bucket: ConfidenceBucket::Low,
            left: -10.0,
            top: -10.0,
            width: 100.0,
            height: 100.0,
        };
        let out = annotate(&base, &[overlay]);
        assert_eq!(out.dimensions(), (4, 4));
    }
}
