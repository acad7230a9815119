//! Synthetic calendar screenshots for tests.

use std::sync::Arc;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use super::ocr::TextRecognizer;
use super::{AnchorTemplates, Calibration, ShiftExtractor};

pub const AMBER: Rgb<u8> = Rgb([245, 150, 40]);
pub const PINK: Rgb<u8> = Rgb([240, 170, 220]);
pub const RED: Rgb<u8> = Rgb([220, 40, 60]);

/// Hash noise; distinct seeds never correlate with each other.
pub fn texture(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let h = x.wrapping_mul(73_856_093)
            ^ y.wrapping_mul(19_349_663)
            ^ seed.wrapping_mul(83_492_791);
        Luma([(h.wrapping_mul(2_654_435_761) >> 24) as u8])
    })
}

pub fn templates() -> AnchorTemplates {
    AnchorTemplates {
        arrow: texture(16, 16, 1),
        open_label: texture(40, 12, 2),
        booked_label: texture(40, 12, 3),
    }
}

pub fn paste(canvas: &mut RgbImage, template: &GrayImage, x: u32, y: u32) {
    for (tx, ty, p) in template.enumerate_pixels() {
        canvas.put_pixel(x + tx, y + ty, Rgb([p[0], p[0], p[0]]));
    }
}

/// Only the navigation arrow; no row labels, no blocks.
pub fn blank_calendar() -> RgbImage {
    let mut img = RgbImage::from_pixel(480, 320, Rgb([250, 250, 250]));
    paste(&mut img, &templates().arrow, 60, 10);
    img
}

/// Open label at y=180, booked label at y=240.
/// Open: two slots at x=120, one at x=260. Booked: x=260 (same day as
/// the open column) and x=420 (no open column nearby).
/// Day OCR order: x=120, x=260, then the booked block at x=420.
pub fn calendar() -> RgbImage {
    let t = templates();
    let mut img = blank_calendar();
    paste(&mut img, &t.open_label, 10, 180);
    paste(&mut img, &t.booked_label, 10, 240);

    draw_filled_rect_mut(&mut img, Rect::at(120, 190).of_size(30, 14), AMBER);
    draw_filled_rect_mut(&mut img, Rect::at(120, 208).of_size(30, 14), AMBER);
    draw_filled_rect_mut(&mut img, Rect::at(260, 190).of_size(30, 14), AMBER);
    draw_filled_rect_mut(&mut img, Rect::at(260, 260).of_size(30, 14), PINK);
    draw_filled_rect_mut(&mut img, Rect::at(420, 260).of_size(30, 14), RED);
    img
}

/// Smaller layout than a real window: day headers sit 100px above their
/// column.
pub fn extractor(recognizer: Arc<dyn TextRecognizer>) -> ShiftExtractor {
    let calibration = Calibration {
        day_offset_px: 100,
        ..Calibration::default()
    };
    ShiftExtractor::new(templates(), recognizer, calibration)
}
