//! Screenshot to shift observation.
//!
//! Everything is positioned relative to anchors found by template
//! matching, with static fallbacks when an anchor is missing.

pub mod anchor;
pub mod blocks;
pub mod calibration;
pub mod columns;
pub mod dates;
pub mod diagnostics;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod observation;
pub mod ocr;
pub mod period;
pub mod pipeline;
pub mod templates;

use image::{imageops, imageops::FilterType, GrayImage};

pub use calibration::{Calibration, HsvRange, PixelRect};
pub use columns::{ColumnMatcher, NearestCenterMatcher};
pub use diagnostics::Diagnostics;
pub use ocr::{RecognitionMode, TextRecognizer};
pub use pipeline::ShiftExtractor;
pub use templates::AnchorTemplates;

/// Crop `rect` (clamped to the image) and enlarge it with a cubic filter
/// for recognition.
pub(crate) fn upscaled_crop(image: &GrayImage, rect: PixelRect, scale: u32) -> Option<GrayImage> {
    let rect = rect.clamp_to(image.width(), image.height())?;
    let crop = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
    if scale <= 1 {
        return Some(crop);
    }
    Some(imageops::resize(
        &crop,
        rect.width * scale,
        rect.height * scale,
        FilterType::CatmullRom,
    ))
}
