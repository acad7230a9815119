use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};

use super::anchor::AnchorMatch;
use super::calibration::{rgb_to_hsv, Calibration, HsvRange, PixelRect};

/// Row labels found on the screenshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowAnchors {
    pub open: Option<AnchorMatch>,
    pub booked: Option<AnchorMatch>,
}

impl RowAnchors {
    /// Vertical distance from the open row to the booked row.
    pub fn row_spacing(&self, calibration: &Calibration) -> u32 {
        match (self.open, self.booked) {
            (Some(open), Some(booked)) if booked.y > open.y => booked.y - open.y,
            _ => calibration.fallback_row_spacing_px,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSource {
    Anchored,
    /// Proportional fallback; results are less trustworthy.
    Static,
}

/// Full-width horizontal strip `[top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub top: u32,
    pub bottom: u32,
    pub source: BandSource,
}

impl Band {
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    fn clamped(top: u32, bottom: u32, image_height: u32, source: BandSource) -> Option<Band> {
        let bottom = bottom.min(image_height);
        (top < bottom).then_some(Band { top, bottom, source })
    }

    fn from_fractions((start, end): (f32, f32), image_height: u32) -> Option<Band> {
        let h = image_height as f32;
        Band::clamped(
            (start * h).round() as u32,
            (end * h).round() as u32,
            image_height,
            BandSource::Static,
        )
    }
}

/// The open row runs from just above its label down to the booked label,
/// so tall or wrapped rows stay inside the band.
pub fn open_band(anchors: &RowAnchors, image_height: u32, calibration: &Calibration) -> Option<Band> {
    let Some(open) = anchors.open else {
        return Band::from_fractions(calibration.static_open_band, image_height);
    };

    let top = open.y.saturating_sub(calibration.open_band_margin_px);
    let bottom = anchors
        .booked
        .filter(|booked| booked.y > open.y)
        .map(|booked| booked.y.saturating_sub(calibration.booked_band_gap_px))
        .filter(|&bottom| bottom >= top + calibration.min_band_height_px)
        .unwrap_or(open.y + calibration.fallback_row_spacing_px);
    Band::clamped(top, bottom, image_height, BandSource::Anchored)
}

pub fn booked_band(anchors: &RowAnchors, image_height: u32, calibration: &Calibration) -> Option<Band> {
    if let Some(booked) = anchors.booked {
        let top = booked.y.saturating_sub(calibration.booked_band_gap_px);
        return Band::clamped(
            top,
            top + calibration.booked_band_height_px,
            image_height,
            BandSource::Anchored,
        );
    }

    // No booked label: assume the booked row sits one row below the open one.
    if anchors.open.is_some() {
        let open = open_band(anchors, image_height, calibration)?;
        let shift = calibration.fallback_row_spacing_px;
        return Band::clamped(
            open.top + shift,
            open.bottom + shift,
            image_height,
            BandSource::Static,
        );
    }

    Band::from_fractions(calibration.static_booked_band, image_height)
}

/// Binary mask of band pixels whose colour falls in any of `hues`.
pub fn hue_mask(image: &RgbImage, band: Band, hues: &[HsvRange]) -> GrayImage {
    let width = image.width();
    GrayImage::from_fn(width, band.height(), |x, y| {
        let hsv = rgb_to_hsv(image.get_pixel(x, band.top + y).0);
        if hues.iter().any(|range| range.contains(hsv)) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Bounding boxes of indicator blocks inside `band`, in screenshot
/// coordinates, ordered left to right then top to bottom.
pub fn detect_blocks(
    image: &RgbImage,
    band: Band,
    hues: &[HsvRange],
    calibration: &Calibration,
) -> Vec<PixelRect> {
    if band.height() == 0 || band.top >= image.height() {
        return Vec::new();
    }

    let mask = hue_mask(image, band, hues);
    let radius = calibration.morph_radius;
    let cleaned = if radius > 0 {
        close(&open(&mask, Norm::LInf, radius), Norm::LInf, radius)
    } else {
        mask
    };

    // One pixel of background on every side so blocks touching the band
    // edge are still traced as outer borders.
    let mut padded = GrayImage::new(cleaned.width() + 2, cleaned.height() + 2);
    image::imageops::replace(&mut padded, &cleaned, 1, 1);

    let mut boxes: Vec<PixelRect> = find_contours::<u32>(&padded)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let xs = contour.points.iter().map(|p| p.x);
            let ys = contour.points.iter().map(|p| p.y);
            let (min_x, max_x) = (xs.clone().min()?, xs.max()?);
            let (min_y, max_y) = (ys.clone().min()?, ys.max()?);
            Some(PixelRect::new(
                min_x - 1,
                band.top + min_y - 1,
                max_x - min_x + 1,
                max_y - min_y + 1,
            ))
        })
        .filter(|rect| {
            rect.width >= calibration.min_block_width_px
                && rect.height >= calibration.min_block_height_px
        })
        .collect();

    boxes.sort_by_key(|rect| (rect.x, rect.y));
    boxes
}
