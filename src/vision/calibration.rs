/// Inclusive HSV window on OpenCV's 8-bit scale (hue 0..=180).
/// When `hue_min > hue_max` the hue range wraps through red.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvRange {
    pub hue_min: u8,
    pub hue_max: u8,
    pub sat_min: u8,
    pub sat_max: u8,
    pub val_min: u8,
    pub val_max: u8,
}

impl HsvRange {
    pub const fn new(hue: (u8, u8), sat: (u8, u8), val: (u8, u8)) -> Self {
        Self {
            hue_min: hue.0,
            hue_max: hue.1,
            sat_min: sat.0,
            sat_max: sat.1,
            val_min: val.0,
            val_max: val.1,
        }
    }

    pub fn contains(&self, [h, s, v]: [u8; 3]) -> bool {
        let hue_ok = if self.hue_min <= self.hue_max {
            (self.hue_min..=self.hue_max).contains(&h)
        } else {
            h >= self.hue_min || h <= self.hue_max
        };
        hue_ok
            && (self.sat_min..=self.sat_max).contains(&s)
            && (self.val_min..=self.val_max).contains(&v)
    }
}

/// Converts one RGB pixel to HSV using OpenCV's 8-bit convention:
/// H in 0..=180 (degrees / 2), S and V in 0..=255.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };
    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round().min(255.0) as u8,
        max as u8,
    ]
}

/// Fixed-pixel rectangle in screenshot coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Intersect with an image of the given size. `None` if nothing is left.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<PixelRect> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let width = self.width.min(image_width - self.x);
        let height = self.height.min(image_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(PixelRect::new(self.x, self.y, width, height))
    }

    pub fn center_x(&self) -> u32 {
        self.x + self.width / 2
    }
}

/// Part of the screenshot given as fractions of its width and height, so
/// it follows the window when it is resized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchRegion {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl SearchRegion {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn to_rect(&self, image_width: u32, image_height: u32) -> PixelRect {
        let scale = |fraction: f32, extent: u32| {
            (fraction.clamp(0.0, 1.0) * extent as f32).round() as u32
        };
        let (x0, x1) = (scale(self.left, image_width), scale(self.right, image_width));
        let (y0, y1) = (scale(self.top, image_height), scale(self.bottom, image_height));
        PixelRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

/// Every pixel offset, colour window and score threshold the extractor
/// relies on. Re-tuning for a new window layout happens here only.
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Minimum zero-mean NCC score for an anchor to count as found.
    pub anchor_threshold: f32,
    /// Where the navigation arrow is searched for.
    pub arrow_search: SearchRegion,
    /// Where the "open shifts" and "booked shifts" labels are searched for.
    pub label_search: SearchRegion,

    /// Month caption sits this far right of the navigation arrow.
    pub caption_gap_px: u32,
    pub caption_width_px: u32,
    /// Used when the arrow is not found.
    pub static_caption: PixelRect,

    /// Open band starts this far above the "open shifts" label.
    pub open_band_margin_px: u32,
    /// Gap kept above the "booked shifts" label; the open band ends and the
    /// booked band starts here.
    pub booked_band_gap_px: u32,
    pub booked_band_height_px: u32,
    pub min_band_height_px: u32,
    /// Fractions of screenshot height used when the labels are not found.
    pub static_open_band: (f32, f32),
    pub static_booked_band: (f32, f32),

    pub open_hues: Vec<HsvRange>,
    /// Orange, red and pink variants of the booked indicator.
    pub booked_hues: Vec<HsvRange>,
    /// Radius of the square structuring element (1 = 3x3).
    pub morph_radius: u8,
    pub min_block_width_px: u32,
    pub min_block_height_px: u32,

    /// Blocks whose centres are this close belong to the same column.
    pub column_tolerance_px: u32,
    /// Day number header sits this far above a column's top block.
    pub day_offset_px: u32,
    pub day_crop_width_px: u32,
    pub day_crop_height_px: u32,
    pub ocr_upscale: u32,
    pub retry_blur_sigma: f32,
    pub retry_threshold_radius: u32,
    /// Subtracted from the local mean before thresholding.
    pub retry_threshold_offset: u8,
    pub retry_dilate_radius: u8,

    /// Booked to open row distance when either row label is missing.
    pub fallback_row_spacing_px: u32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            anchor_threshold: 0.85,
            arrow_search: SearchRegion::new(0.0, 0.0, 0.6, 0.3),
            label_search: SearchRegion::new(0.0, 0.0, 0.35, 1.0),

            caption_gap_px: 10,
            caption_width_px: 200,
            static_caption: PixelRect::new(210, 130, 210, 50),

            open_band_margin_px: 20,
            booked_band_gap_px: 10,
            booked_band_height_px: 80,
            min_band_height_px: 10,
            static_open_band: (0.44, 0.54),
            static_booked_band: (0.54, 0.64),

            open_hues: vec![HsvRange::new((5, 30), (50, 255), (50, 255))],
            booked_hues: vec![
                HsvRange::new((5, 30), (40, 255), (40, 255)),
                HsvRange::new((160, 15), (30, 255), (120, 255)),
                HsvRange::new((140, 170), (20, 120), (150, 255)),
            ],
            morph_radius: 1,
            min_block_width_px: 10,
            min_block_height_px: 10,

            column_tolerance_px: 8,
            day_offset_px: 185,
            day_crop_width_px: 35,
            day_crop_height_px: 35,
            ocr_upscale: 2,
            retry_blur_sigma: 0.8,
            retry_threshold_radius: 7,
            retry_threshold_offset: 10,
            retry_dilate_radius: 1,

            fallback_row_spacing_px: 100,
        }
    }
}
