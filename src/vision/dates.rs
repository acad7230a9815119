use chrono::NaiveDate;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::{box_filter, gaussian_blur_f32};
use imageproc::morphology::dilate;

use super::calibration::{Calibration, PixelRect};
use super::diagnostics::Diagnostics;
use super::ocr::{RecognitionMode, TextRecognizer};
use super::upscaled_crop;
use crate::models::Period;

/// Date to slot count, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateCounts(Vec<(NaiveDate, u32)>);

impl DateCounts {
    /// Adds `count` slots to `date`. Two columns reading the same day
    /// accumulate rather than overwrite.
    pub fn add(&mut self, date: NaiveDate, count: u32) {
        match self.0.iter_mut().find(|(existing, _)| *existing == date) {
            Some((_, total)) => *total += count,
            None => self.0.push((date, count)),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<u32> {
        self.0
            .iter()
            .find(|(existing, _)| *existing == date)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Turn raw OCR output into a date in `period`. All digits are joined;
/// more than two digits or a day the month does not have is a miss.
pub fn parse_day(text: &str, period: Period) -> Option<NaiveDate> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.len() > 2 {
        return None;
    }
    let day: u32 = digits.parse().ok()?;
    period.day(day)
}

/// Blur, inverse adaptive threshold against the local mean, then dilate
/// so thin glyph strokes survive recognition.
pub fn preprocess_for_retry(crop: &GrayImage, calibration: &Calibration) -> GrayImage {
    let blurred = if calibration.retry_blur_sigma > 0.0 {
        gaussian_blur_f32(crop, calibration.retry_blur_sigma)
    } else {
        crop.clone()
    };

    let radius = calibration.retry_threshold_radius;
    let local_mean = box_filter(&blurred, radius, radius);
    let offset = u16::from(calibration.retry_threshold_offset);
    let binary = GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        let value = u16::from(blurred.get_pixel(x, y)[0]);
        let mean = u16::from(local_mean.get_pixel(x, y)[0]);
        if value + offset <= mean {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    if calibration.retry_dilate_radius > 0 {
        dilate(&binary, Norm::LInf, calibration.retry_dilate_radius)
    } else {
        binary
    }
}

/// Reads day numbers above block columns.
pub struct DayReader<'a> {
    pub recognizer: &'a dyn TextRecognizer,
    pub calibration: &'a Calibration,
    pub diagnostics: &'a Diagnostics,
}

impl DayReader<'_> {
    /// Header crop for a column whose top block is `top_block`.
    /// `row_shift` moves the crop up into the open row's frame when the
    /// block sits in a lower row. `None` if the crop would leave the image.
    pub fn header_rect(&self, top_block: PixelRect, row_shift: u32) -> Option<PixelRect> {
        let cal = self.calibration;
        let y = top_block
            .y
            .checked_sub(row_shift)?
            .checked_sub(cal.day_offset_px)?;
        let x = top_block.center_x().saturating_sub(cal.day_crop_width_px / 2);
        Some(PixelRect::new(x, y, cal.day_crop_width_px, cal.day_crop_height_px))
    }

    /// OCR the day above `top_block`, retrying once on a preprocessed
    /// crop. Unreadable columns yield `None`; a guessed date never comes out.
    pub fn read_day(
        &self,
        gray: &GrayImage,
        top_block: PixelRect,
        row_shift: u32,
        period: Period,
    ) -> Option<NaiveDate> {
        let rect = self.header_rect(top_block, row_shift)?;
        let crop = upscaled_crop(gray, rect, self.calibration.ocr_upscale)?;
        let tag = format!("day-{}-{}", rect.x, rect.y);
        self.diagnostics.save(&tag, &crop);

        if let Some(date) = self.recognize(&crop, period) {
            return Some(date);
        }

        let retry = preprocess_for_retry(&crop, self.calibration);
        self.diagnostics.save(&format!("{tag}-retry"), &retry);
        let date = self.recognize(&retry, period);
        if date.is_none() {
            log::debug!("day header at ({}, {}) unreadable; column dropped", rect.x, rect.y);
        }
        date
    }

    fn recognize(&self, crop: &GrayImage, period: Period) -> Option<NaiveDate> {
        match self.recognizer.recognize(crop, RecognitionMode::Digits) {
            Ok(text) => {
                let date = parse_day(&text, period);
                log::debug!("day OCR {:?} -> {:?}", text.trim(), date);
                date
            }
            Err(err) => {
                log::warn!("day OCR failed: {err:#}");
                None
            }
        }
    }
}
