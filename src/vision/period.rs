use std::sync::OnceLock;

use image::GrayImage;
use regex::Regex;

use super::anchor::locate;
use super::calibration::{Calibration, PixelRect};
use super::diagnostics::Diagnostics;
use super::ocr::{RecognitionMode, TextRecognizer};
use super::upscaled_crop;
use crate::error::ExtractionError;
use crate::models::Period;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionSource {
    /// Crop placed next to the navigation arrow.
    Anchored,
    /// Fixed fallback crop.
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub period: Period,
    pub source: CaptionSource,
    /// The screenshot shows a different month than the caller expected.
    pub drifted: bool,
}

fn caption_regex() -> Option<&'static Regex> {
    static CAPTION: OnceLock<Option<Regex>> = OnceLock::new();
    CAPTION
        .get_or_init(|| Regex::new(r"([A-Za-z]+)\s*(20\d{2})").ok())
        .as_ref()
}

fn month_number(token: &str) -> Option<u32> {
    let token = token.to_ascii_lowercase();
    if token.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|name| name.starts_with(&token))
        .map(|index| index as u32 + 1)
}

/// Pull a month and year out of OCR text such as "September 2025".
/// Accepts full names and abbreviations of three or more letters.
pub fn parse_caption(text: &str) -> Option<Period> {
    caption_regex()?.captures_iter(text).find_map(|caps| {
        let month = month_number(caps.get(1)?.as_str())?;
        let year: i32 = caps.get(2)?.as_str().parse().ok()?;
        Period::new(year, month)
    })
}

/// Read the displayed month. Tries the arrow-relative crop first, then
/// the static one. Both failing is fatal for this screenshot.
pub fn resolve_period(
    gray: &GrayImage,
    arrow: &GrayImage,
    recognizer: &dyn TextRecognizer,
    expected: Period,
    calibration: &Calibration,
    diagnostics: &Diagnostics,
) -> Result<ResolvedPeriod, ExtractionError> {
    let search = calibration.arrow_search.to_rect(gray.width(), gray.height());
    let anchored = locate(gray, arrow, Some(search), calibration.anchor_threshold).map(|hit| {
        PixelRect::new(
            hit.right() + calibration.caption_gap_px,
            hit.y,
            calibration.caption_width_px,
            hit.height,
        )
    });
    if anchored.is_none() {
        log::debug!("navigation arrow not found; using static caption crop");
    }

    let attempts = [
        (CaptionSource::Anchored, anchored),
        (CaptionSource::Static, Some(calibration.static_caption)),
    ];

    let mut last_error = None;
    let mut recognized_any = false;
    for (source, rect) in attempts {
        let Some(crop) = rect.and_then(|r| upscaled_crop(gray, r, calibration.ocr_upscale)) else {
            continue;
        };
        diagnostics.save(&format!("caption-{source:?}").to_lowercase(), &crop);

        let text = match recognizer.recognize(&crop, RecognitionMode::Line) {
            Ok(text) => text,
            Err(err) => {
                log::debug!("caption OCR failed ({source:?}): {err:#}");
                last_error = Some(err);
                continue;
            }
        };
        recognized_any = true;

        if let Some(period) = parse_caption(&text) {
            let drifted = period != expected;
            if drifted {
                log_warn!("Navigation drift: expected {expected}, screenshot shows {period}; using {period}");
            }
            return Ok(ResolvedPeriod {
                period,
                source,
                drifted,
            });
        }
        log::debug!("caption text {:?} did not parse ({source:?})", text.trim());
    }

    match last_error {
        Some(err) if !recognized_any => Err(ExtractionError::Recognition(err)),
        _ => Err(ExtractionError::PeriodUnresolved { expected }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ocr::testing::ScriptedRecognizer;
    use image::Luma;

    #[test]
    fn parses_captions() {
        assert_eq!(parse_caption("September 2025"), Period::new(2025, 9));
        assert_eq!(parse_caption("  < june2026 >"), Period::new(2026, 6));
        assert_eq!(parse_caption("Sept 2025"), Period::new(2025, 9));
        assert_eq!(parse_caption("Today | Mar 2027"), Period::new(2027, 3));
        assert_eq!(parse_caption("Shifts 2025"), None);
        assert_eq!(parse_caption("September 1999"), None);
        assert_eq!(parse_caption(""), None);
    }

    fn blank() -> GrayImage {
        GrayImage::from_pixel(640, 400, Luma([230]))
    }

    fn arrow() -> GrayImage {
        GrayImage::from_fn(12, 12, |x, y| Luma([if x > y { 20 } else { 240 }]))
    }

    #[test]
    fn falls_back_to_static_crop() {
        let recognizer = ScriptedRecognizer::new().line("October 2025");
        let expected = Period::new(2025, 10).unwrap();
        let resolved = resolve_period(
            &blank(),
            &arrow(),
            &recognizer,
            expected,
            &Calibration::default(),
            &Diagnostics::disabled(),
        )
        .unwrap();

        assert_eq!(resolved.period, expected);
        assert_eq!(resolved.source, CaptionSource::Static);
        assert!(!resolved.drifted);
        assert_eq!(recognizer.call_count(RecognitionMode::Line), 1);
    }

    #[test]
    fn anchored_crop_and_drift() {
        let mut screen = blank();
        image::imageops::replace(&mut screen, &arrow(), 100, 40);
        let recognizer = ScriptedRecognizer::new().line("November 2025");

        let resolved = resolve_period(
            &screen,
            &arrow(),
            &recognizer,
            Period::new(2025, 10).unwrap(),
            &Calibration::default(),
            &Diagnostics::disabled(),
        )
        .unwrap();

        assert_eq!(resolved.period, Period::new(2025, 11).unwrap());
        assert_eq!(resolved.source, CaptionSource::Anchored);
        assert!(resolved.drifted);
        // 200 x 12 caption, upscaled twice
        assert_eq!(recognizer.calls.lock().unwrap()[0].1, (400, 24));
    }

    #[test]
    fn arrow_outside_search_region_is_ignored() {
        let mut screen = blank();
        image::imageops::replace(&mut screen, &arrow(), 500, 300);
        let recognizer = ScriptedRecognizer::new().line("October 2025");

        let resolved = resolve_period(
            &screen,
            &arrow(),
            &recognizer,
            Period::new(2025, 10).unwrap(),
            &Calibration::default(),
            &Diagnostics::disabled(),
        )
        .unwrap();

        assert_eq!(resolved.source, CaptionSource::Static);
        assert_eq!(recognizer.call_count(RecognitionMode::Line), 1);
    }

    #[test]
    fn unreadable_caption_is_unresolved() {
        let recognizer = ScriptedRecognizer::new().line("???").line("Shifts");
        let err = resolve_period(
            &blank(),
            &arrow(),
            &recognizer,
            Period::new(2025, 10).unwrap(),
            &Calibration::default(),
            &Diagnostics::disabled(),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::PeriodUnresolved { .. }));
    }
}
