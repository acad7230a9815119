use std::sync::Arc;

use chrono::NaiveDate;
use image::{imageops, GrayImage, RgbImage};

use super::anchor::locate;
use super::blocks::{booked_band, detect_blocks, hue_mask, open_band, Band, BandSource, RowAnchors};
use super::calibration::{Calibration, HsvRange, PixelRect};
use super::columns::{group_columns, ColumnMatcher, NearestCenterMatcher, ResolvedColumn};
use super::dates::{DateCounts, DayReader};
use super::diagnostics::Diagnostics;
use super::observation::build_observation;
use super::ocr::TextRecognizer;
use super::period::resolve_period;
use super::templates::AnchorTemplates;
use crate::error::ExtractionError;
use crate::models::{Period, ScanObservation, ShiftKind};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Result of one row pass.
struct RowPass {
    counts: DateCounts,
    resolved: Vec<ResolvedColumn>,
    complete: bool,
}

impl RowPass {
    fn skipped() -> Self {
        Self {
            counts: DateCounts::default(),
            resolved: Vec::new(),
            complete: false,
        }
    }
}

/// A band is trustworthy as ground truth when it was placed from its label
/// (or a static band still found blocks) and every column got a date.
fn band_complete(band: Band, blocks: usize, dropped: usize) -> bool {
    dropped == 0 && (band.source == BandSource::Anchored || blocks > 0)
}

fn describe(counts: &DateCounts) -> String {
    counts
        .iter()
        .map(|(date, count)| format!("{}x{count}", date.format("%d")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turns one calendar screenshot into a [`ScanObservation`].
pub struct ShiftExtractor {
    templates: AnchorTemplates,
    recognizer: Arc<dyn TextRecognizer>,
    matcher: Box<dyn ColumnMatcher>,
    calibration: Calibration,
    diagnostics: Diagnostics,
}

impl ShiftExtractor {
    pub fn new(
        templates: AnchorTemplates,
        recognizer: Arc<dyn TextRecognizer>,
        calibration: Calibration,
    ) -> Self {
        Self {
            templates,
            recognizer,
            matcher: Box::new(NearestCenterMatcher::default()),
            calibration,
            diagnostics: Diagnostics::disabled(),
        }
    }

    pub fn with_matcher(mut self, matcher: impl ColumnMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Blocking. `expected` is the month navigation believes is on screen;
    /// the caption wins if they disagree.
    pub fn extract(
        &self,
        screenshot: &RgbImage,
        expected: Period,
    ) -> Result<ScanObservation, ExtractionError> {
        let gray = imageops::grayscale(screenshot);
        let cal = &self.calibration;

        let resolved = resolve_period(
            &gray,
            &self.templates.arrow,
            self.recognizer.as_ref(),
            expected,
            cal,
            &self.diagnostics,
        )?;
        let period = resolved.period;

        let label_search = Some(cal.label_search.to_rect(gray.width(), gray.height()));
        let anchors = RowAnchors {
            open: locate(&gray, &self.templates.open_label, label_search, cal.anchor_threshold),
            booked: locate(&gray, &self.templates.booked_label, label_search, cal.anchor_threshold),
        };
        if anchors.open.is_none() {
            log_warn!("Open shifts label not found for {period}; using static band");
        }
        if anchors.booked.is_none() {
            log_warn!("Booked shifts label not found for {period}; using static band");
        }

        let reader = DayReader {
            recognizer: self.recognizer.as_ref(),
            calibration: cal,
            diagnostics: &self.diagnostics,
        };

        let open = match open_band(&anchors, gray.height(), cal) {
            Some(band) => self.open_pass(screenshot, &gray, band, &reader, period),
            None => RowPass::skipped(),
        };
        let booked = match booked_band(&anchors, gray.height(), cal) {
            Some(band) => self.booked_pass(
                screenshot,
                &gray,
                band,
                &reader,
                period,
                anchors.row_spacing(cal),
                &open.resolved,
            ),
            None => RowPass::skipped(),
        };

        log_info!("Open shifts detected for {period}: [{}]", describe(&open.counts));
        log_info!("Booked shifts detected for {period}: [{}]", describe(&booked.counts));

        Ok(build_observation(
            period,
            &open.counts,
            &booked.counts,
            open.complete,
            booked.complete,
        ))
    }

    fn band_blocks(
        &self,
        screenshot: &RgbImage,
        band: Band,
        hues: &[HsvRange],
        kind: ShiftKind,
        period: Period,
    ) -> Vec<PixelRect> {
        if self.diagnostics.dir().is_some() {
            let mask = hue_mask(screenshot, band, hues);
            self.diagnostics
                .save(&format!("{}-{:02}-{}-mask", period.year(), period.month(), kind.as_str()), &mask);
        }
        let blocks = detect_blocks(screenshot, band, hues, &self.calibration);
        log::debug!(
            "{} band {}..{} ({:?}): {} block(s)",
            kind.as_str(),
            band.top,
            band.bottom,
            band.source,
            blocks.len()
        );
        blocks
    }

    fn open_pass(
        &self,
        screenshot: &RgbImage,
        gray: &GrayImage,
        band: Band,
        reader: &DayReader<'_>,
        period: Period,
    ) -> RowPass {
        let cal = &self.calibration;
        let blocks = self.band_blocks(screenshot, band, &cal.open_hues, ShiftKind::Open, period);

        let mut pass = RowPass::skipped();
        let mut dropped = 0;
        for column in group_columns(&blocks, cal.column_tolerance_px) {
            let Some(top) = column.top_block() else {
                continue;
            };
            match reader.read_day(gray, top, 0, period) {
                Some(date) => {
                    pass.counts.add(date, column.len() as u32);
                    pass.resolved.push(ResolvedColumn {
                        center_x: column.center_x(),
                        date,
                    });
                }
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            log_warn!("{dropped} open column(s) in {period} had no readable day");
        }
        pass.complete = band_complete(band, blocks.len(), dropped);
        pass
    }

    #[allow(clippy::too_many_arguments)]
    fn booked_pass(
        &self,
        screenshot: &RgbImage,
        gray: &GrayImage,
        band: Band,
        reader: &DayReader<'_>,
        period: Period,
        row_spacing: u32,
        open_columns: &[ResolvedColumn],
    ) -> RowPass {
        let cal = &self.calibration;
        let blocks = self.band_blocks(screenshot, band, &cal.booked_hues, ShiftKind::Booked, period);

        let mut pass = RowPass::skipped();
        let mut dropped = 0;
        for column in group_columns(&blocks, cal.column_tolerance_px) {
            let Some(top) = column.top_block() else {
                continue;
            };
            let reused: Option<NaiveDate> = self
                .matcher
                .match_column(column.center_x(), open_columns)
                .and_then(|index| open_columns.get(index))
                .map(|open| open.date);
            let date = match reused {
                Some(date) => Some(date),
                None => reader.read_day(gray, top, row_spacing, period),
            };
            match date {
                Some(date) => pass.counts.add(date, column.len() as u32),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            log_warn!("{dropped} booked column(s) in {period} had no readable day");
        }
        pass.complete = band_complete(band, blocks.len(), dropped);
        pass
    }
}
