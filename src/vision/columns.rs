use chrono::NaiveDate;

use super::calibration::PixelRect;

/// Blocks stacked at one horizontal position: one calendar day, one block
/// per shift slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    blocks: Vec<PixelRect>,
}

impl Column {
    pub fn blocks(&self) -> &[PixelRect] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Topmost block; the day header is positioned relative to it.
    pub fn top_block(&self) -> Option<PixelRect> {
        self.blocks.iter().copied().min_by_key(|block| block.y)
    }

    pub fn center_x(&self) -> u32 {
        self.top_block().map_or(0, |block| block.center_x())
    }
}

/// Group blocks whose horizontal centres lie within `tolerance_px` of the
/// first block of the column. Columns come out left to right, blocks top
/// to bottom.
pub fn group_columns(blocks: &[PixelRect], tolerance_px: u32) -> Vec<Column> {
    let mut sorted = blocks.to_vec();
    sorted.sort_by_key(|block| (block.center_x(), block.y));

    let mut columns: Vec<Column> = Vec::new();
    let mut column_origin = 0;
    for block in sorted {
        match columns.last_mut() {
            Some(column) if block.center_x().abs_diff(column_origin) <= tolerance_px => {
                column.blocks.push(block);
            }
            _ => {
                column_origin = block.center_x();
                columns.push(Column {
                    blocks: vec![block],
                });
            }
        }
    }

    for column in &mut columns {
        column.blocks.sort_by_key(|block| block.y);
    }
    columns
}

/// An open-row column whose day number was read successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub center_x: u32,
    pub date: NaiveDate,
}

/// Decides which resolved open column a booked column belongs to.
pub trait ColumnMatcher: Send + Sync {
    /// Index into `open_columns`, or `None` to have the booked column read
    /// its own date.
    fn match_column(&self, booked_center_x: u32, open_columns: &[ResolvedColumn]) -> Option<usize>;
}

/// Nearest open column by horizontal centre, if within `tolerance_px`.
#[derive(Debug, Clone, Copy)]
pub struct NearestCenterMatcher {
    pub tolerance_px: u32,
}

impl Default for NearestCenterMatcher {
    fn default() -> Self {
        Self { tolerance_px: 120 }
    }
}

impl ColumnMatcher for NearestCenterMatcher {
    fn match_column(&self, booked_center_x: u32, open_columns: &[ResolvedColumn]) -> Option<usize> {
        open_columns
            .iter()
            .enumerate()
            .map(|(index, column)| (index, column.center_x.abs_diff(booked_center_x)))
            .filter(|(_, distance)| *distance <= self.tolerance_px)
            .min_by_key(|(_, distance)| *distance)
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(x: u32, y: u32) -> PixelRect {
        PixelRect::new(x, y, 30, 14)
    }

    #[test]
    fn groups_by_horizontal_position() {
        let blocks = [block(200, 100), block(50, 130), block(52, 100), block(200, 118), block(200, 136)];
        let columns = group_columns(&blocks, 8);

        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].len(), 2);
        assert_eq!(columns[0].top_block(), Some(block(52, 100)));
        assert_eq!(columns[1].len(), 3);
        assert_eq!(columns[1].blocks()[0], block(200, 100));
        assert_eq!(columns[1].center_x(), 215);
    }

    #[test]
    fn grouping_ignores_input_order() {
        let a = [block(50, 100), block(50, 120), block(300, 100)];
        let b = [block(300, 100), block(50, 120), block(50, 100)];
        assert_eq!(group_columns(&a, 8), group_columns(&b, 8));
        assert!(group_columns(&[], 8).is_empty());
    }

    #[test]
    fn nearest_within_tolerance() {
        let date = |d| NaiveDate::from_ymd_opt(2025, 9, d).unwrap();
        let open = [
            ResolvedColumn { center_x: 100, date: date(1) },
            ResolvedColumn { center_x: 260, date: date(2) },
        ];
        let matcher = NearestCenterMatcher::default();

        assert_eq!(matcher.match_column(110, &open), Some(0));
        assert_eq!(matcher.match_column(200, &open), Some(1));
        assert_eq!(matcher.match_column(500, &open), None);
        assert_eq!(matcher.match_column(100, &[]), None);

        let tight = NearestCenterMatcher { tolerance_px: 5 };
        assert_eq!(tight.match_column(110, &open), None);
    }
}
