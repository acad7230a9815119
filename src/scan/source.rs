use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

/// Drives whatever shows the calendar. Calls are blocking and run on the
/// blocking pool, one at a time.
pub trait CalendarNavigator: Send {
    /// Bring the current month on screen.
    fn reset_to_today(&mut self) -> Result<()>;
    fn capture(&mut self) -> Result<RgbImage>;
    fn advance_month(&mut self) -> Result<()>;
}

/// Replays screenshots written by an external capture step. Month `n` of a
/// cycle is read from `<n>.png` or the first `<n>-*.png` in name order.
#[derive(Debug, Clone)]
pub struct DirectoryNavigator {
    dir: PathBuf,
    index: u32,
}

impl DirectoryNavigator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn screenshot_path(&self) -> Result<PathBuf> {
        let exact = format!("{}.png", self.index);
        let prefix = format!("{}-", self.index);

        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    return false;
                };
                name == exact || (name.starts_with(&prefix) && name.ends_with(".png"))
            })
            .collect();
        candidates.sort();
        candidates.into_iter().next().ok_or_else(|| {
            anyhow!(
                "no screenshot for month {} in {}",
                self.index,
                self.dir.display()
            )
        })
    }
}

impl CalendarNavigator for DirectoryNavigator {
    fn reset_to_today(&mut self) -> Result<()> {
        self.index = 0;
        Ok(())
    }

    fn capture(&mut self) -> Result<RgbImage> {
        let path = self.screenshot_path()?;
        let image = image::open(&path)
            .with_context(|| format!("failed to decode screenshot {}", path.display()))?;
        Ok(image.to_rgb8())
    }

    fn advance_month(&mut self) -> Result<()> {
        self.index += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, shade: u8) {
        RgbImage::from_pixel(4, 3, image::Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn replays_screenshots_by_month_index() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("0-2025-09.png"), 10);
        write_png(&dir.path().join("1.png"), 20);
        write_png(&dir.path().join("10-2026-07.png"), 30);

        let mut nav = DirectoryNavigator::new(dir.path());
        nav.reset_to_today().unwrap();
        assert_eq!(nav.capture().unwrap().get_pixel(0, 0)[0], 10);

        nav.advance_month().unwrap();
        assert_eq!(nav.capture().unwrap().get_pixel(0, 0)[0], 20);

        nav.advance_month().unwrap();
        assert!(nav.capture().is_err());

        nav.reset_to_today().unwrap();
        assert_eq!(nav.index(), 0);
    }

    #[test]
    fn ignores_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0-notes.txt"), "not an image").unwrap();

        let mut nav = DirectoryNavigator::new(dir.path());
        assert!(nav.capture().is_err());
    }
}
