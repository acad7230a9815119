use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::GrayImage;

/// Optional sink for intermediate crops and masks. Write failures are
/// logged and otherwise ignored.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn save(&self, name: &str, image: &GrayImage) {
        let Some(dir) = &self.dir else {
            return;
        };
        if let Err(err) = fs::create_dir_all(dir) {
            log::warn!("diagnostics: cannot create {}: {err}", dir.display());
            return;
        }
        let path = dir.join(format!("{name}.png"));
        if let Err(err) = image.save(&path) {
            log::warn!("diagnostics: failed to write {}: {err}", path.display());
        }
    }

    /// Remove everything previously written. Returns the number of files
    /// deleted.
    pub fn clear(&self) -> Result<usize> {
        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to list {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn save_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let diagnostics = Diagnostics::new(dir.path().join("diag"));
        diagnostics.save("mask", &GrayImage::from_pixel(4, 4, Luma([255])));
        diagnostics.save("crop", &GrayImage::from_pixel(4, 4, Luma([0])));

        assert!(dir.path().join("diag/mask.png").exists());
        assert_eq!(diagnostics.clear().unwrap(), 2);
        assert_eq!(diagnostics.clear().unwrap(), 0);
    }

    #[test]
    fn disabled_is_a_no_op() {
        let diagnostics = Diagnostics::disabled();
        diagnostics.save("mask", &GrayImage::new(2, 2));
        assert_eq!(diagnostics.clear().unwrap(), 0);
    }
}
