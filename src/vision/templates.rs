use std::path::Path;

use anyhow::{bail, Context, Result};
use image::GrayImage;

pub const ARROW_TEMPLATE: &str = "arrow.png";
pub const OPEN_LABEL_TEMPLATE: &str = "openshifts.png";
pub const BOOKED_LABEL_TEMPLATE: &str = "bookedshifts.png";

/// Reference images for the three landmarks, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AnchorTemplates {
    /// Next-month navigation arrow; the month caption sits to its right.
    pub arrow: GrayImage,
    pub open_label: GrayImage,
    pub booked_label: GrayImage,
}

impl AnchorTemplates {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            arrow: load_template(&dir.join(ARROW_TEMPLATE))?,
            open_label: load_template(&dir.join(OPEN_LABEL_TEMPLATE))?,
            booked_label: load_template(&dir.join(BOOKED_LABEL_TEMPLATE))?,
        })
    }
}

fn load_template(path: &Path) -> Result<GrayImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to load template {}", path.display()))?
        .to_luma8();
    if image.width() == 0 || image.height() == 0 {
        bail!("template {} is empty", path.display());
    }
    Ok(image)
}
