use image::{imageops, GrayImage};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{match_template_parallel, MatchTemplateMethod};

use super::calibration::PixelRect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorMatch {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
}

impl AnchorMatch {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Best zero-mean normalized cross-correlation position of `template` in
/// `image`, as `(x, y, score)` with score in [-1, 1].
///
/// Flat windows carry no structure to correlate against and are skipped.
/// Returns `None` when the template is larger than the image or is itself
/// flat. A template the size of the image has exactly one position.
pub fn best_match(image: &GrayImage, template: &GrayImage) -> Option<(u32, u32, f32)> {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let n = f64::from(tw) * f64::from(th);
    let t_sum: f64 = template.pixels().map(|p| f64::from(p[0])).sum();
    let t_mean = t_sum / n;
    let t_var: f64 = template
        .pixels()
        .map(|p| (f64::from(p[0]) - t_mean).powi(2))
        .sum();
    if t_var <= f64::EPSILON {
        return None;
    }

    // Raw correlation gives sum(I*T); the integral images give the window
    // mean and variance needed to centre it.
    let ccorr = match_template_parallel(image, template, MatchTemplateMethod::CrossCorrelation);
    let integral = integral_image::<_, u64>(image);
    let integral_sq = integral_squared_image::<_, u64>(image);

    let mut best: Option<(u32, u32, f32)> = None;
    for (x, y, raw) in ccorr.enumerate_pixels() {
        let (right, bottom) = (x + tw - 1, y + th - 1);
        let sum = sum_image_pixels(&integral, x, y, right, bottom)[0] as f64;
        let sum_sq = sum_image_pixels(&integral_sq, x, y, right, bottom)[0] as f64;
        let window_var = sum_sq - sum * sum / n;
        if window_var <= 1e-6 {
            continue;
        }

        let numerator = f64::from(raw[0]) - t_mean * sum;
        let score = (numerator / (window_var * t_var).sqrt()).clamp(-1.0, 1.0) as f32;
        if best.map_or(true, |(_, _, current)| score > current) {
            best = Some((x, y, score));
        }
    }
    best
}

/// Locate `template` within `region` (or the whole image). Returns the
/// match in full-image coordinates when its score reaches `threshold`.
pub fn locate(
    image: &GrayImage,
    template: &GrayImage,
    region: Option<PixelRect>,
    threshold: f32,
) -> Option<AnchorMatch> {
    let cropped;
    let (offset_x, offset_y, haystack) = match region {
        Some(rect) => {
            let rect = rect.clamp_to(image.width(), image.height())?;
            cropped = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
            (rect.x, rect.y, &cropped)
        }
        None => (0, 0, image),
    };

    let (x, y, score) = best_match(haystack, template)?;
    log::debug!("anchor best score {score:.3} at ({}, {})", x + offset_x, y + offset_y);
    if score < threshold {
        return None;
    }

    Some(AnchorMatch {
        x: x + offset_x,
        y: y + offset_y,
        width: template.width(),
        height: template.height(),
        score,
    })
}
