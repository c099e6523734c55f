//! Locating reference images on a screenshot with normalized
//! cross-correlation (NCC).

use image::{imageops, GrayImage, RgbaImage};

/// Screens larger than this are downsampled before searching.
const MAX_SEARCH_DIM: u32 = 960;
/// Templates smaller than this after downsampling carry too little signal.
const MIN_TEMPLATE_DIM: u32 = 4;
const COARSE_STEP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Center of the match in full-resolution screen pixels.
    pub x: i32,
    pub y: i32,
    pub confidence: f32,
}

/// Finds the best placement of `template` on `screen`, if its NCC score
/// reaches `threshold` (0.0 to 1.0).
pub fn find_template(screen: &RgbaImage, template: &RgbaImage, threshold: f32) -> Option<TemplateMatch> {
    let screen_full = imageops::grayscale(screen);
    let template_full = imageops::grayscale(template);

    let max_dim = screen_full.width().max(screen_full.height());
    let scale = if max_dim > MAX_SEARCH_DIM {
        max_dim as f32 / MAX_SEARCH_DIM as f32
    } else {
        1.0
    };
    let screen_small = downsample(&screen_full, scale);
    let template_small = downsample(&template_full, scale);

    if template_small.width() < MIN_TEMPLATE_DIM || template_small.height() < MIN_TEMPLATE_DIM {
        return None;
    }
    if template_small.width() > screen_small.width() || template_small.height() > screen_small.height() {
        return None;
    }

    let stats = TemplateStats::new(&template_small)?;
    let (x, y, confidence) = best_match(&screen_small, &template_small, &stats)?;
    if confidence < threshold {
        return None;
    }
    let full_x = (x as f32 * scale) as i32;
    let full_y = (y as f32 * scale) as i32;
    Some(TemplateMatch {
        x: full_x + template_full.width() as i32 / 2,
        y: full_y + template_full.height() as i32 / 2,
        confidence,
    })
}

fn downsample(image: &GrayImage, scale: f32) -> GrayImage {
    if scale <= 1.0 {
        return image.clone();
    }
    let width = ((image.width() as f32 / scale) as u32).max(1);
    let height = ((image.height() as f32 / scale) as u32).max(1);
    imageops::resize(image, width, height, imageops::FilterType::Triangle)
}

struct TemplateStats {
    /// Pixel values minus the template mean.
    centered: Vec<f32>,
    norm: f32,
}

impl TemplateStats {
    /// `None` for a flat template, which correlates with nothing.
    fn new(template: &GrayImage) -> Option<Self> {
        let pixels: Vec<f32> = template.pixels().map(|p| p.0[0] as f32).collect();
        let mean = pixels.iter().sum::<f32>() / pixels.len() as f32;
        let centered: Vec<f32> = pixels.iter().map(|p| p - mean).collect();
        let norm = centered.iter().map(|p| p * p).sum::<f32>().sqrt();
        (norm > f32::EPSILON).then_some(Self { centered, norm })
    }
}

fn ncc_at(screen: &GrayImage, template: &GrayImage, stats: &TemplateStats, x: u32, y: u32) -> f32 {
    let (tw, th) = template.dimensions();
    let n = (tw * th) as f32;
    let mut sum = 0.0f32;
    for ty in 0..th {
        for tx in 0..tw {
            sum += screen.get_pixel(x + tx, y + ty).0[0] as f32;
        }
    }
    let mean = sum / n;
    let mut cross = 0.0f32;
    let mut energy = 0.0f32;
    for ty in 0..th {
        for tx in 0..tw {
            let v = screen.get_pixel(x + tx, y + ty).0[0] as f32 - mean;
            cross += v * stats.centered[(ty * tw + tx) as usize];
            energy += v * v;
        }
    }
    let denom = energy.sqrt() * stats.norm;
    if denom <= f32::EPSILON {
        return 0.0;
    }
    cross / denom
}

/// Coarse scan on a grid, then an exhaustive refine around the best cell.
fn best_match(screen: &GrayImage, template: &GrayImage, stats: &TemplateStats) -> Option<(u32, u32, f32)> {
    let max_x = screen.width() - template.width();
    let max_y = screen.height() - template.height();

    let mut best: Option<(u32, u32, f32)> = None;
    let consider = |x: u32, y: u32, best: &mut Option<(u32, u32, f32)>| {
        let score = ncc_at(screen, template, stats, x, y);
        if best.map_or(true, |(_, _, s)| score > s) {
            *best = Some((x, y, score));
        }
    };

    let mut y = 0;
    while y <= max_y {
        let mut x = 0;
        while x <= max_x {
            consider(x, y, &mut best);
            x += COARSE_STEP;
        }
        y += COARSE_STEP;
    }

    let (cx, cy, _) = best?;
    for y in cy.saturating_sub(COARSE_STEP)..=(cy + COARSE_STEP).min(max_y) {
        for x in cx.saturating_sub(COARSE_STEP)..=(cx + COARSE_STEP).min(max_x) {
            consider(x, y, &mut best);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn noisy_screen(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13) % 17 * 3) as u8;
            Rgba([v, v, v, 255])
        })
    }

    fn paint_icon(screen: &mut RgbaImage, left: u32, top: u32) {
        for y in 0..12 {
            for x in 0..16 {
                let v = if (x / 4 + y / 3) % 2 == 0 { 250 } else { 90 };
                screen.put_pixel(left + x, top + y, Rgba([v, v / 2, 20, 255]));
            }
        }
    }

    #[test]
    fn finds_the_center_of_a_painted_template() {
        let mut screen = noisy_screen(200, 120);
        paint_icon(&mut screen, 130, 56);
        let template = imageops::crop_imm(&screen, 130, 56, 16, 12).to_image();

        let found = find_template(&screen, &template, 0.9).unwrap();
        assert_eq!((found.x, found.y), (130 + 8, 56 + 6));
        assert!(found.confidence > 0.99);
    }

    #[test]
    fn finds_template_on_a_downsampled_screen() {
        let mut screen = noisy_screen(1920, 200);
        let mut big = RgbaImage::new(64, 48);
        for (x, y, p) in big.enumerate_pixels_mut() {
            let v = if (x / 16 + y / 12) % 2 == 0 { 240 } else { 30 };
            *p = Rgba([v, v, v, 255]);
        }
        imageops::replace(&mut screen, &big, 1200, 80);

        let found = find_template(&screen, &big, 0.8).unwrap();
        assert!((found.x - (1200 + 32)).abs() <= 4, "x = {}", found.x);
        assert!((found.y - (80 + 24)).abs() <= 4, "y = {}", found.y);
    }

    #[test]
    fn absent_template_is_below_threshold() {
        let screen = noisy_screen(200, 120);
        let mut elsewhere = RgbaImage::new(200, 120);
        paint_icon(&mut elsewhere, 0, 0);
        let template = imageops::crop_imm(&elsewhere, 0, 0, 16, 12).to_image();
        assert!(find_template(&screen, &template, 0.9).is_none());
    }

    #[test]
    fn flat_or_oversized_templates_never_match() {
        let screen = noisy_screen(50, 50);
        let flat = RgbaImage::from_pixel(10, 10, Rgba([128, 128, 128, 255]));
        assert!(find_template(&screen, &flat, 0.0).is_none());
        let huge = noisy_screen(60, 60);
        assert!(find_template(&screen, &huge, 0.0).is_none());
    }
}
