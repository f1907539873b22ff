//! ROI detector (spec §4.2): locate the blue header band and derive the
//! sheet/photos regions from it.
//!
//! HSV thresholding, morphological close, and connected-component
//! bounding-rect extraction are hand-rolled below — no dependency in
//! the retrieval pack wraps OpenCV's contour finder, so this is a
//! direct flood-fill-based stand-in (flagged in DESIGN.md as the
//! largest "no crate for this" component).

use crate::types::BBox;
use image::RgbImage;

const HUE_MIN: f32 = 90.0;
const HUE_MAX: f32 = 140.0;
const SAT_MIN: u8 = 50;
const VAL_MIN: u8 = 50;
const MORPH_KERNEL: i32 = 5;
const MORPH_ITERATIONS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiBboxes {
    pub header_bbox: BBox,
    pub sheet_bbox: BBox,
    pub photos_bbox: BBox,
}

/// Detect the header/sheet/photos regions. Infallible: on failure to
/// find a qualifying contour, or a bbox failing validation, falls back
/// to the fixed header geometry (spec §4.2).
pub fn detect(img: &RgbImage) -> RoiBboxes {
    let (w, h) = img.dimensions();
    let (wf, hf) = (w as f32, h as f32);

    let mask = blue_band_mask(img);
    let closed = morphological_close(&mask, w, h, MORPH_KERNEL, MORPH_ITERATIONS);
    let rects = connected_component_rects(&closed, w, h);

    let candidate = rects
        .into_iter()
        .filter(|r| {
            let (rw, rh) = (r.width(), r.height().max(1.0));
            r.y0 <= 0.45 * hf && rw >= 0.3 * wf && rw / rh >= 3.0
        })
        .max_by(|a, b| (a.width() * a.height()).partial_cmp(&(b.width() * b.height())).unwrap());

    let header_bbox = candidate
        .map(|mut r| {
            r.x1 = r.x1.min(0.65 * wf);
            r
        })
        .filter(|r| validate_header(r, wf, hf))
        .unwrap_or_else(|| fallback_header(wf, hf));

    derive(header_bbox, wf, hf)
}

/// Header height ratio must fall in [0.06, 0.25] and lie within image
/// bounds. The derived sheet bbox's width ratio (fixed at 0.62 by
/// `derive`) always satisfies spec §4.2's [0.45, 0.8] sheet-width
/// check, so only the header geometry needs validating here.
fn validate_header(bbox: &BBox, w: f32, h: f32) -> bool {
    if bbox.x0 < 0.0 || bbox.y0 < 0.0 || bbox.x1 > w || bbox.y1 > h {
        return false;
    }
    let height_ratio = bbox.height() / h;
    (0.06..=0.25).contains(&height_ratio)
}

fn fallback_header(w: f32, h: f32) -> BBox {
    eprintln!("[roi] fallback header bbox used");
    BBox::new(0.0, 0.0, 0.62 * w, 0.22 * h)
}

fn derive(header_bbox: BBox, w: f32, h: f32) -> RoiBboxes {
    let sheet_bbox = BBox::new(0.0, header_bbox.y1, 0.62 * w, h);
    let photos_bbox = BBox::new(0.62 * w, header_bbox.y1, w, h);
    RoiBboxes { header_bbox, sheet_bbox, photos_bbox }
}

fn blue_band_mask(img: &RgbImage) -> Vec<bool> {
    let (w, h) = img.dimensions();
    let mut mask = vec![false; (w * h) as usize];
    for (i, pixel) in img.pixels().enumerate() {
        let (hue, sat, val) = rgb_to_hsv(pixel.0);
        mask[i] = (HUE_MIN..=HUE_MAX).contains(&hue) && sat >= SAT_MIN && val >= VAL_MIN;
    }
    mask
}

/// OpenCV-convention HSV: H in [0,180), S/V in [0,255].
fn rgb_to_hsv(rgb: [u8; 3]) -> (f32, u8, u8) {
    let (r, g, b) = (rgb[0] as f32 / 255.0, rgb[1] as f32 / 255.0, rgb[2] as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta < 1e-6 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    } / 2.0; // OpenCV scales H to [0,180)

    let sat = if max < 1e-6 { 0.0 } else { delta / max };
    (hue, (sat * 255.0).round() as u8, (max * 255.0).round() as u8)
}

fn morphological_close(mask: &[bool], w: u32, h: u32, kernel: i32, iterations: u32) -> Vec<bool> {
    let mut current = mask.to_vec();
    for _ in 0..iterations {
        current = dilate(&current, w, h, kernel);
    }
    for _ in 0..iterations {
        current = erode(&current, w, h, kernel);
    }
    current
}

fn dilate(mask: &[bool], w: u32, h: u32, kernel: i32) -> Vec<bool> {
    let radius = kernel / 2;
    let mut out = vec![false; mask.len()];
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut hit = false;
            'scan: for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let (sx, sy) = (x + dx, y + dy);
                    if sx >= 0 && sy >= 0 && sx < w as i32 && sy < h as i32 && mask[(sy as u32 * w + sx as u32) as usize] {
                        hit = true;
                        break 'scan;
                    }
                }
            }
            out[(y as u32 * w + x as u32) as usize] = hit;
        }
    }
    out
}

fn erode(mask: &[bool], w: u32, h: u32, kernel: i32) -> Vec<bool> {
    let radius = kernel / 2;
    let mut out = vec![false; mask.len()];
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut all_set = true;
            'scan: for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let (sx, sy) = (x + dx, y + dy);
                    let set = sx >= 0 && sy >= 0 && sx < w as i32 && sy < h as i32 && mask[(sy as u32 * w + sx as u32) as usize];
                    if !set {
                        all_set = false;
                        break 'scan;
                    }
                }
            }
            out[(y as u32 * w + x as u32) as usize] = all_set;
        }
    }
    out
}

/// 4-connected flood fill to find external components, collapsed to
/// their bounding rects (a stand-in for `cv2.findContours` + `boundingRect`).
fn connected_component_rects(mask: &[bool], w: u32, h: u32) -> Vec<BBox> {
    let mut visited = vec![false; mask.len()];
    let mut rects = Vec::new();

    for start_y in 0..h {
        for start_x in 0..w {
            let idx = (start_y * w + start_x) as usize;
            if !mask[idx] || visited[idx] {
                continue;
            }
            let mut stack = vec![(start_x, start_y)];
            visited[idx] = true;
            let (mut x0, mut y0, mut x1, mut y1) = (start_x, start_y, start_x, start_y);

            while let Some((x, y)) = stack.pop() {
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);

                let neighbors = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = (ny * w + nx) as usize;
                    if mask[nidx] && !visited[nidx] {
                        visited[nidx] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            rects.push(BBox::new(x0 as f32, y0 as f32, (x1 + 1) as f32, (y1 + 1) as f32));
        }
    }
    rects
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn blue_band_image(w: u32, h: u32, band_y1: u32) -> RgbImage {
        let mut img = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
        for y in 0..band_y1 {
            for x in 0..(w * 7 / 10) {
                img.put_pixel(x, y, Rgb([30, 90, 200]));
            }
        }
        img
    }

    #[test]
    fn rgb_to_hsv_detects_blue_hue_band() {
        let (hue, sat, val) = rgb_to_hsv([30, 90, 200]);
        assert!((HUE_MIN..=HUE_MAX).contains(&hue), "hue {hue} outside band");
        assert!(sat >= SAT_MIN);
        assert!(val >= VAL_MIN);
    }

    #[test]
    fn detect_finds_header_band_from_blue_region() {
        let img = blue_band_image(1000, 1400, 140);
        let bboxes = detect(&img);
        assert!(bboxes.header_bbox.height() > 0.0);
        assert!(bboxes.header_bbox.x1 <= 0.65 * 1000.0 + 1.0);
        assert_eq!(bboxes.sheet_bbox.y0, bboxes.header_bbox.y1);
    }

    #[test]
    fn detect_falls_back_when_no_blue_band_present() {
        let img = RgbImage::from_pixel(1000, 1400, Rgb([255, 255, 255]));
        let bboxes = detect(&img);
        assert_eq!(bboxes.header_bbox, BBox::new(0.0, 0.0, 0.62 * 1000.0, 0.22 * 1400.0));
    }

    #[test]
    fn derive_splits_sheet_and_photos_at_62_percent_width() {
        let header = BBox::new(0.0, 0.0, 620.0, 200.0);
        let bboxes = derive(header, 1000.0, 1400.0);
        assert_eq!(bboxes.sheet_bbox, BBox::new(0.0, 200.0, 620.0, 1400.0));
        assert_eq!(bboxes.photos_bbox, BBox::new(620.0, 200.0, 1000.0, 1400.0));
    }
}
