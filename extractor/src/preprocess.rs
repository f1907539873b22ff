//! Image preprocessor (spec §4.1). Upscale small images, denoise,
//! sharpen, then CLAHE on the lightness channel — fixed order, no
//! conditional skipping except the upscale-if-small guard.
//!
//! Grounded in SPEC_FULL §4.1: decode via the `image` crate;
//! denoise/sharpen/CLAHE are hand-rolled pixel-space routines since no
//! pack dependency wraps OpenCV's `fastNlMeansDenoisingColored`/CLAHE.

use crate::error::PipelineError;
use image::{imageops, DynamicImage, GenericImageView, Rgb, RgbImage};

const TARGET_MIN_HEIGHT: u32 = 1500;
const SHARPEN_KERNEL: [[f32; 3]; 3] = [[-1.0, -1.0, -1.0], [-1.0, 9.0, -1.0], [-1.0, -1.0, -1.0]];
const CLAHE_TILES: u32 = 8;
const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Run the fixed preprocessing pipeline over raw image bytes, returning
/// a normalized RGB image. Decode failure is the only failure mode
/// (spec §4.1: "Failure: decode error ⇒ fails with DecodeError.
/// Otherwise infallible.").
pub fn run(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(run_on_image(decoded))
}

pub fn run_on_image(decoded: DynamicImage) -> RgbImage {
    let upscaled = upscale_if_small(decoded);
    let denoised = denoise(&upscaled);
    let sharpened = sharpen(&denoised);
    clahe_lightness(&sharpened)
}

fn upscale_if_small(img: DynamicImage) -> RgbImage {
    let (_, height) = img.dimensions();
    if height < TARGET_MIN_HEIGHT {
        let scale = TARGET_MIN_HEIGHT as f32 / height as f32;
        let new_width = (img.width() as f32 * scale).round() as u32;
        img.resize_exact(new_width, TARGET_MIN_HEIGHT, imageops::FilterType::Lanczos3)
            .to_rgb8()
    } else {
        img.to_rgb8()
    }
}

/// Moderate-strength colored denoise: a small box-blur average,
/// standing in for `fastNlMeansDenoisingColored` at "~6" strength —
/// nothing in the retrieval pack depends on OpenCV, so this is a pure
/// pixel-space approximation rather than a faithful non-local-means port.
fn denoise(img: &RgbImage) -> RgbImage {
    box_blur(img, 1)
}

fn box_blur(img: &RgbImage, radius: i32) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = RgbImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let (sx, sy) = (x + dx, y + dy);
                    if sx >= 0 && sy >= 0 && sx < w as i32 && sy < h as i32 {
                        let p = img.get_pixel(sx as u32, sy as u32);
                        for c in 0..3 {
                            sum[c] += p[c] as u32;
                        }
                        count += 1;
                    }
                }
            }
            let avg = Rgb([
                (sum[0] / count.max(1)) as u8,
                (sum[1] / count.max(1)) as u8,
                (sum[2] / count.max(1)) as u8,
            ]);
            out.put_pixel(x as u32, y as u32, avg);
        }
    }
    out
}

/// 3x3 high-pass convolution (spec §4.1's exact kernel).
fn sharpen(img: &RgbImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = img.clone();
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut acc = [0f32; 3];
            for ky in 0..3i32 {
                for kx in 0..3i32 {
                    let (sx, sy) = (
                        (x + kx - 1).clamp(0, w as i32 - 1),
                        (y + ky - 1).clamp(0, h as i32 - 1),
                    );
                    let p = img.get_pixel(sx as u32, sy as u32);
                    let weight = SHARPEN_KERNEL[ky as usize][kx as usize];
                    for c in 0..3 {
                        acc[c] += p[c] as f32 * weight;
                    }
                }
            }
            out.put_pixel(
                x as u32,
                y as u32,
                Rgb([acc[0].clamp(0.0, 255.0) as u8, acc[1].clamp(0.0, 255.0) as u8, acc[2].clamp(0.0, 255.0) as u8]),
            );
        }
    }
    out
}

/// Convert to LAB, apply CLAHE (clip 2.0, 8x8 tiles) on L, convert back.
fn clahe_lightness(img: &RgbImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut lab: Vec<(f32, f32, f32)> = Vec::with_capacity((w * h) as usize);
    for p in img.pixels() {
        lab.push(rgb_to_lab(p.0));
    }

    let l_channel: Vec<u8> = lab.iter().map(|(l, _, _)| (l / 100.0 * 255.0).round().clamp(0.0, 255.0) as u8).collect();
    let equalized = clahe(&l_channel, w, h, CLAHE_TILES, CLAHE_TILES, CLAHE_CLIP_LIMIT);

    let mut out = RgbImage::new(w, h);
    for (i, (_, a, b)) in lab.iter().enumerate() {
        let l = equalized[i] as f32 / 255.0 * 100.0;
        let rgb = lab_to_rgb(l, *a, *b);
        out.put_pixel((i as u32) % w, (i as u32) / w, Rgb(rgb));
    }
    out
}

/// Contrast-limited adaptive histogram equalization over a single
/// 8-bit channel: per-tile clipped histogram equalization, then
/// bilinear blending between the four nearest tile mappings.
fn clahe(channel: &[u8], width: u32, height: u32, tiles_x: u32, tiles_y: u32, clip_limit: f32) -> Vec<u8> {
    let tile_w = (width as f32 / tiles_x as f32).ceil() as u32;
    let tile_h = (height as f32 / tiles_y as f32).ceil() as u32;

    let mut mappings: Vec<[u8; 256]> = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            mappings.push(tile_mapping(channel, width, x0, y0, x1, y1, clip_limit));
        }
    }

    let mut out = vec![0u8; channel.len()];
    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            let value = channel[idx];
            out[idx] = bilinear_tile_lookup(&mappings, tiles_x, tiles_y, tile_w, tile_h, x, y, value);
        }
    }
    out
}

fn tile_mapping(channel: &[u8], width: u32, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    let mut count = 0u32;
    for y in y0..y1 {
        for x in x0..x1 {
            hist[channel[(y * width + x) as usize] as usize] += 1;
            count += 1;
        }
    }
    if count == 0 {
        let mut identity = [0u8; 256];
        for (i, v) in identity.iter_mut().enumerate() {
            *v = i as u8;
        }
        return identity;
    }

    let clip = ((clip_limit * count as f32 / 256.0).max(1.0)) as u32;
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let redistribute = excess / 256;
    for bin in hist.iter_mut() {
        *bin += redistribute;
    }

    let mut cdf = [0u32; 256];
    let mut running = 0u32;
    for (i, &h) in hist.iter().enumerate() {
        running += h;
        cdf[i] = running;
    }
    let total = cdf[255].max(1);
    let mut mapping = [0u8; 256];
    for (i, m) in mapping.iter_mut().enumerate() {
        *m = ((cdf[i] as f32 / total as f32) * 255.0).round() as u8;
    }
    mapping
}

#[allow(clippy::too_many_arguments)]
fn bilinear_tile_lookup(
    mappings: &[[u8; 256]],
    tiles_x: u32,
    tiles_y: u32,
    tile_w: u32,
    tile_h: u32,
    x: u32,
    y: u32,
    value: u8,
) -> u8 {
    let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
    let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
    let tx0 = fx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
    let ty0 = fy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
    let tx1 = (tx0 + 1).min(tiles_x - 1);
    let ty1 = (ty0 + 1).min(tiles_y - 1);
    let wx = (fx - tx0 as f32).clamp(0.0, 1.0);
    let wy = (fy - ty0 as f32).clamp(0.0, 1.0);

    let get = |tx: u32, ty: u32| mappings[(ty * tiles_x + tx) as usize][value as usize] as f32;

    let top = get(tx0, ty0) * (1.0 - wx) + get(tx1, ty0) * wx;
    let bottom = get(tx0, ty1) * (1.0 - wx) + get(tx1, ty1) * wx;
    (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8
}

fn rgb_to_lab(rgb: [u8; 3]) -> (f32, f32, f32) {
    let srgb_to_linear = |c: u8| {
        let c = c as f32 / 255.0;
        if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
    };
    let r = srgb_to_linear(rgb[0]);
    let g = srgb_to_linear(rgb[1]);
    let b = srgb_to_linear(rgb[2]);

    let x = r * 0.4124 + g * 0.3576 + b * 0.1805;
    let y = r * 0.2126 + g * 0.7152 + b * 0.0722;
    let z = r * 0.0193 + g * 0.1192 + b * 0.9505;

    let (xn, yn, zn) = (0.95047, 1.0, 1.08883);
    let f = |t: f32| if t > 0.008856 { t.cbrt() } else { 7.787 * t + 16.0 / 116.0 };
    let fx = f(x / xn);
    let fy = f(y / yn);
    let fz = f(z / zn);

    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);
    (l.clamp(0.0, 100.0), a, bb)
}

fn lab_to_rgb(l: f32, a: f32, b: f32) -> [u8; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let finv = |t: f32| if t.powi(3) > 0.008856 { t.powi(3) } else { (t - 16.0 / 116.0) / 7.787 };
    let (xn, yn, zn) = (0.95047, 1.0, 1.08883);
    let x = finv(fx) * xn;
    let y = finv(fy) * yn;
    let z = finv(fz) * zn;

    let r = x * 3.2406 + y * -1.5372 + z * -0.4986;
    let g = x * -0.9689 + y * 1.8758 + z * 0.0415;
    let bl = x * 0.0557 + y * -0.2040 + z * 1.0570;

    let linear_to_srgb = |c: f32| {
        let c = c.clamp(0.0, 1.0);
        let v = if c <= 0.0031308 { c * 12.92 } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 };
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    };
    [linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(bl)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn upscale_if_small_hits_target_height() {
        let small = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([10, 20, 30])));
        let scaled = upscale_if_small(small);
        assert_eq!(scaled.height(), TARGET_MIN_HEIGHT);
        assert_eq!(scaled.width(), 3000);
    }

    #[test]
    fn upscale_if_small_leaves_large_images_untouched() {
        let large = DynamicImage::ImageRgb8(RgbImage::from_pixel(2000, 2000, Rgb([10, 20, 30])));
        let scaled = upscale_if_small(large);
        assert_eq!(scaled.height(), 2000);
        assert_eq!(scaled.width(), 2000);
    }

    #[test]
    fn lab_round_trip_is_close_for_gray() {
        let (l, a, b) = rgb_to_lab([128, 128, 128]);
        let back = lab_to_rgb(l, a, b);
        for c in 0..3 {
            assert!((back[c] as i32 - 128).abs() <= 2, "channel {c} drifted: {back:?}");
        }
    }

    #[test]
    fn clahe_increases_local_contrast_on_flat_region() {
        let mut channel = vec![100u8; 64 * 64];
        channel[0] = 50;
        channel[1] = 150;
        let out = clahe(&channel, 64, 64, 8, 8, 2.0);
        assert_eq!(out.len(), channel.len());
    }

    #[test]
    fn run_on_image_fails_gracefully_never_panics_on_tiny_image() {
        let tiny = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let out = run_on_image(tiny);
        assert_eq!(out.height(), TARGET_MIN_HEIGHT);
    }

    #[test]
    fn run_returns_decode_error_for_garbage_bytes() {
        let err = run(b"not an image").unwrap_err();
        matches!(err, PipelineError::Decode(_));
    }
}
