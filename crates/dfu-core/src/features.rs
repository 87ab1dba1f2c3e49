//! Feature preparation. Must stay bit-compatible with what the model saw
//! during training.
//!
//! Each image → flat vector of 64 × 64 = 4096 values in [0, 1]:
//! - Decode and convert to 8-bit grayscale with OpenCV's fixed-point
//!   BT.601 weights
//! - Resize to 64 × 64 with OpenCV's default bilinear kernel
//!   (half-pixel centres, 11-bit fixed-point weights)
//! - Divide by 255, row-major
//!
//! The auxiliary vector is 4096 copies of the bundle mean pushed through the
//! persisted scaler.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::metadata::Orientation;
use image::{DynamicImage, GrayImage, ImageDecoder, ImageReader, Luma};

use crate::bundle::PreprocessingBundle;
use crate::error::PipelineError;

pub const IMAGE_WIDTH: u32 = 64;
pub const IMAGE_HEIGHT: u32 = 64;
/// Length of both model inputs.
pub const FEATURE_LEN: usize = (IMAGE_WIDTH * IMAGE_HEIGHT) as usize;

const COEF_BITS: u32 = 11;
const COEF_SCALE: f32 = (1 << COEF_BITS) as f32;

/// Read an image file and decode it as grayscale.
pub fn open_grayscale(path: &Path) -> Result<GrayImage, PipelineError> {
    let bytes = fs::read(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "image read failed");
        PipelineError::InvalidImage
    })?;
    decode_grayscale(&bytes)
}

/// Decode in-memory image bytes (e.g. an upload) as grayscale.
pub fn decode_grayscale(bytes: &[u8]) -> Result<GrayImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::InvalidImage);
    }
    let decoded = decode_oriented(bytes).map_err(|e| {
        tracing::debug!(error = %e, "image decode failed");
        PipelineError::InvalidImage
    })?;

    let gray = to_grayscale(&decoded);
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PipelineError::InvalidImage);
    }
    Ok(gray)
}

/// Decode and apply the EXIF orientation tag, so camera JPEGs come out
/// upright.
fn decode_oriented(bytes: &[u8]) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn to_grayscale(img: &DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => img.to_luma8(),
        _ => {
            let rgb = img.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Luma([bt601_luma(r, g, b)])
            })
        }
    }
}

/// `(4899 R + 9617 G + 1868 B + 2^13) >> 14`
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 4899 * u32::from(r) + 9617 * u32::from(g) + 1868 * u32::from(b);
    ((y + (1 << 13)) >> 14) as u8
}

/// Source index and fixed-point weights for one destination coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tap {
    index: usize,
    next: usize,
    w0: i32,
    w1: i32,
}

fn linear_taps(src_len: u32, dst_len: u32) -> Vec<Tap> {
    let scale = 1.0 / (f64::from(dst_len) / f64::from(src_len));
    let last = src_len as i64 - 1;

    (0..dst_len)
        .map(|d| {
            let pos = ((f64::from(d) + 0.5) * scale - 0.5) as f32;
            let mut index = pos.floor() as i64;
            let mut frac = pos - index as f32;
            if index < 0 {
                index = 0;
                frac = 0.0;
            }
            if index >= last {
                index = last;
                frac = 0.0;
            }
            let index = index as usize;
            Tap {
                index,
                next: (index + 1).min(last as usize),
                w0: ((1.0 - frac) * COEF_SCALE).round_ties_even() as i32,
                w1: (frac * COEF_SCALE).round_ties_even() as i32,
            }
        })
        .collect()
}

/// Resize an 8-bit grayscale image the way OpenCV's `INTER_LINEAR` does.
///
/// Exact 2× reductions take OpenCV's area-averaging shortcut.
pub fn resize_bilinear(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (sw, sh) = src.dimensions();
    if (sw, sh) == (width, height) {
        return src.clone();
    }
    if sw == width * 2 && sh == height * 2 {
        return halve_area(src, width, height);
    }

    let xs = linear_taps(sw, width);
    let ys = linear_taps(sh, height);
    let stride = sw as usize;
    let data = src.as_raw();

    // horizontal pass, one buffered row per source row
    let horizontal = |row: usize| -> Vec<i32> {
        let line = &data[row * stride..(row + 1) * stride];
        xs.iter()
            .map(|t| i32::from(line[t.index]) * t.w0 + i32::from(line[t.next]) * t.w1)
            .collect()
    };

    let mut out = GrayImage::new(width, height);
    for (dy, ty) in ys.iter().enumerate() {
        let r0 = horizontal(ty.index);
        let r1 = horizontal(ty.next);
        for dx in 0..width as usize {
            // vectorized vertical pass: 16-bit high multiply, then round by 2 bits
            let a = ((r0[dx] >> 4) * ty.w0) >> 16;
            let b = ((r1[dx] >> 4) * ty.w1) >> 16;
            let v = ((a + b + 2) >> 2).clamp(0, 255) as u8;
            out.put_pixel(dx as u32, dy as u32, Luma([v]));
        }
    }
    out
}

fn halve_area(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let (sx, sy) = (x * 2, y * 2);
        let sum: u32 = [(sx, sy), (sx + 1, sy), (sx, sy + 1), (sx + 1, sy + 1)]
            .iter()
            .map(|&(px, py)| u32::from(src.get_pixel(px, py).0[0]))
            .sum();
        Luma([((sum + 2) >> 2) as u8])
    })
}

/// Image Feature Vector for an already-decoded grayscale image.
pub fn image_features(gray: &GrayImage) -> Vec<f32> {
    let resized = resize_bilinear(gray, IMAGE_WIDTH, IMAGE_HEIGHT);
    resized
        .as_raw()
        .iter()
        .map(|&p| (f64::from(p) / 255.0) as f32)
        .collect()
}

/// Auxiliary Feature Vector: the bundle mean in every slot, standardized
/// with the persisted scaler. Never refits.
pub fn auxiliary_features(bundle: &PreprocessingBundle) -> Vec<f32> {
    let value = bundle.scaler.transform(bundle.mean) as f32;
    vec![value; FEATURE_LEN]
}
