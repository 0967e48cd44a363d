//! LCD image codec
//!
//! Button displays take 16-bit little-endian pixels, 5 bits red, 6 bits green,
//! 5 bits blue (`r << 11 | g << 5 | b`), row-major from the top-left corner.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use soomfon_transport::protocol::layout;

use crate::error::PanelError;

/// Bytes per packed pixel
pub const BYTES_PER_PIXEL: usize = 2;

const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// How a source image is mapped onto the target size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    /// Scale to cover the target and crop the overflow (centered)
    #[default]
    Cover,
    /// Scale to fit inside the target and fill the rest with the background
    Contain,
    /// Scale each axis independently
    Stretch,
}

/// Clockwise rotation applied before fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

/// Source image processing options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub fit: Fit,
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Fill for letterbox areas and transparent pixels
    pub background: [u8; 3],
    pub width: u32,
    pub height: u32,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            fit: Fit::Cover,
            rotation: Rotation::None,
            flip_horizontal: false,
            flip_vertical: false,
            background: [0, 0, 0],
            width: u32::from(layout::LCD_WIDTH),
            height: u32::from(layout::LCD_HEIGHT),
        }
    }
}

/// Pack one RGB888 color into 5-6-5
#[inline]
pub fn rgb_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = u16::from(r >> 3);
    let g6 = u16::from(g >> 2);
    let b5 = u16::from(b >> 3);
    (r5 << 11) | (g6 << 5) | b5
}

/// Byte count of a packed image
pub fn packed_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Convert tightly packed RGB888 pixels to little-endian 5-6-5
pub fn convert(pixels_rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PanelError> {
    let expected = width as usize * height as usize * 3;
    if pixels_rgb.len() != expected {
        return Err(PanelError::InvalidArgument(format!(
            "{}x{} RGB image needs {} bytes, got {}",
            width,
            height,
            expected,
            pixels_rgb.len()
        )));
    }

    let mut out = Vec::with_capacity(packed_len(width, height));
    for px in pixels_rgb.chunks_exact(3) {
        out.extend_from_slice(&rgb_to_rgb565(px[0], px[1], px[2]).to_le_bytes());
    }
    Ok(out)
}

/// Every pixel set to one color
pub fn solid_color(color: Rgb<u8>, width: u32, height: u32) -> Vec<u8> {
    let [r, g, b] = color.0;
    rgb_to_rgb565(r, g, b)
        .to_le_bytes()
        .repeat(width as usize * height as usize)
}

/// Diagnostic pattern: red follows x, green follows y, blue follows x + y
pub fn gradient(width: u32, height: u32) -> Vec<u8> {
    let max_x = width.saturating_sub(1).max(1);
    let max_y = height.saturating_sub(1).max(1);
    let max_xy = (width + height).saturating_sub(2).max(1);

    let mut out = Vec::with_capacity(packed_len(width, height));
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / max_x) as u8;
            let g = (y * 255 / max_y) as u8;
            let b = ((x + y) * 255 / max_xy) as u8;
            out.extend_from_slice(&rgb_to_rgb565(r, g, b).to_le_bytes());
        }
    }
    out
}

/// Decode, orient, fit and pack an encoded image (PNG or JPEG)
pub fn process_source_image(
    source: &[u8],
    options: &ImageOptions,
) -> Result<Vec<u8>, PanelError> {
    let (width, height) = (options.width, options.height);
    if width == 0 || height == 0 {
        return Err(PanelError::InvalidArgument(format!(
            "target size {}x{} is empty",
            width, height
        )));
    }

    let img = image::load_from_memory(source).map_err(|e| PanelError::DecodeError(e.to_string()))?;
    let img = orient(img, options);

    let fitted = match options.fit {
        Fit::Cover => img.resize_to_fill(width, height, RESIZE_FILTER),
        Fit::Contain => img.resize(width, height, RESIZE_FILTER),
        Fit::Stretch => img.resize_exact(width, height, RESIZE_FILTER),
    };

    // Flatten onto the background: fills letterbox bars and drops alpha
    let [r, g, b] = options.background;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 0xFF]));
    let (fw, fh) = fitted.dimensions();
    let x = i64::from(width.saturating_sub(fw) / 2);
    let y = i64::from(height.saturating_sub(fh) / 2);
    imageops::overlay(&mut canvas, &fitted.to_rgba8(), x, y);

    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    convert(rgb.as_raw(), width, height)
}

/// Read and process an image file
pub fn process_image_file(
    path: impl AsRef<Path>,
    options: &ImageOptions,
) -> Result<Vec<u8>, PanelError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| PanelError::DecodeError(format!("read {}: {e}", path.display())))?;
    process_source_image(&bytes, options)
}

fn orient(img: DynamicImage, options: &ImageOptions) -> DynamicImage {
    let img = match options.rotation {
        Rotation::None => img,
        Rotation::Cw90 => img.rotate90(),
        Rotation::Cw180 => img.rotate180(),
        Rotation::Cw270 => img.rotate270(),
    };
    let img = if options.flip_horizontal { img.fliph() } else { img };
    if options.flip_vertical {
        img.flipv()
    } else {
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn encode_png(img: RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Left half `left`, right half `right`
    fn split_png(width: u32, height: u32, left: [u8; 3], right: [u8; 3]) -> Vec<u8> {
        encode_png(RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb(left)
            } else {
                Rgb(right)
            }
        }))
    }

    fn pixel(packed: &[u8], width: u32, x: u32, y: u32) -> (u16, u16, u16) {
        let i = ((y * width + x) as usize) * BYTES_PER_PIXEL;
        let px = u16::from_le_bytes([packed[i], packed[i + 1]]);
        (px >> 11, (px >> 5) & 0x3F, px & 0x1F)
    }

    #[test]
    fn test_reference_values() {
        assert_eq!(rgb_to_rgb565(0, 0, 0), 0x0000);
        assert_eq!(rgb_to_rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb_to_rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb_to_rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb_to_rgb565(0, 0, 255), 0x001F);
    }

    #[test]
    fn test_convert_is_little_endian() {
        let out = convert(&[255, 0, 0, 0, 0, 255], 2, 1).unwrap();
        assert_eq!(out, vec![0x00, 0xF8, 0x1F, 0x00]);
    }

    #[test]
    fn test_convert_rejects_wrong_length() {
        assert!(matches!(
            convert(&[0u8; 10], 2, 2),
            Err(PanelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_solid_color() {
        let data = solid_color(Rgb([255, 0, 0]), 72, 72);
        assert_eq!(data.len(), layout::LCD_IMAGE_SIZE);
        assert!(data.chunks_exact(2).all(|px| px == [0x00, 0xF8]));
    }

    #[test]
    fn test_gradient_is_deterministic_and_monotonic() {
        let (w, h) = (32, 64);
        let a = gradient(w, h);
        assert_eq!(a, gradient(w, h));
        assert_eq!(a.len(), packed_len(w, h));

        for x in 1..w {
            assert!(pixel(&a, w, x, 0).0 > pixel(&a, w, x - 1, 0).0);
        }
        for y in 1..h {
            assert!(pixel(&a, w, 0, y).1 > pixel(&a, w, 0, y - 1).1);
        }
        assert_eq!(pixel(&a, w, 0, 0), (0, 0, 0));
        assert_eq!(pixel(&a, w, w - 1, h - 1), (31, 63, 31));
    }

    #[test]
    fn test_gradient_handles_single_pixel() {
        assert_eq!(gradient(1, 1), vec![0, 0]);
    }

    #[test]
    fn test_process_rejects_garbage() {
        let result = process_source_image(b"definitely not a png", &ImageOptions::default());
        assert!(matches!(result, Err(PanelError::DecodeError(_))));
    }

    #[test]
    fn test_cover_crops_to_center() {
        let png = split_png(144, 72, [255, 0, 0], [0, 0, 255]);
        let out = process_source_image(&png, &ImageOptions::default()).unwrap();
        assert_eq!(out.len(), layout::LCD_IMAGE_SIZE);

        // Center 72 columns: left half red, right half blue
        let (r, _, b) = pixel(&out, 72, 8, 36);
        assert!(r >= 30 && b <= 1);
        let (r, _, b) = pixel(&out, 72, 64, 36);
        assert!(r <= 1 && b >= 30);
    }

    #[test]
    fn test_contain_letterboxes_with_background() {
        let png = encode_png(RgbImage::from_pixel(144, 72, Rgb([255, 255, 255])));
        let options = ImageOptions {
            fit: Fit::Contain,
            background: [0, 0, 0],
            ..ImageOptions::default()
        };
        let out = process_source_image(&png, &options).unwrap();

        // Scaled to 72x36 and centered vertically
        assert_eq!(pixel(&out, 72, 36, 4), (0, 0, 0));
        assert_eq!(pixel(&out, 72, 36, 68), (0, 0, 0));
        let (r, g, b) = pixel(&out, 72, 36, 36);
        assert!(r >= 30 && g >= 60 && b >= 30);
    }

    #[test]
    fn test_flip_and_rotate() {
        let png = split_png(144, 72, [255, 0, 0], [0, 0, 255]);

        let flipped = ImageOptions {
            fit: Fit::Stretch,
            flip_horizontal: true,
            ..ImageOptions::default()
        };
        let out = process_source_image(&png, &flipped).unwrap();
        let (r, _, b) = pixel(&out, 72, 4, 36);
        assert!(r <= 1 && b >= 30);

        let rotated = ImageOptions {
            fit: Fit::Stretch,
            rotation: Rotation::Cw180,
            ..ImageOptions::default()
        };
        let out = process_source_image(&png, &rotated).unwrap();
        let (r, _, b) = pixel(&out, 72, 4, 36);
        assert!(r <= 1 && b >= 30);
    }

    #[test]
    fn test_custom_target_size() {
        let png = split_png(10, 10, [0, 255, 0], [0, 255, 0]);
        let options = ImageOptions {
            width: 16,
            height: 8,
            ..ImageOptions::default()
        };
        let out = process_source_image(&png, &options).unwrap();
        assert_eq!(out.len(), packed_len(16, 8));
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::Cw270));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::Cw90.degrees(), 90);
    }
}
