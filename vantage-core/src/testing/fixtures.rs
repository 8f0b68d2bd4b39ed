//! Small encoded images for exercising the decoders.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, format)
        .expect("in-memory encode cannot fail");
    out.into_inner()
}

/// Solid PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([40, 90, 200, 255]));
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

/// Solid baseline JPEG of the given size.
pub fn jpeg(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([shade, shade, 128]));
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

/// Two JPEG streams back to back, the layout of a stereo MPO file.
pub fn stereo_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = jpeg(width, height, 30);
    bytes.extend_from_slice(&jpeg(width, height, 220));
    bytes
}

/// Deterministic pseudo-video payload of `len` bytes.
pub fn video_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
