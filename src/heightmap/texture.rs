//! Image views of height fields and colour maps

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};

use super::HeightField;
use crate::core::Result;

/// Greyscale image of a field: 0 is black, 1 and above is white.
pub fn height_map_image(field: &HeightField) -> GrayImage {
    GrayImage::from_fn(field.width() as u32, field.height() as u32, |x, y| {
        let v = field.get(x as usize, y as usize).clamp(0.0, 1.0);
        Luma([(v * 255.0).round() as u8])
    })
}

/// RGBA image from a row-major colour map.
pub fn colour_map_image(colours: &[[u8; 4]], width: usize, height: usize) -> RgbaImage {
    assert_eq!(colours.len(), width * height, "colour map size must match dimensions");
    RgbaImage::from_fn(width as u32, height as u32, |x, y| {
        Rgba(colours[x as usize + y as usize * width])
    })
}

/// Write an image as PNG.
pub fn save_png(image: impl Into<DynamicImage>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    image.into().save_with_format(path, ImageFormat::Png)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
