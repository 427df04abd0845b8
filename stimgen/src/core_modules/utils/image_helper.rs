//! PNG export of stimulus images and masks.

use crate::core_modules::regions::{Image, Mask};
use image::{ExtendedColorType, ImageEncoder, ImageError};
use std::path::Path;

/// Maps intensities in `range` linearly onto 0..=255, clamping outliers.
pub fn to_gray_bytes(img: &Image, range: (f64, f64)) -> Vec<u8> {
    let (low, high) = range;
    let span = high - low;
    img.iter()
        .map(|&value| {
            let scaled = if span > 0.0 { (value - low) / span } else { 0.0 };
            (scaled.clamp(0.0, 1.0) * 255.0).round() as u8
        })
        .collect()
}

/// Spreads region ids over the gray range; background stays black.
pub fn mask_to_gray_bytes(mask: &Mask) -> Vec<u8> {
    let top = mask.iter().copied().max().unwrap_or(0);
    mask.iter()
        .map(|&id| {
            if top == 0 {
                0
            } else {
                ((id as f64 / top as f64) * 255.0).round() as u8
            }
        })
        .collect()
}

fn save_gray(path: &Path, width: usize, height: usize, buffer: &[u8]) -> Result<(), ImageError> {
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(output);
    encoder.write_image(buffer, width as u32, height as u32, ExtendedColorType::L8)?;
    Ok(())
}

/// Writes `img` as an 8-bit grayscale PNG; `range` maps to black..white.
pub fn save_image(path: impl AsRef<Path>, img: &Image, range: (f64, f64)) -> Result<(), ImageError> {
    let (height, width) = img.dim();
    let path = path.as_ref();
    save_gray(path, width, height, &to_gray_bytes(img, range))?;
    tracing::debug!(path = %path.display(), height, width, "image saved");
    Ok(())
}

pub fn save_mask(path: impl AsRef<Path>, mask: &Mask) -> Result<(), ImageError> {
    let (height, width) = mask.dim();
    save_gray(path.as_ref(), width, height, &mask_to_gray_bytes(mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("stimgen_{}_{name}", std::process::id()))
    }

    #[test]
    fn intensities_map_onto_the_byte_range() {
        let img = array![[0.0, 0.5, 1.0], [-1.0, 2.0, 0.25]];
        assert_eq!(to_gray_bytes(&img, (0.0, 1.0)), vec![0, 128, 255, 0, 255, 64]);
    }

    #[test]
    fn masks_spread_over_gray_levels() {
        let mask = array![[0, 1], [2, 4]];
        assert_eq!(mask_to_gray_bytes(&mask), vec![0, 64, 128, 255]);
        assert_eq!(mask_to_gray_bytes(&Array2::zeros((1, 2))), vec![0, 0]);
    }

    #[test]
    fn save_gradient_file() {
        let img = Array2::from_shape_fn((20, 50), |(_, j)| j as f64 / 49.0);
        let path = scratch("gradient.png");
        save_image(&path, &img, (0.0, 1.0)).expect("Error Saving File.");

        let loaded = image::open(&path).expect("Error Loading File.").to_luma8();
        assert_eq!(loaded.dimensions(), (50, 20));
        assert_eq!(loaded.get_pixel(0, 0).0, [0]);
        assert_eq!(loaded.get_pixel(49, 19).0, [255]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn save_mask_file() {
        let mask = Array2::from_shape_fn((8, 8), |(i, _)| (i / 2) as u32);
        let path = scratch("mask.png");
        save_mask(&path, &mask).expect("Error Saving File.");
        assert!(path.exists());
        let _ = std::fs::remove_file(path);
    }
}
