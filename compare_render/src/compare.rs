use crate::{CompareError, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use image_compare::Algorithm;

/// Result of comparing a rendered image against a reference
#[derive(Debug, Clone)]
pub struct CompareResult {
    /// Pixels where some channel differs by more than the tolerance
    pub differing_pixels: u64,
    /// Largest channel difference seen anywhere
    pub max_difference: u8,
    /// SSIM score from 0.0 to 1.0, when the images are large enough to score
    pub similarity: Option<f64>,
}

impl CompareResult {
    pub fn passed(&self) -> bool {
        self.differing_pixels == 0
    }
}

/// Compare two images pixel by pixel.
///
/// A pixel differs when any of its four channels differs by more than
/// `tolerance`.
pub fn compare_images(
    reference: &RgbaImage,
    rendered: &RgbaImage,
    tolerance: u8,
) -> Result<CompareResult> {
    if reference.dimensions() != rendered.dimensions() {
        return Err(CompareError::SizeMismatch {
            reference: reference.dimensions(),
            rendered: rendered.dimensions(),
        });
    }

    let mut differing_pixels = 0;
    let mut max_difference = 0;
    for (a, b) in reference.pixels().zip(rendered.pixels()) {
        let diff = pixel_difference(a, b);
        max_difference = max_difference.max(diff);
        if diff > tolerance {
            differing_pixels += 1;
        }
    }

    Ok(CompareResult {
        differing_pixels,
        max_difference,
        similarity: similarity(reference, rendered),
    })
}

/// SSIM over the RGB channels. Images smaller than the SSIM window have no
/// score.
fn similarity(reference: &RgbaImage, rendered: &RgbaImage) -> Option<f64> {
    let ref_rgb = DynamicImage::ImageRgba8(reference.clone()).to_rgb8();
    let out_rgb = DynamicImage::ImageRgba8(rendered.clone()).to_rgb8();
    match image_compare::rgb_similarity_structure(&Algorithm::MSSIMSimple, &ref_rgb, &out_rgb) {
        Ok(result) => Some(result.score),
        Err(e) => {
            log::debug!("SSIM comparison failed: {}", e);
            None
        }
    }
}

/// Generate a diff image highlighting differences between two images of the
/// same size
pub fn generate_diff_image(reference: &RgbaImage, rendered: &RgbaImage, tolerance: u8) -> RgbaImage {
    let (width, height) = rendered.dimensions();
    let mut diff_img = RgbaImage::new(width, height);

    for (x, y, out_pixel) in rendered.enumerate_pixels() {
        let diff = match reference.get_pixel_checked(x, y) {
            Some(ref_pixel) => pixel_difference(ref_pixel, out_pixel),
            None => u8::MAX,
        };

        if diff > tolerance {
            // Highlight differences in red
            let intensity = (diff as f32 / 255.0 * 200.0 + 55.0) as u8;
            diff_img.put_pixel(x, y, Rgba([intensity, 0, 0, 255]));
        } else {
            // Show the rendered pixel dimmed
            let r = (out_pixel[0] as u16 / 3) as u8;
            let g = (out_pixel[1] as u16 / 3) as u8;
            let b = (out_pixel[2] as u16 / 3) as u8;
            diff_img.put_pixel(x, y, Rgba([r, g, b, 255]));
        }
    }

    diff_img
}

/// Calculate the maximum channel difference between two pixels
fn pixel_difference(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, pixel: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(pixel))
    }

    #[test]
    fn test_identical_images_pass() {
        let img = solid(32, 32, [255, 0, 0, 255]);
        let result = compare_images(&img, &img, 0).unwrap();
        assert!(result.passed());
        assert_eq!(result.max_difference, 0);
    }

    #[test]
    fn test_tolerance() {
        let reference = solid(4, 4, [100, 100, 100, 255]);
        let mut rendered = reference.clone();
        rendered.put_pixel(1, 2, Rgba([103, 100, 100, 255]));

        let strict = compare_images(&reference, &rendered, 0).unwrap();
        assert_eq!(strict.differing_pixels, 1);
        assert_eq!(strict.max_difference, 3);

        assert!(compare_images(&reference, &rendered, 3).unwrap().passed());
    }

    #[test]
    fn test_alpha_counts() {
        let reference = solid(2, 2, [0, 0, 0, 255]);
        let rendered = solid(2, 2, [0, 0, 0, 0]);
        assert_eq!(
            compare_images(&reference, &rendered, 0).unwrap().differing_pixels,
            4
        );
    }

    #[test]
    fn test_size_mismatch() {
        let result = compare_images(&solid(2, 2, [0; 4]), &solid(3, 2, [0; 4]), 0);
        assert!(matches!(result, Err(CompareError::SizeMismatch { .. })));
    }

    #[test]
    fn test_diff_image_marks_differences() {
        let reference = solid(3, 3, [0, 0, 255, 255]);
        let mut rendered = reference.clone();
        rendered.put_pixel(1, 1, Rgba([255, 0, 255, 255]));

        let diff = generate_diff_image(&reference, &rendered, 0);
        assert_eq!(diff.get_pixel(1, 1)[0], 255);
        assert_eq!(diff.get_pixel(0, 0), &Rgba([0, 0, 85, 255]));
    }
}
