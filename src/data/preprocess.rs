/// Raster → tensor preprocessing.
///
/// Raw screenshots are cropped to the interactive region, scaled to
/// `[0, 1]`, and reordered HWC → CHW with the alpha channel dropped. The
/// inverse direction exists for visual debugging only and deliberately
/// restores neither the crop nor the alpha channel.
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array3;

use crate::config::{Region, SolverConfig};

/// True iff the raster has exactly the expected raw dimensions.
///
/// Off-size rasters are dropped during dataset assembly (logged, not
/// fatal); they are never resized.
pub fn accept(config: &SolverConfig, raster: &DynamicImage) -> bool {
    raster.width() == config.expected_width && raster.height() == config.expected_height
}

/// Crop to the region, normalize to `[0, 1]`, reorder to CHW, keep the
/// first three channels (RGB; alpha dropped).
pub fn preprocess(region: &Region, raster: &DynamicImage) -> Array3<f32> {
    let cropped = raster
        .crop_imm(region.x0, region.y0, region.width(), region.height())
        .to_rgba8();
    let (w, h) = (region.width() as usize, region.height() as usize);

    let mut tensor = Array3::<f32>::zeros((3, h, w));
    for y in 0..h {
        for x in 0..w {
            let p = cropped.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[c, y, x]] = p[c] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Preprocess a batch. A single image is the batch-of-one case:
/// `preprocess_batch(region, std::slice::from_ref(&img))`.
pub fn preprocess_batch(region: &Region, rasters: &[DynamicImage]) -> Vec<Array3<f32>> {
    rasters.iter().map(|r| preprocess(region, r)).collect()
}

/// Inverse of the intensity/layout steps: CHW → HWC, ×255, cast to u8.
///
/// Lossy: the alpha channel and the crop are gone for good. Use for
/// eyeballing what the network sees, never for round-trip guarantees.
pub fn postprocess_batch(tensors: &[Array3<f32>]) -> Vec<RgbImage> {
    tensors
        .iter()
        .map(|t| {
            let (_, h, w) = t.dim();
            RgbImage::from_fn(w as u32, h as u32, |x, y| {
                let at = |c: usize| (t[[c, y as usize, x as usize]] * 255.0) as u8;
                Rgb([at(0), at(1), at(2)])
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn test_config() -> SolverConfig {
        SolverConfig {
            expected_width: 500,
            expected_height: 536,
            ..SolverConfig::default()
        }
    }

    /// 500×536 canvas with one bright pixel at a region-relative position.
    fn raster_with_bright_pixel(region: &Region, rx: u32, ry: u32) -> DynamicImage {
        let mut img = image::RgbaImage::from_pixel(500, 536, Rgba([0, 0, 0, 255]));
        img.put_pixel(region.x0 + rx, region.y0 + ry, Rgba([255, 255, 255, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn accept_gates_on_exact_raw_dimensions() {
        let config = test_config();
        let ok = DynamicImage::new_rgba8(500, 536);
        let wrong = DynamicImage::new_rgba8(500, 535);
        assert!(accept(&config, &ok));
        assert!(!accept(&config, &wrong));
    }

    #[test]
    fn preprocess_crops_scales_and_reorders() {
        let config = test_config();
        let region = config.region;
        let raster = raster_with_bright_pixel(&region, 100, 50);

        let tensor = preprocess(&region, &raster);
        assert_eq!(tensor.dim(), (3, 333, 334));

        // the bright pixel lands at (channel, y, x) = (c, 50, 100) at 1.0
        for c in 0..3 {
            assert_eq!(tensor[[c, 50, 100]], 1.0);
            assert_eq!(tensor[[c, 50, 101]], 0.0);
        }
    }

    #[test]
    fn single_image_wraps_as_batch_of_one() {
        let config = test_config();
        let raster = DynamicImage::new_rgba8(500, 536);
        let batch = preprocess_batch(&config.region, std::slice::from_ref(&raster));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].dim(), (3, 333, 334));
    }

    #[test]
    fn postprocess_inverts_intensity_and_layout() {
        let config = test_config();
        let region = config.region;
        let raster = raster_with_bright_pixel(&region, 10, 20);

        let tensors = preprocess_batch(&region, std::slice::from_ref(&raster));
        let rasters = postprocess_batch(&tensors);
        assert_eq!(rasters.len(), 1);
        assert_eq!(rasters[0].dimensions(), (334, 333));
        assert_eq!(rasters[0].get_pixel(10, 20), &Rgb([255, 255, 255]));
        assert_eq!(rasters[0].get_pixel(11, 20), &Rgb([0, 0, 0]));
    }
}
