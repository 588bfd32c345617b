/// Inference: raw raster in, click position out.
///
/// The same preprocessing code that fed training runs here, so the network
/// sees exactly the tensors it was trained on, and its output is mapped
/// back through the inverse coordinate transform.
use std::path::Path;

use burn::prelude::*;
use image::DynamicImage;

use crate::config::SolverConfig;
use crate::data::{coords, dataset, preprocess};
use crate::errors::{SolverError, SolverResult};
use crate::model::net::ClickNet;
use crate::model::persist;

/// A trained network plus the configuration it was trained under.
///
/// Parameters are immutable once constructed; every method takes `&self`,
/// so independent callers can run inference against one shared predictor
/// (each call owns its own input/output buffers).
pub struct Predictor<B: Backend> {
    model: ClickNet<B>,
    config: SolverConfig,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Wrap an already-trained model. For a model fresh out of training on
    /// an autodiff backend, pass `model.valid()`.
    pub fn new(model: ClickNet<B>, config: SolverConfig, device: B::Device) -> SolverResult<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            device,
        })
    }

    /// Load a persisted model, with its format-version and region checks.
    pub fn from_file(config: SolverConfig, path: &Path, device: B::Device) -> SolverResult<Self> {
        let model = persist::load_model::<B>(&config, path, &device)?;
        Self::new(model, config, device)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Predict the click position for a single raster.
    ///
    /// Coordinates are **region-relative** pixels; add the region origin
    /// `(region.x0, region.y0)` when an absolute screen position is needed.
    pub fn predict(&self, raster: &DynamicImage) -> SolverResult<(f32, f32)> {
        let mut predictions = self.predict_batch(std::slice::from_ref(raster))?;
        predictions
            .pop()
            .ok_or_else(|| SolverError::Dataset("no prediction for a batch of one".into()))
    }

    /// Predict click positions for a batch of rasters, in input order.
    /// Same coordinate convention as [`Self::predict`].
    pub fn predict_batch(&self, rasters: &[DynamicImage]) -> SolverResult<Vec<(f32, f32)>> {
        if rasters.is_empty() {
            return Ok(Vec::new());
        }

        let arrays = preprocess::preprocess_batch(&self.config.region, rasters);
        let images = dataset::stack_images::<B>(&arrays, &self.device)?;
        let output = self.model.forward(images);

        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| SolverError::Dataset(format!("could not read predictions: {e:?}")))?;
        let normalized: Vec<[f32; 2]> = values.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
        Ok(coords::denormalize_batch(&self.config.region, &normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use crate::model::net::ClickNetConfig;

    type B = burn::backend::NdArray<f32>;

    fn tiny_config() -> SolverConfig {
        SolverConfig {
            expected_width: 20,
            expected_height: 20,
            region: Region::new(2, 2, 18, 18).unwrap(),
            ..SolverConfig::default()
        }
    }

    fn predictor() -> Predictor<B> {
        let config = tiny_config();
        let device = <B as Backend>::Device::default();
        let model = ClickNetConfig::for_region(&config.region).init::<B>(&device);
        Predictor::new(model, config, device).unwrap()
    }

    #[test]
    fn predictions_land_inside_the_region() {
        let predictor = predictor();
        let raster = DynamicImage::new_rgba8(20, 20);
        let (px, py) = predictor.predict(&raster).unwrap();
        assert!((0.0..=16.0).contains(&px), "px {px} outside region");
        assert!((0.0..=16.0).contains(&py), "py {py} outside region");
    }

    #[test]
    fn batch_predictions_match_single_predictions() {
        let predictor = predictor();
        let a = DynamicImage::new_rgba8(20, 20);
        let mut bright = image::RgbaImage::from_pixel(20, 20, image::Rgba([0, 0, 0, 255]));
        bright.put_pixel(10, 10, image::Rgba([255, 255, 255, 255]));
        let b = DynamicImage::ImageRgba8(bright);

        let batched = predictor.predict_batch(&[a.clone(), b.clone()]).unwrap();
        let single_a = predictor.predict(&a).unwrap();
        let single_b = predictor.predict(&b).unwrap();

        assert_eq!(batched.len(), 2);
        assert!((batched[0].0 - single_a.0).abs() < 1e-5);
        assert!((batched[0].1 - single_a.1).abs() < 1e-5);
        assert!((batched[1].0 - single_b.0).abs() < 1e-5);
        assert!((batched[1].1 - single_b.1).abs() < 1e-5);
    }

    #[test]
    fn empty_batch_is_empty_output() {
        let predictor = predictor();
        assert!(predictor.predict_batch(&[]).unwrap().is_empty());
    }
}
