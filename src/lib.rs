//! Clickpoint — trains and serves a small convolutional regression model
//! that maps a cropped screenshot of an interactive region to the click
//! position that solves it.
//!
//! The pipeline: a [`data::store::CaptchaStore`] supplies screenshot paths
//! and solved positions; [`data::dataset::Dataset`] decodes, filters, and
//! normalizes them; [`model::train::train`] fits the network with the
//! two-regime distance loss; [`Predictor`] runs the inverse path back to
//! pixel coordinates.

pub mod config;
pub mod data;
pub mod errors;
pub mod model;
pub mod predict;

use burn::tensor::backend::AutodiffBackend;
use rand::Rng;

pub use config::{Region, SolverConfig};
pub use errors::{SolverError, SolverResult};
pub use model::net::{ClickNet, ClickNetConfig};
pub use model::train::{EpochReport, TrainingHistory};
pub use predict::Predictor;

use data::dataset::Dataset;
use data::store::CaptchaStore;

/// CPU inference backend.
pub type CpuBackend = burn::backend::NdArray<f32>;
/// Autodiff wrapper of [`CpuBackend`] used for training.
pub type TrainBackend = burn::backend::Autodiff<CpuBackend>;

/// Pull up to `count` solved captchas from `store`, assemble and split the
/// dataset, and train a fresh network.
pub fn fit_from_store<B: AutodiffBackend, S: CaptchaStore, R: Rng>(
    config: &SolverConfig,
    store: &S,
    count: usize,
    device: &B::Device,
    rng: &mut R,
) -> SolverResult<(ClickNet<B>, TrainingHistory)> {
    let (paths, positions) = store.get_solved_captchas(count)?;
    let dataset = Dataset::build(config, &paths, &positions)?;
    let (train_set, test_set) = dataset.split(config.test_fraction, config.batch_size, rng)?;
    model::train::train::<B, R>(config, &train_set, &test_set, device, rng)
}

/// Install a global `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::DirectoryStore;
    use crate::model::loss::DistanceLoss;
    use burn::module::AutodiffModule;
    use burn::prelude::*;
    use image::{DynamicImage, Rgba};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn documented_scenario_end_to_end() {
        let config = SolverConfig::default();
        let region = config.region;
        assert_eq!((region.width(), region.height()), (334, 333));

        // 500×536 raster with a single bright pixel at region-relative (100, 50)
        let mut img = image::RgbaImage::from_pixel(500, 536, Rgba([0, 0, 0, 255]));
        img.put_pixel(region.x0 + 100, region.y0 + 50, Rgba([255, 255, 255, 255]));
        let raster = DynamicImage::ImageRgba8(img);

        let tensor = data::preprocess::preprocess(&region, &raster);
        assert_eq!(tensor.dim(), (3, 333, 334));
        assert_eq!(tensor[[0, 50, 100]], 1.0);

        let (u, v) = data::coords::normalize(&region, 100.0, 50.0);
        assert!((u - 0.2994).abs() < 1e-4, "u = {u}");
        assert!((v - 0.8498).abs() < 1e-4, "v = {v}");

        let device = Default::default();
        let criterion = DistanceLoss::new();
        let target =
            Tensor::<CpuBackend, 2>::from_data(TensorData::new(vec![u, v], [1, 2]), &device);

        // same point: zero loss
        let same = criterion
            .forward(target.clone(), target.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap()[0];
        assert_eq!(same, 0.0);

        // opposite corner: squared distance far beyond the threshold
        let corner =
            Tensor::<CpuBackend, 2>::from_data(TensorData::new(vec![1.0f32, 1.0], [1, 2]), &device);
        let d = (u - 1.0).powi(2) + (v - 1.0).powi(2);
        assert!(d > 0.025);
        let miss = criterion
            .forward(target, corner)
            .into_data()
            .to_vec::<f32>()
            .unwrap()[0];
        assert!((miss - (5.0 * d + 1.0)).abs() < 1e-4, "miss = {miss}");
    }

    #[test]
    fn fit_save_and_predict_round_trip() {
        let dir = std::env::temp_dir().join(format!("clickpoint-fit-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut index = String::new();
        for i in 0..10u32 {
            let name = format!("c{i}.png");
            let mut img = image::RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
            img.put_pixel(2 + i, 2 + i, Rgba([255, 255, 255, 255]));
            DynamicImage::ImageRgba8(img).save(dir.join(&name)).unwrap();
            index.push_str(&format!(
                "[[captchas]]\nfile = \"{name}\"\nx = {}.0\ny = {}.0\n\n",
                i, i
            ));
        }
        std::fs::write(dir.join("index.toml"), index).unwrap();

        let config = SolverConfig {
            epochs: 1,
            batch_size: 4,
            expected_width: 20,
            expected_height: 20,
            region: Region::new(2, 2, 18, 18).unwrap(),
            ..SolverConfig::default()
        };
        let device = <CpuBackend as Backend>::Device::default();
        let mut rng = StdRng::seed_from_u64(5);
        let store = DirectoryStore::new(&dir);

        let (model, history) =
            fit_from_store::<TrainBackend, _, _>(&config, &store, 100, &device, &mut rng).unwrap();
        assert_eq!(history.epochs.len(), 1);
        assert!(history.epochs[0].train_loss.is_finite());

        let path = dir.join("model");
        model::persist::save_model(model.valid(), &config, &path).unwrap();

        let predictor = Predictor::<CpuBackend>::from_file(config, &path, device).unwrap();
        let (px, py) = predictor
            .predict(&DynamicImage::new_rgba8(20, 20))
            .unwrap();
        assert!((0.0..=16.0).contains(&px), "px = {px}");
        assert!((0.0..=16.0).contains(&py), "py = {py}");

        std::fs::remove_dir_all(&dir).ok();
    }
}
