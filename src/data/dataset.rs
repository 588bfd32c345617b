/// Dataset assembly and batching.
///
/// `build` pairs decoded screenshots with their normalized targets, dropping
/// (never aborting on) per-item failures; `split` partitions into a training
/// set whose size is an exact multiple of the batch size and a test set that
/// absorbs the overhang.
use std::path::PathBuf;

use burn::prelude::*;
use ndarray::Array3;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SolverConfig;
use crate::data::{coords, preprocess};
use crate::errors::{SolverError, SolverResult};

/// A preprocessed image tensor paired with its normalized click target.
#[derive(Debug, Clone)]
pub struct NormalizedSample {
    /// `(3, H, W)` float tensor in `[0, 1]`.
    pub tensor: Array3<f32>,
    /// `[u, v]` in `[0, 1]²`, vertical axis flipped.
    pub target: [f32; 2],
}

/// Ordered collection of [`NormalizedSample`]s.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<NormalizedSample>,
}

/// One training/evaluation batch on backend `B`.
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    /// `(batch, 3, H, W)`.
    pub images: Tensor<B, 4>,
    /// `(batch, 2)`.
    pub targets: Tensor<B, 2>,
}

impl Dataset {
    /// Decode, filter, and normalize an index-aligned list of screenshot
    /// paths and region-relative click positions.
    ///
    /// A paths/positions length mismatch is a fatal precondition violation.
    /// Per-item decode failures and off-size rasters are dropped with a
    /// warning; the surviving samples stay index-aligned with each other.
    pub fn build(
        config: &SolverConfig,
        paths: &[PathBuf],
        positions: &[(f32, f32)],
    ) -> SolverResult<Self> {
        if paths.len() != positions.len() {
            return Err(SolverError::Dataset(format!(
                "{} paths but {} positions; inputs must be index-aligned",
                paths.len(),
                positions.len()
            )));
        }
        config.validate()?;

        let mut samples = Vec::with_capacity(paths.len());
        for (path, &(px, py)) in paths.iter().zip(positions) {
            let raster = match image::open(path) {
                Ok(img) => img,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not decode image — dropped");
                    continue;
                }
            };
            if !preprocess::accept(config, &raster) {
                tracing::warn!(
                    path = %path.display(),
                    width = raster.width(),
                    height = raster.height(),
                    "unexpected raw dimensions — dropped"
                );
                continue;
            }
            let tensor = preprocess::preprocess(&config.region, &raster);
            let (u, v) = coords::normalize(&config.region, px, py);
            samples.push(NormalizedSample {
                tensor,
                target: [u, v],
            });
        }

        tracing::info!(offered = paths.len(), usable = samples.len(), "dataset assembled");
        Ok(Self { samples })
    }

    pub fn from_samples(samples: Vec<NormalizedSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[NormalizedSample] {
        &self.samples
    }

    /// Shuffle and partition into `(train, test)`.
    ///
    /// `test` gets `floor(N * test_fraction)` samples plus whatever overhang
    /// keeps `train.len()` an exact multiple of `batch_size`, so training
    /// never sees a partial batch and no sample is lost.
    pub fn split(
        self,
        test_fraction: f32,
        batch_size: usize,
        rng: &mut impl Rng,
    ) -> SolverResult<(Dataset, Dataset)> {
        if batch_size == 0 {
            return Err(SolverError::Config("batch_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(SolverError::Config(format!(
                "test_fraction {test_fraction} must lie in [0, 1)"
            )));
        }

        let n = self.samples.len();
        let test_size = (n as f32 * test_fraction) as usize;
        let mut train_size = n - test_size;
        train_size -= train_size % batch_size;

        let mut samples = self.samples;
        samples.shuffle(rng);
        let test_samples = samples.split_off(train_size);

        tracing::info!(
            train = samples.len(),
            test = test_samples.len(),
            "dataset split"
        );
        Ok((
            Dataset { samples },
            Dataset {
                samples: test_samples,
            },
        ))
    }

    /// Collate the samples at `indices` into one batch.
    pub fn collate<B: Backend>(
        &self,
        indices: &[usize],
        device: &B::Device,
    ) -> SolverResult<Batch<B>> {
        let selected: Vec<&NormalizedSample> = indices
            .iter()
            .map(|&i| {
                self.samples.get(i).ok_or_else(|| {
                    SolverError::Dataset(format!("batch index {i} out of bounds ({})", self.len()))
                })
            })
            .collect::<SolverResult<_>>()?;
        collate(&selected, device)
    }

    /// The whole set as a single batch, the way test evaluation consumes it.
    pub fn collate_all<B: Backend>(&self, device: &B::Device) -> SolverResult<Batch<B>> {
        let all: Vec<&NormalizedSample> = self.samples.iter().collect();
        collate(&all, device)
    }
}

fn collate<B: Backend>(samples: &[&NormalizedSample], device: &B::Device) -> SolverResult<Batch<B>> {
    let images = stack_images::<B>(samples.iter().map(|s| &s.tensor), device)?;
    let mut targets = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        targets.extend_from_slice(&sample.target);
    }
    let targets = Tensor::from_data(TensorData::new(targets, [samples.len(), 2]), device);
    Ok(Batch { images, targets })
}

/// Stack CHW arrays into one `(batch, C, H, W)` tensor. All arrays must
/// share a shape; a mismatch is a fatal precondition violation.
pub fn stack_images<'a, B: Backend>(
    tensors: impl IntoIterator<Item = &'a Array3<f32>>,
    device: &B::Device,
) -> SolverResult<Tensor<B, 4>> {
    let mut iter = tensors.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| SolverError::Dataset("cannot collate an empty batch".into()))?;
    let (c, h, w) = first.dim();

    let mut flat: Vec<f32> = first.iter().copied().collect();
    let mut n = 1;
    for tensor in iter {
        if tensor.dim() != (c, h, w) {
            return Err(SolverError::Dataset(format!(
                "tensor shape {:?} differs from {:?} within one batch",
                tensor.dim(),
                (c, h, w)
            )));
        }
        flat.extend(tensor.iter().copied());
        n += 1;
    }

    Ok(Tensor::from_data(TensorData::new(flat, [n, c, h, w]), device))
}
