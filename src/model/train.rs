/// Epoch-driven training: shuffled fixed-size batches, one Adam step per
/// batch at a fixed learning rate, then a single no-gradient pass over the
/// whole test set. No early stopping; the epoch count bounds the loop.
use std::path::Path;

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::data::dataset::Dataset;
use crate::errors::{SolverError, SolverResult};
use crate::model::loss::{self, DistanceLoss};
use crate::model::net::{ClickNet, ClickNetConfig};

/// Summary of one completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochReport {
    /// 1-based.
    pub epoch: usize,
    /// Mean batch loss over the training partition.
    pub train_loss: f32,
    /// Mean penalty over the held-out set.
    pub test_loss: f32,
    /// Test samples whose penalty fell under the reporting threshold.
    pub test_correct: usize,
    pub test_total: usize,
}

/// Every [`EpochReport`] of a run, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochReport>,
}

impl TrainingHistory {
    pub fn save(&self, path: &Path) -> SolverResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), epochs = self.epochs.len(), "training history saved");
        Ok(())
    }
}

/// Train a fresh network on `train_set`, evaluating against `test_set`
/// after every epoch.
///
/// `train_set.len()` must be an exact multiple of the batch size (what
/// [`Dataset::split`] guarantees), so no partial batch ever reaches the
/// optimizer. A non-finite loss aborts the run instead of letting the
/// parameters diverge silently.
pub fn train<B: AutodiffBackend, R: Rng>(
    config: &SolverConfig,
    train_set: &Dataset,
    test_set: &Dataset,
    device: &B::Device,
    rng: &mut R,
) -> SolverResult<(ClickNet<B>, TrainingHistory)> {
    config.validate()?;
    if train_set.is_empty() || test_set.is_empty() {
        return Err(SolverError::Training(
            "both train and test partitions must be non-empty".into(),
        ));
    }
    if train_set.len() % config.batch_size != 0 {
        return Err(SolverError::Training(format!(
            "train partition size {} is not a multiple of batch size {}",
            train_set.len(),
            config.batch_size
        )));
    }

    let mut model = ClickNetConfig::for_region(&config.region).init::<B>(device);
    let mut optim = AdamConfig::new().init();
    let criterion = DistanceLoss::new();

    let batches_per_epoch = train_set.len() / config.batch_size;
    let mut indices: Vec<usize> = (0..train_set.len()).collect();
    let mut history = TrainingHistory::default();

    for epoch in 1..=config.epochs {
        indices.shuffle(rng);
        let mut train_loss = 0.0f32;

        for chunk in indices.chunks_exact(config.batch_size) {
            let batch = train_set.collate::<B>(chunk, device)?;
            let output = model.forward(batch.images);
            let loss = criterion.forward(output, batch.targets);

            let loss_value = loss.clone().into_scalar().elem::<f32>();
            if !loss_value.is_finite() {
                return Err(SolverError::Training(format!(
                    "non-finite loss {loss_value} in epoch {epoch}; aborting"
                )));
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);
            train_loss += loss_value;
        }
        train_loss /= batches_per_epoch as f32;

        let report = evaluate(&model.valid(), test_set, &criterion, device, epoch, train_loss)?;
        tracing::info!(
            epoch,
            train_loss = report.train_loss,
            test_loss = report.test_loss,
            test_correct = report.test_correct,
            test_total = report.test_total,
            "epoch complete"
        );
        history.epochs.push(report);
    }

    Ok((model, history))
}

/// One forward pass over the whole test set as a single batch, on the
/// non-autodiff inner backend: gradients disabled, parameters untouched.
fn evaluate<B: Backend>(
    model: &ClickNet<B>,
    test_set: &Dataset,
    criterion: &DistanceLoss,
    device: &B::Device,
    epoch: usize,
    train_loss: f32,
) -> SolverResult<EpochReport> {
    let batch = test_set.collate_all::<B>(device)?;
    let output = model.forward(batch.images);
    let penalties = criterion
        .penalties(output, batch.targets)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| SolverError::Training(format!("could not read penalties: {e:?}")))?;

    let test_total = penalties.len();
    let test_loss = penalties.iter().sum::<f32>() / test_total as f32;
    Ok(EpochReport {
        epoch,
        train_loss,
        test_loss,
        test_correct: loss::correct_count(&penalties),
        test_total,
    })
}
