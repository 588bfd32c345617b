/// Versioned model persistence.
///
/// Parameters go into a MessagePack record at `<path>.mpk`; a TOML sidecar
/// at `<path>.toml` carries the format version and the region/raw-dimension
/// fingerprint the model was trained for. Loading checks both, so a stale
/// blob or a model trained for a different region fails loudly instead of
/// producing nonsense clicks.
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};

use crate::config::{Region, SolverConfig};
use crate::errors::{SolverError, SolverResult};
use crate::model::net::{ClickNet, ClickNetConfig};

/// Bump when the serialized parameter layout changes.
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMeta {
    pub format_version: u32,
    pub expected_width: u32,
    pub expected_height: u32,
    // table value; keep it after the scalars for TOML serialization
    pub region: Region,
}

impl ModelMeta {
    fn for_config(config: &SolverConfig) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            region: config.region,
            expected_width: config.expected_width,
            expected_height: config.expected_height,
        }
    }

    fn matches(&self, config: &SolverConfig) -> bool {
        self.region == config.region
            && self.expected_width == config.expected_width
            && self.expected_height == config.expected_height
    }
}

fn meta_path(path: &Path) -> PathBuf {
    path.with_extension("toml")
}

pub fn save_model<B: Backend>(
    model: ClickNet<B>,
    config: &SolverConfig,
    path: &Path,
) -> SolverResult<()> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model.save_file(path, &recorder)?;
    let meta = ModelMeta::for_config(config);
    std::fs::write(meta_path(path), toml::to_string_pretty(&meta)?)?;
    tracing::info!(path = %path.display(), "model saved");
    Ok(())
}

/// Restore a model saved by [`save_model`]. The restored network produces
/// identical outputs for identical inputs.
pub fn load_model<B: Backend>(
    config: &SolverConfig,
    path: &Path,
    device: &B::Device,
) -> SolverResult<ClickNet<B>> {
    let meta: ModelMeta = toml::from_str(&std::fs::read_to_string(meta_path(path))?)?;
    if meta.format_version != MODEL_FORMAT_VERSION {
        return Err(SolverError::Persistence(format!(
            "model format version {} is not supported (expected {})",
            meta.format_version, MODEL_FORMAT_VERSION
        )));
    }
    if !meta.matches(config) {
        return Err(SolverError::Persistence(format!(
            "model was trained for region ({},{})-({},{}) on {}×{} rasters, \
             which does not match the current configuration",
            meta.region.x0,
            meta.region.y0,
            meta.region.x1,
            meta.region.y1,
            meta.expected_width,
            meta.expected_height
        )));
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let model = ClickNetConfig::for_region(&config.region)
        .init::<B>(device)
        .load_file(path, &recorder, device)?;
    tracing::info!(path = %path.display(), "model loaded");
    Ok(model)
}
