use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{SolverError, SolverResult};

/// Rectangle within the raw screenshot that contains the clickable area.
///
/// Threaded explicitly through preprocessing and coordinate mapping so that
/// several regions (and the models trained for them) can coexist in one
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Region {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> SolverResult<Self> {
        let region = Self { x0, y0, x1, y1 };
        region.validate()?;
        Ok(region)
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// A region with non-positive width or height is a misconfiguration and
    /// must abort loudly rather than silently degrade downstream.
    pub fn validate(&self) -> SolverResult<()> {
        if self.x1 <= self.x0 || self.y1 <= self.y0 {
            return Err(SolverError::Config(format!(
                "region ({},{})-({},{}) has non-positive width or height",
                self.x0, self.y0, self.x1, self.y1
            )));
        }
        Ok(())
    }
}

/// All tunables the caller supplies for training and inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Number of training epochs. No early stopping: training is a bounded
    /// loop and a caller wishing to bound wall-clock time bounds this.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Fraction of the assembled dataset held out for evaluation.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f32,
    /// Raw screenshots must match these dimensions exactly; everything else
    /// is dropped during dataset assembly.
    #[serde(default = "default_expected_width")]
    pub expected_width: u32,
    #[serde(default = "default_expected_height")]
    pub expected_height: u32,
    #[serde(default = "default_region")]
    pub region: Region,
}

fn default_epochs() -> usize {
    10
}

fn default_batch_size() -> usize {
    16
}

fn default_learning_rate() -> f64 {
    1e-4
}

fn default_test_fraction() -> f32 {
    0.25
}

fn default_expected_width() -> u32 {
    500
}

fn default_expected_height() -> u32 {
    536
}

fn default_region() -> Region {
    Region {
        x0: 83,
        y0: 194,
        x1: 417,
        y1: 527,
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            test_fraction: default_test_fraction(),
            expected_width: default_expected_width(),
            expected_height: default_expected_height(),
            region: default_region(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> SolverResult<()> {
        self.region.validate()?;
        if self.batch_size == 0 {
            return Err(SolverError::Config("batch_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(SolverError::Config(format!(
                "test_fraction {} must lie in [0, 1)",
                self.test_fraction
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(SolverError::Config(format!(
                "learning_rate {} must be positive",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

fn resolve_config_path() -> SolverResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(SolverError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> SolverResult<SolverConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config: SolverConfig = toml::from_str(&content)?;
    config.validate()?;
    tracing::info!(path = %path.display(), epochs = config.epochs, "config loaded");
    Ok(config)
}

pub fn save_config(config: &SolverConfig) -> SolverResult<()> {
    let path = resolve_config_path()?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
