//! Configuration loading for the CLI driver.
//!
//! The original Python reads an INI file via `configparser`; this crate
//! loads the equivalent sectioned structure from TOML via `serde` +
//! `toml`, since INI has no first-class serde integration in the Rust
//! ecosystem and TOML is the idiomatic fit (it's what Cargo itself uses).
//! Section and field names mirror the Python config one-for-one, just
//! `snake_case` instead of `camelCase`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::ivfadc::IvfadcConfig;

/// Top-level configuration read from a TOML file.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Paths to the training, base, query, and ground-truth files.
    pub datasets: DatasetsConfig,
    /// Coarse (first-level) quantizer hyperparameters.
    pub coarse_quantizer: CoarseQuantizerConfig,
    /// Product quantizer hyperparameters.
    pub product_quantizer: ProductQuantizerConfig,
    /// Index-level search hyperparameters.
    pub ivfadc: IvfadcSettings,
    /// Reporting and logging options.
    pub misc: MiscConfig,
}

/// `[datasets]` section: paths to each TEXMEX file, format inferred from
/// extension.
#[derive(Debug, Deserialize)]
pub struct DatasetsConfig {
    /// Human-readable name, echoed in the report header.
    pub dataset_name: String,
    /// Training set path (`.fvecs`/`.bvecs`).
    pub train_set: PathBuf,
    /// Base set path, inserted into the index after training.
    pub base_set: PathBuf,
    /// Query set path, searched against the populated index.
    pub query_set: PathBuf,
    /// Ground-truth neighbor ids (`.ivecs`), used for recall@R.
    pub ground_truth: PathBuf,
}

/// `[coarse_quantizer]` section.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CoarseQuantizerConfig {
    /// `K_coarse`: number of coarse Voronoi cells.
    pub number_centroids: usize,
    /// Lloyd iteration cap.
    pub max_iterations: usize,
    /// k-means++ seeding RNG seed.
    pub seed: u64,
}

/// `[product_quantizer]` section.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ProductQuantizerConfig {
    /// `m`: number of sub-spaces.
    pub number_subquantizers: usize,
    /// `K*`: centroids per sub-space (must be a power of two).
    pub number_centroids: usize,
    /// Lloyd iteration cap per sub-quantizer.
    pub max_iterations: usize,
    /// RNG seed shared by every sub-quantizer.
    pub seed: u64,
}

/// `[ivfadc]` section.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct IvfadcSettings {
    /// `w`: number of coarse cells probed per query.
    pub coarse_neighbors_lookup: usize,
    /// `k`: number of neighbors returned per query.
    pub nearest_neighbors: usize,
}

/// `[misc]` section.
#[derive(Debug, Deserialize)]
pub struct MiscConfig {
    /// The `R` values to report recall@R for.
    pub recall_rs: Vec<usize>,
    /// `tracing-subscriber` env-filter directive, e.g. `"info"`.
    pub log_level: String,
}

impl AppConfig {
    /// Parses configuration from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses configuration from a file path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Converts the parsed sections into the core's [`IvfadcConfig`].
    pub fn to_ivfadc_config(&self) -> IvfadcConfig {
        IvfadcConfig {
            nearest_coarse_neighbors_searched: self.ivfadc.coarse_neighbors_lookup,
            coarse_quantizer_centroids: self.coarse_quantizer.number_centroids,
            coarse_quantizer_max_iter: self.coarse_quantizer.max_iterations,
            coarse_quantizer_seed: self.coarse_quantizer.seed,
            product_quantizer_n_subquantizers: self.product_quantizer.number_subquantizers,
            product_quantizer_centroids: self.product_quantizer.number_centroids,
            product_quantizer_max_iter: self.product_quantizer.max_iterations,
            product_quantizer_seed: self.product_quantizer.seed,
        }
    }
}
