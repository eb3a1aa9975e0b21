use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCode, Result};
use crate::kmeans::KMeans;
use crate::pq::{ProductCode, ProductQuantizer};
use crate::topk::KeepLargestHeap;
use crate::vector::Vector;

/// Hyperparameters for building an [`Ivfadc`] index.
#[derive(Debug, Clone, Copy)]
pub struct IvfadcConfig {
    /// Number of coarse centroids to probe during search.
    pub nearest_coarse_neighbors_searched: usize,
    /// Number of coarse quantizer clusters.
    pub coarse_quantizer_centroids: usize,
    /// Maximum Lloyd iterations for the coarse quantizer.
    pub coarse_quantizer_max_iter: usize,
    /// Seed for the coarse quantizer's k-means++ initialization.
    pub coarse_quantizer_seed: u64,
    /// Number of product quantizer sub-spaces.
    pub product_quantizer_n_subquantizers: usize,
    /// Number of centroids per product quantizer sub-space.
    pub product_quantizer_centroids: usize,
    /// Maximum Lloyd iterations per product quantizer sub-space.
    pub product_quantizer_max_iter: usize,
    /// Seed for the product quantizer's k-means++ initialization.
    pub product_quantizer_seed: u64,
}

impl Default for IvfadcConfig {
    fn default() -> Self {
        Self {
            nearest_coarse_neighbors_searched: 8,
            coarse_quantizer_centroids: 1000,
            coarse_quantizer_max_iter: 50,
            coarse_quantizer_seed: 0,
            product_quantizer_n_subquantizers: 8,
            product_quantizer_centroids: 256,
            product_quantizer_max_iter: 50,
            product_quantizer_seed: 0,
        }
    }
}

/// An entry posted to one inverted list: an inserted id and its product
/// code relative to that list's coarse centroid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfEntry {
    /// Caller-assigned identifier for the inserted vector.
    pub id: u64,
    /// Product code of the residual against the list's coarse centroid.
    pub code: ProductCode,
}

/// An inverted file index with asymmetric distance computation, combining
/// a coarse quantizer and a product quantizer over residuals, following
/// Jégou et al., "Product Quantization for Nearest Neighbor Search".
#[derive(Serialize, Deserialize)]
pub struct Ivfadc {
    config: SerializableConfig,

    coarse_centroids: Vec<Vector>,
    pq_centroids: Vec<Vec<Vector>>,

    ivf: Vec<Vec<IvfEntry>>,
    dimension: usize,
    trained: bool,
}

// Mirrors `IvfadcConfig` but derives (de)serialization; kept separate so
// the public config type stays a plain `Copy` struct for callers.
#[derive(Serialize, Deserialize, Clone, Copy)]
struct SerializableConfig {
    nearest_coarse_neighbors_searched: usize,
    coarse_quantizer_centroids: usize,
    coarse_quantizer_max_iter: usize,
    coarse_quantizer_seed: u64,
    product_quantizer_n_subquantizers: usize,
    product_quantizer_centroids: usize,
    product_quantizer_max_iter: usize,
    product_quantizer_seed: u64,
}

impl From<IvfadcConfig> for SerializableConfig {
    fn from(c: IvfadcConfig) -> Self {
        Self {
            nearest_coarse_neighbors_searched: c.nearest_coarse_neighbors_searched,
            coarse_quantizer_centroids: c.coarse_quantizer_centroids,
            coarse_quantizer_max_iter: c.coarse_quantizer_max_iter,
            coarse_quantizer_seed: c.coarse_quantizer_seed,
            product_quantizer_n_subquantizers: c.product_quantizer_n_subquantizers,
            product_quantizer_centroids: c.product_quantizer_centroids,
            product_quantizer_max_iter: c.product_quantizer_max_iter,
            product_quantizer_seed: c.product_quantizer_seed,
        }
    }
}

impl Ivfadc {
    /// Creates a new, untrained index with the given configuration.
    pub fn new(config: IvfadcConfig) -> Self {
        Self {
            config: config.into(),
            coarse_centroids: Vec::new(),
            pq_centroids: Vec::new(),
            ivf: Vec::new(),
            dimension: 0,
            trained: false,
        }
    }

    /// Builds a trained index directly from its constituent parts,
    /// bypassing [`Ivfadc::train`]. Intended for tests that need to pin
    /// the coarse and product codebooks to known values.
    #[cfg(test)]
    pub(crate) fn from_parts(
        config: IvfadcConfig,
        coarse_centroids: Vec<Vector>,
        pq_centroids: Vec<Vec<Vector>>,
        dimension: usize,
    ) -> Self {
        let ivf = vec![Vec::new(); coarse_centroids.len()];
        Self {
            config: config.into(),
            coarse_centroids,
            pq_centroids,
            ivf,
            dimension,
            trained: true,
        }
    }

    /// Trains the coarse quantizer on `data`, then trains the product
    /// quantizer on the residuals against each vector's assigned coarse
    /// centroid. The index carries no inserted entries after training.
    ///
    /// Returns [`ErrorCode::AlreadyTrained`] if called more than once.
    pub fn train(&mut self, data: &[Vector]) -> Result<()> {
        if self.trained {
            return Err(Error::new(ErrorCode::AlreadyTrained, "index has already been trained"));
        }
        if data.is_empty() {
            return Err(Error::new(ErrorCode::InsufficientData, "training set must not be empty"));
        }

        let dimension = data[0].len();
        if data.iter().any(|v| v.len() != dimension) {
            return Err(Error::new(ErrorCode::InvalidShape, "training vectors must share a dimension"));
        }

        let w = self.config.nearest_coarse_neighbors_searched;
        let k_coarse = self.config.coarse_quantizer_centroids;
        if w == 0 || w > k_coarse {
            return Err(Error::new(
                ErrorCode::InvalidParam,
                format!("nearest_coarse_neighbors_searched must be in [1, {k_coarse}], got {w}"),
            ));
        }

        let mut coarse = KMeans::new(
            self.config.coarse_quantizer_centroids,
            self.config.coarse_quantizer_max_iter,
            self.config.coarse_quantizer_seed,
        )?;
        coarse.fit(data)?;
        let coarse_centroids = coarse.centroids()?;
        tracing::debug!(clusters = coarse_centroids.len(), "coarse quantizer trained");

        let residuals: Vec<Vector> = data
            .iter()
            .zip(coarse.assignments().iter())
            .map(|(vector, &cluster)| vector.residual(&coarse_centroids[cluster]))
            .collect();

        let mut pq = ProductQuantizer::new(
            self.config.product_quantizer_n_subquantizers,
            self.config.product_quantizer_centroids,
            self.config.product_quantizer_max_iter,
            self.config.product_quantizer_seed,
        )?;
        pq.fit(&residuals)?;
        let pq_centroids = pq.centroids()?;
        tracing::debug!(subquantizers = pq_centroids.len(), "product quantizer trained");

        self.ivf = vec![Vec::new(); coarse_centroids.len()];
        self.coarse_centroids = coarse_centroids.to_vec();
        self.pq_centroids = pq_centroids.to_vec();
        self.dimension = dimension;
        self.trained = true;
        tracing::info!(n = data.len(), dim = dimension, "ivfadc index trained");
        Ok(())
    }

    /// Inserts a vector under `id` into the inverted list of its nearest
    /// coarse centroid, encoding the residual with the product quantizer.
    pub fn insert(&mut self, id: u64, vector: &Vector) -> Result<()> {
        self.require_trained()?;
        self.require_dimension(vector)?;

        let pq = self.product_quantizer();
        let cluster = nearest_centroid(vector, &self.coarse_centroids);
        let residual = vector.residual(&self.coarse_centroids[cluster]);
        let code = pq.encode(&residual)?;

        self.ivf[cluster].push(IvfEntry { id, code });
        Ok(())
    }

    /// Searches for the `k` approximate nearest neighbors of `query`.
    ///
    /// Probes the `nearest_coarse_neighbors_searched` closest coarse
    /// centroids and ranks every entry under those lists by asymmetric
    /// distance. May return fewer than `k` ids if the probed lists
    /// together hold fewer entries.
    pub fn search(&self, query: &Vector, k: usize) -> Result<Vec<u64>> {
        self.require_trained()?;
        self.require_dimension(query)?;
        if k == 0 {
            return Err(Error::new(ErrorCode::InvalidParam, "k must be at least 1"));
        }

        let pq = self.product_quantizer();
        let probed = nearest_n_centroids(
            query,
            &self.coarse_centroids,
            self.config.nearest_coarse_neighbors_searched,
        );

        let mut heap = KeepLargestHeap::new(k);
        for cluster in probed {
            let residual = query.residual(&self.coarse_centroids[cluster]);
            let table = pq.distance_tables(&residual)?;

            for entry in &self.ivf[cluster] {
                let distance = ProductQuantizer::asymmetric_distance(&table, &entry.code);
                // Heap keeps the largest priority; negate distance so the
                // closest (smallest-distance) entries are kept.
                heap.add(-distance, entry.id);
            }
        }

        Ok(heap.drain_descending().into_iter().map(|(_, id)| id).collect())
    }

    /// Serializes the trained index to `writer`.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        self.require_trained()?;
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Deserializes a previously saved index from `reader`.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let index: Self = bincode::deserialize_from(reader)?;
        Ok(index)
    }

    /// Total number of entries across all inverted lists.
    pub fn len(&self) -> usize {
        self.ivf.iter().map(|list| list.len()).sum()
    }

    /// True if no vectors have been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn product_quantizer(&self) -> ProductQuantizer {
        ProductQuantizer::from_codebook(self.pq_centroids.clone())
    }

    fn require_trained(&self) -> Result<()> {
        if !self.trained {
            return Err(Error::new(ErrorCode::NotTrained, "index has not been trained"));
        }
        Ok(())
    }

    fn require_dimension(&self, vector: &Vector) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::new(
                ErrorCode::DimensionMismatch,
                format!("index was trained on dimension {} but received {}", self.dimension, vector.len()),
            ));
        }
        Ok(())
    }
}

fn nearest_centroid(vector: &Vector, centroids: &[Vector]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, centroid)| (i, crate::distance::squared_euclidean(vector.as_slice(), centroid.as_slice())))
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
        .map(|(i, _)| i)
        .unwrap()
}

fn nearest_n_centroids(vector: &Vector, centroids: &[Vector], n: usize) -> Vec<usize> {
    let mut distances: Vec<(usize, f32)> = centroids
        .iter()
        .enumerate()
        .map(|(i, centroid)| (i, crate::distance::squared_euclidean(vector.as_slice(), centroid.as_slice())))
        .collect();

    distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    distances.truncate(n);
    distances.into_iter().map(|(i, _)| i).collect()
}
