use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::distance::squared_euclidean;
use crate::error::{Error, ErrorCode, Result};
use crate::vector::Vector;

/// Lloyd's k-means clustering with k-means++ seeding.
///
/// Uses squared Euclidean distance throughout and a deterministic,
/// seeded pseudo-random source so that a fixed seed yields bit-identical
/// centroids across runs.
#[derive(Debug)]
pub struct KMeans {
    n_clusters: usize,
    max_iter: usize,
    tolerance: f32,
    seed: u64,

    centroids: Vec<Vector>,
    assignments: Vec<usize>,
    trained: bool,
}

impl KMeans {
    /// Creates a new, untrained k-means quantizer.
    ///
    /// Returns [`ErrorCode::InvalidParam`] if `n_clusters` or `max_iter`
    /// is zero.
    pub fn new(n_clusters: usize, max_iter: usize, seed: u64) -> Result<Self> {
        if n_clusters == 0 {
            return Err(Error::new(ErrorCode::InvalidParam, "n_clusters must be positive"));
        }
        if max_iter == 0 {
            return Err(Error::new(ErrorCode::InvalidParam, "max_iter must be positive"));
        }

        Ok(Self {
            n_clusters,
            max_iter,
            tolerance: 1e-4,
            seed,
            centroids: Vec::with_capacity(n_clusters),
            assignments: Vec::new(),
            trained: false,
        })
    }

    /// Trains the quantizer on `data`.
    ///
    /// Returns [`ErrorCode::InsufficientData`] if fewer vectors than
    /// clusters are supplied.
    pub fn fit(&mut self, data: &[Vector]) -> Result<()> {
        if data.len() < self.n_clusters {
            return Err(Error::new(
                ErrorCode::InsufficientData,
                format!(
                    "need at least {} vectors to form {} clusters, got {}",
                    self.n_clusters,
                    self.n_clusters,
                    data.len()
                ),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.init_centroids_plus_plus(data, &mut rng);
        let mut assignments = vec![0usize; data.len()];

        for _ in 0..self.max_iter {
            let new_assignments = self.assign(data, &centroids);
            let new_centroids = self.update_centroids(data, &new_assignments, &centroids);

            let shift = centroid_shift(&centroids, &new_centroids);
            let scale = centroid_scale(&centroids).max(1.0);

            centroids = new_centroids;
            assignments = new_assignments;

            if shift / scale < self.tolerance {
                tracing::trace!(shift, scale, "k-means converged before max_iter");
                break;
            }
        }

        // Recompute against the final centroids: when the loop exits by
        // hitting `max_iter` rather than converging, `assignments` above
        // still reflects the centroids from one iteration back.
        assignments = self.assign(data, &centroids);

        self.centroids = centroids;
        self.assignments = assignments;
        self.trained = true;
        Ok(())
    }

    fn init_centroids_plus_plus(&self, data: &[Vector], rng: &mut StdRng) -> Vec<Vector> {
        let mut centroids = Vec::with_capacity(self.n_clusters);

        let first = rng.gen_range(0..data.len());
        centroids.push(data[first].clone());

        while centroids.len() < self.n_clusters {
            let distances: Vec<f32> = data
                .par_iter()
                .map(|vector| {
                    centroids
                        .iter()
                        .map(|centroid| squared_euclidean(vector.as_slice(), centroid.as_slice()))
                        .fold(f32::INFINITY, f32::min)
                })
                .collect();

            let total: f32 = distances.iter().sum();
            if total <= 0.0 {
                // All remaining points coincide with a chosen centroid; pick
                // the next distinct vector deterministically.
                let next = (centroids.len()) % data.len();
                centroids.push(data[next].clone());
                continue;
            }

            let threshold = rng.gen::<f32>() * total;
            let mut cumulative = 0.0;
            let mut chosen = data.len() - 1;
            for (i, distance) in distances.iter().enumerate() {
                cumulative += distance;
                if cumulative >= threshold {
                    chosen = i;
                    break;
                }
            }

            centroids.push(data[chosen].clone());
        }

        centroids
    }

    fn assign(&self, data: &[Vector], centroids: &[Vector]) -> Vec<usize> {
        data.par_iter()
            .map(|vector| nearest_index(vector, centroids))
            .collect()
    }

    fn update_centroids(
        &self,
        data: &[Vector],
        assignments: &[usize],
        previous: &[Vector],
    ) -> Vec<Vector> {
        let dimension = data[0].len();
        let mut sums = vec![vec![0.0f32; dimension]; self.n_clusters];
        let mut counts = vec![0usize; self.n_clusters];

        for (vector, &cluster) in data.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for (sum, value) in sums[cluster].iter_mut().zip(vector.as_slice().iter()) {
                *sum += value;
            }
        }

        sums.into_par_iter()
            .enumerate()
            .map(|(i, sum)| {
                if counts[i] == 0 {
                    // Retain the previous center for clusters that received
                    // no assignments this iteration, rather than reseeding.
                    previous[i].clone()
                } else {
                    let count = counts[i] as f32;
                    Vector(sum.into_iter().map(|v| v / count).collect())
                }
            })
            .collect()
    }

    /// Predicts the nearest centroid index for a single vector.
    ///
    /// Returns [`ErrorCode::NotTrained`] if called before [`KMeans::fit`].
    pub fn predict(&self, vector: &Vector) -> Result<usize> {
        self.require_trained()?;
        Ok(nearest_index(vector, &self.centroids))
    }

    /// Predicts the nearest centroid index for each vector in `data`.
    pub fn predict_batch(&self, data: &[Vector]) -> Result<Vec<usize>> {
        self.require_trained()?;
        Ok(data.par_iter().map(|v| nearest_index(v, &self.centroids)).collect())
    }

    /// Returns the `n` closest centroid indices to `vector`, nearest first.
    pub fn predict_n_closest(&self, vector: &Vector, n: usize) -> Result<Vec<usize>> {
        self.require_trained()?;

        let mut distances: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, centroid)| (i, squared_euclidean(vector.as_slice(), centroid.as_slice())))
            .collect();

        distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        distances.truncate(n);
        Ok(distances.into_iter().map(|(i, _)| i).collect())
    }

    /// Returns the trained centroids.
    ///
    /// Returns [`ErrorCode::NotTrained`] if called before [`KMeans::fit`].
    pub fn centroids(&self) -> Result<&[Vector]> {
        self.require_trained()?;
        Ok(&self.centroids)
    }

    /// Returns the cluster index assigned to each training vector.
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    fn require_trained(&self) -> Result<()> {
        if !self.trained {
            return Err(Error::new(ErrorCode::NotTrained, "k-means has not been fit"));
        }
        Ok(())
    }
}

fn nearest_index(vector: &Vector, centroids: &[Vector]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, centroid)| (i, squared_euclidean(vector.as_slice(), centroid.as_slice())))
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
        .map(|(i, _)| i)
        .unwrap()
}

fn centroid_shift(previous: &[Vector], current: &[Vector]) -> f32 {
    previous
        .iter()
        .zip(current.iter())
        .map(|(a, b)| squared_euclidean(a.as_slice(), b.as_slice()))
        .sum::<f32>()
        .sqrt()
}

fn centroid_scale(centroids: &[Vector]) -> f32 {
    centroids
        .iter()
        .map(|c| c.as_slice().iter().map(|x| x * x).sum::<f32>())
        .sum::<f32>()
        .sqrt()
}
