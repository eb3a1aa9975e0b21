use rayon::prelude::*;

use crate::distance::squared_euclidean;
use crate::error::{Error, ErrorCode, Result};
use crate::kmeans::KMeans;
use crate::vector::Vector;

/// A product-quantized code: one centroid index per sub-quantizer.
pub type ProductCode = Vec<u32>;

/// Splits vectors into `m` sub-spaces and trains an independent k-means
/// quantizer over each, following Jégou et al.'s product quantization.
pub struct ProductQuantizer {
    n_subquantizers: usize,
    n_clusters: usize,
    max_iter: usize,
    seed: u64,

    // One centroid table per sub-quantizer: `centroids[i][c]` is the
    // `c`-th centroid of the `i`-th sub-space.
    centroids: Vec<Vec<Vector>>,
    trained: bool,
}

impl ProductQuantizer {
    /// Creates a new, untrained product quantizer.
    ///
    /// `n_clusters` must be a power of two so that each sub-code fits in
    /// a fixed bit width; returns [`ErrorCode::InvalidParam`] otherwise.
    pub fn new(n_subquantizers: usize, n_clusters: usize, max_iter: usize, seed: u64) -> Result<Self> {
        if n_subquantizers == 0 {
            return Err(Error::new(ErrorCode::InvalidParam, "n_subquantizers must be positive"));
        }
        if n_clusters == 0 {
            return Err(Error::new(ErrorCode::InvalidParam, "n_clusters must be positive"));
        }
        if !n_clusters.is_power_of_two() {
            return Err(Error::new(ErrorCode::InvalidParam, "n_clusters must be a power of two"));
        }
        if max_iter == 0 {
            return Err(Error::new(ErrorCode::InvalidParam, "max_iter must be positive"));
        }

        Ok(Self {
            n_subquantizers,
            n_clusters,
            max_iter,
            seed,
            centroids: Vec::with_capacity(n_subquantizers),
            trained: false,
        })
    }

    /// Builds a quantizer directly from precomputed per-subspace centroid
    /// tables, bypassing [`ProductQuantizer::fit`]. [`crate::ivfadc::Ivfadc`]
    /// stores only the trained codebook (not a `ProductQuantizer`, which
    /// carries no serializable form of its own) and uses this to rebuild a
    /// transient view over it for each `encode`/`distance_tables` call;
    /// tests that need to pin a codebook to known values (scenario S3) use
    /// the same path.
    pub(crate) fn from_codebook(centroids: Vec<Vec<Vector>>) -> Self {
        let n_subquantizers = centroids.len();
        let n_clusters = centroids.first().map(|c| c.len()).unwrap_or(0);
        Self {
            n_subquantizers,
            n_clusters,
            max_iter: 1,
            seed: 0,
            centroids,
            trained: true,
        }
    }

    /// Number of bits required to encode one product code.
    pub fn code_bit_length(&self) -> u32 {
        let bits_per_code = usize_bits(self.n_clusters - 1);
        self.n_subquantizers as u32 * bits_per_code
    }

    /// Trains one k-means quantizer per sub-space on `data`.
    pub fn fit(&mut self, data: &[Vector]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::new(ErrorCode::InsufficientData, "product quantizer needs at least one vector"));
        }

        let dimension = data[0].len();
        if dimension % self.n_subquantizers != 0 {
            return Err(Error::new(
                ErrorCode::InvalidShape,
                format!(
                    "vector dimension {} is not divisible by {} subquantizers",
                    dimension, self.n_subquantizers
                ),
            ));
        }

        let mut tables = Vec::with_capacity(self.n_subquantizers);
        for i in 0..self.n_subquantizers {
            let subvectors: Vec<Vector> = data.iter().map(|v| self.subvector(i, v)).collect();

            let mut kmeans = KMeans::new(self.n_clusters, self.max_iter, self.seed.wrapping_add(i as u64))?;
            kmeans.fit(&subvectors)?;
            tables.push(kmeans.centroids()?.to_vec());
        }

        self.centroids = tables;
        self.trained = true;
        Ok(())
    }

    /// Encodes a single full-length vector into a product code.
    pub fn encode(&self, vector: &Vector) -> Result<ProductCode> {
        self.require_trained()?;

        Ok((0..self.n_subquantizers)
            .into_par_iter()
            .map(|i| {
                let subvector = self.subvector(i, vector);
                self.nearest_code(i, &subvector) as u32
            })
            .collect())
    }

    /// Encodes every vector in `data` into a product code.
    pub fn encode_batch(&self, data: &[Vector]) -> Result<Vec<ProductCode>> {
        self.require_trained()?;
        data.iter().map(|v| self.encode(v)).collect()
    }

    /// Builds a per-subspace squared-distance table for `query`: entry
    /// `[i][c]` is the squared distance from the `i`-th sub-query to the
    /// `c`-th centroid of the `i`-th sub-quantizer.
    ///
    /// The codebook's own coordinates (after residual decomposition) are
    /// unsquared Euclidean distances in the system this crate was
    /// distilled from; this implementation deliberately sums SQUARED
    /// per-subspace distances instead, matching the usual asymmetric
    /// distance computation formulation and avoiding unnecessary square
    /// roots on the hot search path.
    pub fn distance_tables(&self, query: &Vector) -> Result<Vec<Vec<f32>>> {
        self.require_trained()?;

        Ok((0..self.n_subquantizers)
            .into_par_iter()
            .map(|i| {
                let subvector = self.subvector(i, query);
                self.centroids[i]
                    .iter()
                    .map(|centroid| squared_euclidean(subvector.as_slice(), centroid.as_slice()))
                    .collect()
            })
            .collect())
    }

    /// Sums a product code's per-subspace distances from a distance table.
    pub fn asymmetric_distance(table: &[Vec<f32>], code: &ProductCode) -> f32 {
        code.iter()
            .enumerate()
            .map(|(i, &centroid_id)| table[i][centroid_id as usize])
            .sum()
    }

    /// Returns the trained per-subspace centroid tables.
    ///
    /// Returns [`ErrorCode::NotTrained`] if called before [`ProductQuantizer::fit`].
    pub fn centroids(&self) -> Result<&[Vec<Vector>]> {
        self.require_trained()?;
        Ok(&self.centroids)
    }

    fn subvector(&self, part_index: usize, vector: &Vector) -> Vector {
        let dim = vector.len() / self.n_subquantizers;
        let start = part_index * dim;
        let end = start + dim;
        Vector(vector.as_slice()[start..end].to_vec())
    }

    fn nearest_code(&self, part_index: usize, subvector: &Vector) -> usize {
        self.centroids[part_index]
            .iter()
            .enumerate()
            .map(|(i, centroid)| (i, squared_euclidean(subvector.as_slice(), centroid.as_slice())))
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    }

    fn require_trained(&self) -> Result<()> {
        if !self.trained {
            return Err(Error::new(ErrorCode::NotTrained, "product quantizer has not been fit"));
        }
        Ok(())
    }
}

fn usize_bits(n: usize) -> u32 {
    usize::BITS - n.leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Vec<Vector> {
        let mut data = Vec::new();
        for i in 0..40 {
            data.push(Vector(vec![(i % 4) as f32, (i % 4) as f32, (i % 2) as f32, (i % 2) as f32]));
        }
        data
    }

    #[test]
    fn rejects_non_power_of_two_clusters() {
        assert!(ProductQuantizer::new(2, 3, 10, 0).is_err());
    }

    #[test]
    fn rejects_zero_subquantizers() {
        assert!(ProductQuantizer::new(0, 4, 10, 0).is_err());
    }

    #[test]
    fn encode_before_fit_errors() {
        let pq = ProductQuantizer::new(2, 4, 10, 0).unwrap();
        assert!(pq.encode(&Vector(vec![0.0; 4])).is_err());
    }

    #[test]
    fn centroids_before_fit_errors() {
        let pq = ProductQuantizer::new(2, 4, 10, 0).unwrap();
        assert!(pq.centroids().is_err());
    }

    #[test]
    fn rejects_dimension_not_divisible_by_subquantizers() {
        let mut pq = ProductQuantizer::new(3, 4, 10, 0).unwrap();
        let data = vec![Vector(vec![0.0, 1.0, 2.0, 3.0]); 10];
        assert!(pq.fit(&data).is_err());
    }

    #[test]
    fn encode_assigns_nearest_centroid_per_subspace() {
        let mut pq = ProductQuantizer::new(2, 4, 25, 1).unwrap();
        let data = dataset();
        pq.fit(&data).unwrap();

        for vector in &data {
            let code = pq.encode(vector).unwrap();
            assert_eq!(code.len(), 2);

            for (i, &centroid_id) in code.iter().enumerate() {
                let subvector = pq.subvector(i, vector);
                let expected = pq.nearest_code(i, &subvector);
                assert_eq!(centroid_id as usize, expected);
            }
        }
    }

    #[test]
    fn encode_batch_agrees_with_an_independently_trained_subquantizer() {
        // Property 2 (§8): the code PQ assigns to a training row must match
        // the label its own sub-quantizer would assign to that row's slice.
        // Since sub-quantizers aren't retained after fit, retrain one
        // in isolation with the same seed and compare against the kept
        // codebook's nearest-centroid answer for the same slice.
        let mut pq = ProductQuantizer::new(2, 4, 25, 1).unwrap();
        let data = dataset();
        pq.fit(&data).unwrap();

        let dim = data[0].len() / 2;
        let slice: Vec<Vector> =
            data.iter().map(|v| Vector(v.as_slice()[dim..2 * dim].to_vec())).collect();
        let mut sub = KMeans::new(4, 25, 1u64.wrapping_add(1)).unwrap();
        sub.fit(&slice).unwrap();

        let codes = pq.encode_batch(&data).unwrap();
        for (n, code) in codes.iter().enumerate() {
            assert_eq!(code[1] as usize, sub.predict(&slice[n]).unwrap());
        }
    }

    #[test]
    fn distance_table_matches_direct_asymmetric_distance() {
        let mut pq = ProductQuantizer::new(2, 4, 25, 1).unwrap();
        let data = dataset();
        pq.fit(&data).unwrap();

        let query = data[0].clone();
        let table = pq.distance_tables(&query).unwrap();
        let code = pq.encode(&data[5]).unwrap();

        let expected: f32 = (0..2)
            .map(|i| {
                let sub_q = pq.subvector(i, &query);
                let centroid = &pq.centroids().unwrap()[i][code[i] as usize];
                squared_euclidean(sub_q.as_slice(), centroid.as_slice())
            })
            .sum();

        assert!((ProductQuantizer::asymmetric_distance(&table, &code) - expected).abs() < 1e-5);
    }

    #[test]
    fn every_code_element_lies_within_the_cluster_alphabet() {
        // Property 3 (§8): every product code element lies in [0, K*).
        let mut pq = ProductQuantizer::new(2, 4, 25, 1).unwrap();
        let data = dataset();
        pq.fit(&data).unwrap();

        for code in pq.encode_batch(&data).unwrap() {
            assert!(code.iter().all(|&c| (c as usize) < 4));
        }
    }

    #[test]
    fn code_bit_length_accounts_for_all_subquantizers() {
        let pq = ProductQuantizer::new(8, 256, 10, 0).unwrap();
        assert_eq!(pq.code_bit_length(), 64);
    }

    // S3 (spec.md §8): a hand-wired 3-subspace, 4-centroid-per-subspace
    // codebook over 6-D vectors, using the test-only `from_codebook`
    // constructor the spec's REDESIGN FLAGS legitimize for this purpose.
    fn s3_codebook() -> Vec<Vec<Vector>> {
        let corner = |a: f32, b: f32| Vector(vec![a, b]);
        vec![
            vec![corner(1.0, 1.0), corner(1.0, -1.0), corner(-1.0, -1.0), corner(-1.0, 1.0)],
            vec![corner(1.0, -1.0), corner(-1.0, -1.0), corner(-1.0, 1.0), corner(1.0, 1.0)],
            vec![corner(-1.0, -1.0), corner(-1.0, 1.0), corner(1.0, 1.0), corner(1.0, -1.0)],
        ]
    }

    #[test]
    fn s3_encode_matches_reference_codes() {
        let pq = ProductQuantizer::from_codebook(s3_codebook());

        assert_eq!(pq.encode(&Vector(vec![2.0, 2.0, 2.0, 2.0, 2.0, 2.0])).unwrap(), vec![0, 3, 2]);
        assert_eq!(pq.encode(&Vector(vec![2.0, -2.0, 2.0, -2.0, 2.0, -2.0])).unwrap(), vec![1, 0, 3]);
        assert_eq!(pq.encode(&Vector(vec![-2.0, -2.0, -2.0, -2.0, -2.0, -2.0])).unwrap(), vec![2, 1, 0]);
        assert_eq!(pq.encode(&Vector(vec![-2.0, 2.0, -2.0, 2.0, -2.0, 2.0])).unwrap(), vec![3, 2, 1]);
    }
}
