#![warn(missing_docs)]

//! An IVFADC (Inverted File with Asymmetric Distance Computation) index for
//! approximate nearest-neighbor search over high-dimensional `f32` vectors,
//! following Jégou et al., "Product Quantization for Nearest Neighbor
//! Search". A Lloyd k-means quantizer ([`kmeans`]) partitions the space
//! coarsely and, independently, quantizes residual sub-spaces
//! ([`pq`]); [`ivfadc`] composes both into the inverted-file index with
//! multi-probe asymmetric-distance search.
//!
//! The [`io`] module holds external collaborators (TEXMEX dataset readers,
//! recall evaluation, TOML configuration) used by the `ivfadc` CLI binary;
//! none of it is required to use the index as a library.

pub mod distance;
pub mod error;
pub mod io;
pub mod ivfadc;
pub mod kmeans;
pub mod pq;
pub mod topk;
pub mod vector;
