//! External collaborators: dataset readers, recall evaluation, and
//! configuration loading. Kept separate from the algorithmic core
//! (`kmeans`, `pq`, `ivfadc`) per the crate's single-threaded,
//! train/insert/search contract — none of these modules touch the index's
//! internal state directly.

pub mod config;
pub mod recall;
pub mod texmex;
