//! Provclust: socio-economic clustering of provinces.
//!
//! The crate turns a table of provincial indicators into a scaled feature
//! matrix, groups the provinces with one of four algorithms, and scores
//! and describes the result for the report generators.
//!
//! # Quick Start
//!
//! ```
//! use provclust::prelude::*;
//!
//! let x = Matrix::from_vec(6, 2, vec![
//!     0.0, 0.0,
//!     0.2, 0.1,
//!     0.1, 0.3,
//!     5.0, 5.0,
//!     5.2, 5.1,
//!     5.1, 4.9,
//! ]).expect("six rows of two features");
//!
//! let mut engine = ClusteringEngine::new().with_seed(42);
//! engine.set_data(x).expect("finite data");
//! let labels = engine.fit_kmeans(2, 10).expect("fit").clone();
//! assert_eq!(labels.n_clusters(), 2);
//!
//! let report = engine.evaluate(None).expect("evaluate");
//! assert!(report.silhouette > 0.9);
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Matrix type and distance metrics
//! - [`data`]: Named-column table with missing cells
//! - [`preprocessing`]: Imputation, outliers, selection, scaling and PCA
//! - [`preprocessor`]: Stateful preparation pipeline
//! - [`cluster`]: K-Means, agglomerative, DBSCAN and Gaussian mixture
//! - [`metrics`]: Internal validity indices
//! - [`engine`]: Clustering engine over a prepared matrix
//! - [`config`]: TOML analysis configuration
//! - [`report`]: Artifact export

pub mod cluster;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod prelude;
pub mod preprocessing;
pub mod preprocessor;
pub mod primitives;
pub mod report;
pub mod stats;
pub mod traits;

pub use error::{ClusterError, Result};
pub use primitives::Matrix;
pub use traits::{Transformer, UnsupervisedEstimator};
