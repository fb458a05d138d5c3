//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use provclust::prelude::*;
//! ```

pub use crate::cluster::{
    AgglomerativeClustering, Algorithm, ClusterAssignment, GaussianMixture, KMeans, Linkage, Membership, DBSCAN,
};
pub use crate::config::AnalysisConfig;
pub use crate::data::{Column, Dataset};
pub use crate::engine::ClusteringEngine;
pub use crate::error::{ClusterError, Result};
pub use crate::metrics::{silhouette_score, EvaluationReport, QualityMetric};
pub use crate::preprocessing::{ImputeMethod, NormalizeMethod, OutlierAction, OutlierMethod};
pub use crate::preprocessor::Preprocessor;
pub use crate::primitives::{DistanceMetric, Matrix};
pub use crate::report::ArtifactBundle;
pub use crate::traits::{Transformer, UnsupervisedEstimator};
