//! Tests for K-Means.

use super::*;
use crate::error::ErrorKind;

fn sample_data() -> Matrix<f64> {
    // Two well-separated clusters
    Matrix::from_vec(
        6,
        2,
        vec![1.0, 2.0, 1.5, 1.8, 1.0, 0.6, 8.0, 8.0, 9.0, 11.0, 8.5, 9.0],
    )
    .expect("Sample data matrix creation should succeed")
}

#[test]
fn test_new() {
    let kmeans = KMeans::new(3);
    assert_eq!(kmeans.n_clusters(), 3);
    assert!(!kmeans.is_fitted());
}

#[test]
fn test_fit_basic() {
    let mut kmeans = KMeans::new(2).with_random_state(42);
    kmeans.fit(&sample_data()).expect("KMeans fit should succeed");

    assert!(kmeans.is_fitted());
    assert_eq!(kmeans.centroids().expect("fitted").shape(), (2, 2));
    assert!(kmeans.inertia() >= 0.0);
    assert!(kmeans.n_iter() >= 1);
}

#[test]
fn test_separates_obvious_groups() {
    let mut kmeans = KMeans::new(2).with_random_state(1);
    kmeans.fit(&sample_data()).expect("fit");
    let labels = kmeans.labels().expect("fitted");
    assert_eq!(labels[0], labels[1]);
    assert_eq!(labels[1], labels[2]);
    assert_eq!(labels[3], labels[4]);
    assert_eq!(labels[4], labels[5]);
    assert_ne!(labels[0], labels[3]);
}

#[test]
fn test_predict_matches_training_labels() {
    let data = sample_data();
    let mut kmeans = KMeans::new(2).with_random_state(3);
    kmeans.fit(&data).expect("fit");
    let predicted = kmeans.predict(&data).expect("fitted");
    assert_eq!(predicted.as_slice(), kmeans.labels().expect("fitted"));
}

#[test]
fn test_same_seed_same_labels() {
    let data = sample_data();
    let mut a = KMeans::new(3).with_random_state(11);
    let mut b = KMeans::new(3).with_random_state(11);
    a.fit(&data).expect("fit");
    b.fit(&data).expect("fit");
    assert_eq!(a.labels(), b.labels());
    assert_eq!(a.inertia(), b.inertia());
}

#[test]
fn test_k_equals_n_has_zero_inertia() {
    let data = sample_data();
    let mut kmeans = KMeans::new(6).with_random_state(0);
    kmeans.fit(&data).expect("fit");
    assert!(kmeans.inertia().abs() < 1e-12);
    let mut labels = kmeans.labels().expect("fitted").to_vec();
    labels.sort_unstable();
    assert_eq!(labels, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_duplicate_points_compact_labels() {
    // Only two distinct points, so at most two clusters can be non-empty.
    let data = Matrix::from_vec(4, 1, vec![0.0, 0.0, 5.0, 5.0]).expect("valid");
    let mut kmeans = KMeans::new(3).with_random_state(5).with_n_init(2);
    kmeans.fit(&data).expect("fit");
    let labels = kmeans.labels().expect("fitted");
    let max = labels.iter().copied().max().expect("non-empty");
    assert_eq!(kmeans.centroids().expect("fitted").n_rows(), max + 1);
    for k in 0..=max {
        assert!(labels.contains(&k));
    }
}

#[test]
fn test_invalid_parameters() {
    let data = sample_data();
    let err = KMeans::new(0).fit(&data).expect_err("k = 0");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(KMeans::new(7).fit(&data).is_err());
    assert!(KMeans::new(2).with_n_init(0).fit(&data).is_err());
    assert!(KMeans::new(1).fit(&Matrix::zeros(0, 2)).is_err());
}

#[test]
fn test_predict_before_fit() {
    let err = KMeans::new(2).predict(&sample_data()).expect_err("not fitted");
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_more_restarts_never_worse() {
    let data = Matrix::from_vec(
        8,
        1,
        vec![0.0, 0.2, 0.4, 5.0, 5.1, 9.0, 9.3, 9.9],
    )
    .expect("valid");
    let mut one = KMeans::new(3).with_random_state(9).with_n_init(1);
    let mut many = KMeans::new(3).with_random_state(9).with_n_init(10);
    one.fit(&data).expect("fit");
    many.fit(&data).expect("fit");
    // The first restart of both runs is identical, so more restarts only improve.
    assert!(many.inertia() <= one.inertia() + 1e-12);
}
