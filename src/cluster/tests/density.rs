//! Tests for DBSCAN.

use super::*;

fn blobs_with_outlier() -> Matrix<f64> {
    Matrix::from_vec(
        7,
        2,
        vec![1.0, 1.0, 1.2, 1.1, 1.1, 1.2, 5.0, 5.0, 5.1, 5.2, 5.2, 5.1, 10.0, 10.0],
    )
    .expect("valid")
}

#[test]
fn test_two_clusters_and_noise() {
    let mut dbscan = DBSCAN::new(0.5, 2);
    dbscan.fit(&blobs_with_outlier()).expect("fit");
    let labels = dbscan.labels().expect("fitted");
    assert_eq!(labels.to_raw(), vec![0, 0, 0, 1, 1, 1, -1]);
    assert_eq!(dbscan.n_clusters(), 2);
    assert_eq!(labels.n_noise(), 1);
}

#[test]
fn test_neighborhood_counts_the_point_itself() {
    // Each point has exactly one other point within eps, so two neighbors in total.
    let data = Matrix::from_vec(2, 1, vec![0.0, 0.4]).expect("valid");
    let mut dbscan = DBSCAN::new(0.5, 2);
    dbscan.fit(&data).expect("fit");
    assert_eq!(dbscan.labels().expect("fitted").to_raw(), vec![0, 0]);

    let mut strict = DBSCAN::new(0.5, 3);
    strict.fit(&data).expect("fit");
    assert_eq!(strict.labels().expect("fitted").to_raw(), vec![-1, -1]);
}

#[test]
fn test_min_samples_one_has_no_noise() {
    let mut dbscan = DBSCAN::new(0.1, 1);
    dbscan.fit(&blobs_with_outlier()).expect("fit");
    assert_eq!(dbscan.labels().expect("fitted").n_noise(), 0);
}

#[test]
fn test_min_samples_above_row_count_is_all_noise() {
    // eps covers every row, but no neighborhood can reach n + 1
    let data = blobs_with_outlier();
    let mut dbscan = DBSCAN::new(100.0, data.n_rows() + 1);
    dbscan.fit(&data).expect("fit");

    let labels = dbscan.labels().expect("fitted");
    assert_eq!(labels.to_raw(), vec![-1; data.n_rows()]);
    assert_eq!(dbscan.n_clusters(), 0);
}

#[test]
fn test_border_point_joins_cluster() {
    // Only 0.3 and 0.6 are core; 0.0 and 0.9 are border points.
    let data = Matrix::from_vec(5, 1, vec![0.0, 0.3, 0.6, 0.9, 5.0]).expect("valid");
    let mut dbscan = DBSCAN::new(0.35, 3);
    dbscan.fit(&data).expect("fit");
    assert_eq!(dbscan.labels().expect("fitted").to_raw(), vec![0, 0, 0, 0, -1]);
}

#[test]
fn test_invalid_parameters() {
    let data = blobs_with_outlier();
    assert!(DBSCAN::new(0.0, 2).fit(&data).is_err());
    assert!(DBSCAN::new(-1.0, 2).fit(&data).is_err());
    assert!(DBSCAN::new(0.5, 0).fit(&data).is_err());
}

#[test]
fn test_predict_uses_core_samples() {
    let mut dbscan = DBSCAN::new(0.5, 2);
    dbscan.fit(&blobs_with_outlier()).expect("fit");
    let new = Matrix::from_vec(3, 2, vec![1.05, 1.05, 5.1, 5.1, 20.0, 20.0]).expect("valid");
    assert_eq!(dbscan.predict(&new).expect("fitted").to_raw(), vec![0, 1, -1]);
}
