use super::*;

fn two_pairs() -> Matrix<f64> {
    // Two tight pairs four units apart on a line.
    Matrix::from_vec(4, 1, vec![0.0, 1.0, 5.0, 6.0]).expect("valid")
}

#[test]
fn test_inertia_against_own_centroids() {
    let centroids = Matrix::from_vec(2, 1, vec![0.5, 5.5]).expect("valid");
    let value = inertia(&two_pairs(), &centroids, &[0, 0, 1, 1]);
    assert!((value - 1.0).abs() < 1e-12);
}

#[test]
fn test_silhouette_samples_by_hand() {
    let samples = silhouette_samples(&two_pairs(), &[0, 0, 1, 1]);
    // Point 0: a = 1, b = (5 + 6) / 2 = 5.5
    assert!((samples[0] - 4.5 / 5.5).abs() < 1e-12);
    // Point 1: a = 1, b = (4 + 5) / 2 = 4.5
    assert!((samples[1] - 3.5 / 4.5).abs() < 1e-12);
}

#[test]
fn test_singleton_scores_zero() {
    let samples = silhouette_samples(&two_pairs(), &[0, 0, 0, 1]);
    assert_eq!(samples[3], 0.0);
}

#[test]
fn test_single_cluster_is_degenerate() {
    let data = two_pairs();
    assert_eq!(silhouette_score(&data, &[0, 0, 0, 0]), 0.0);
    assert_eq!(calinski_harabasz_score(&data, &[0, 0, 0, 0]), 0.0);
    assert!(davies_bouldin_score(&data, &[0, 0, 0, 0]).is_infinite());
    assert_eq!(QualityScores::compute(&data, &[3, 3, 3, 3]), QualityScores::DEGENERATE);
}

#[test]
fn test_labels_need_not_be_contiguous() {
    let data = two_pairs();
    let a = QualityScores::compute(&data, &[0, 0, 1, 1]);
    let b = QualityScores::compute(&data, &[7, 7, 2, 2]);
    assert_eq!(a, b);
}

#[test]
fn test_calinski_harabasz_by_hand() {
    // B = 2 * 2.5^2 * 2 = 25, W = 4 * 0.25 = 1, CH = 25 * 2 / (1 * 1)
    let ch = calinski_harabasz_score(&two_pairs(), &[0, 0, 1, 1]);
    assert!((ch - 50.0).abs() < 1e-9);
}

#[test]
fn test_calinski_harabasz_zero_within() {
    let data = Matrix::from_vec(4, 1, vec![0.0, 0.0, 3.0, 3.0]).expect("valid");
    assert_eq!(calinski_harabasz_score(&data, &[0, 0, 1, 1]), 1.0);
}

#[test]
fn test_davies_bouldin_by_hand() {
    // s = 0.5 each, centroid distance 5, so (0.5 + 0.5) / 5
    let db = davies_bouldin_score(&two_pairs(), &[0, 0, 1, 1]);
    assert!((db - 0.2).abs() < 1e-12);
}

#[test]
fn test_davies_bouldin_point_clusters() {
    let data = Matrix::from_vec(2, 1, vec![0.0, 4.0]).expect("valid");
    assert_eq!(davies_bouldin_score(&data, &[0, 1]), 0.0);
}

#[test]
fn test_better_clustering_scores_better() {
    let data = two_pairs();
    let good = QualityScores::compute(&data, &[0, 0, 1, 1]);
    let bad = QualityScores::compute(&data, &[0, 1, 0, 1]);
    for metric in QualityMetric::ALL {
        assert!(metric.is_better(good.get(metric), bad.get(metric)), "{metric}");
    }
}

#[test]
fn test_report_map_keys() {
    let report = EvaluationReport::compute(&two_pairs(), &[0, 0, 1, 1], 0, Some(1.0));
    let map = report.to_map();
    for key in [
        "silhouette_score",
        "calinski_harabasz",
        "davies_bouldin",
        "cluster_0_silhouette",
        "cluster_1_silhouette",
        "inertia",
    ] {
        assert!(map.contains_key(key), "missing {key}");
    }
    assert_eq!(report.n_clusters, 2);
}

#[test]
fn test_report_non_finite_serializes_as_null() {
    let report = EvaluationReport::compute(&two_pairs(), &[0, 0, 0, 0], 0, None);
    let json = serde_json::to_value(&report).expect("serialize");
    assert!(json["davies_bouldin"].is_null());
    assert_eq!(report.per_cluster_silhouette.get(&0), Some(&0.0));
}

#[test]
fn test_quality_metric_parse() {
    assert_eq!("db".parse::<QualityMetric>().ok(), Some(QualityMetric::DaviesBouldin));
    assert!("inertia".parse::<QualityMetric>().is_err());
}
