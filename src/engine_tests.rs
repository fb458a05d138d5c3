use super::*;
use crate::data::Column;
use crate::error::ErrorKind;

/// Three tight groups of three rows each.
fn three_groups() -> Matrix<f64> {
    Matrix::from_vec(
        9,
        2,
        vec![
            0.0, 0.0, 0.2, 0.1, 0.1, 0.3, //
            5.0, 5.0, 5.2, 5.1, 5.1, 4.9, //
            0.0, 9.0, 0.3, 9.2, 0.1, 8.8,
        ],
    )
    .expect("valid")
}

fn loaded() -> ClusteringEngine {
    let mut engine = ClusteringEngine::new().with_n_init(3);
    engine.set_data(three_groups()).expect("valid data");
    engine
}

fn provinces() -> Dataset {
    Dataset::new(vec![
        (
            "il_adi".to_string(),
            Column::Categorical((0..9).map(|i| Some(format!("il{i}"))).collect()),
        ),
        (
            "plaka".to_string(),
            Column::Numeric((1..=9).map(|i| Some(f64::from(i))).collect()),
        ),
        (
            "gelir".to_string(),
            Column::Numeric(vec![
                Some(1.0),
                Some(3.0),
                None,
                Some(10.0),
                Some(10.0),
                Some(10.0),
                Some(20.0),
                Some(22.0),
                Some(24.0),
            ]),
        ),
    ])
    .expect("consistent columns")
}

#[test]
fn test_state_machine() {
    let mut engine = ClusteringEngine::new();
    assert_eq!(engine.state(), EngineState::Empty);
    engine.set_data(three_groups()).expect("valid");
    assert_eq!(engine.state(), EngineState::DataLoaded);
    engine.fit_kmeans(3, 2).expect("fit");
    assert_eq!(engine.state(), EngineState::Fitted);
    engine.set_data(three_groups()).expect("valid");
    assert_eq!(engine.state(), EngineState::DataLoaded);
    assert!(engine.current_fit().is_none());
}

#[test]
fn test_operations_need_data() {
    let mut engine = ClusteringEngine::new();
    assert_eq!(engine.fit_kmeans(2, 1).expect_err("empty").kind(), ErrorKind::State);
    assert_eq!(engine.fit_dbscan(0.5, 2).expect_err("empty").kind(), ErrorKind::State);
    assert_eq!(engine.evaluate(None).expect_err("empty").kind(), ErrorKind::State);
    assert_eq!(engine.find_optimal_k(2..=3).expect_err("empty").kind(), ErrorKind::State);
    assert_eq!(engine.project(1).expect_err("empty").kind(), ErrorKind::State);
}

#[test]
fn test_evaluate_without_fit_is_state_error() {
    let engine = loaded();
    assert_eq!(engine.evaluate(None).expect_err("not fitted").kind(), ErrorKind::State);
}

#[test]
fn test_set_data_rejects_empty_and_nan() {
    let mut engine = ClusteringEngine::new();
    assert!(engine.set_data(Matrix::zeros(0, 2)).is_err());
    let nan = Matrix::from_vec(1, 1, vec![f64::NAN]).expect("valid");
    assert_eq!(engine.set_data(nan).expect_err("nan").kind(), ErrorKind::Validation);
}

#[test]
fn test_fit_kmeans_records_centroid_model() {
    let mut engine = loaded();
    let labels = engine.fit_kmeans(3, 5).expect("fit").clone();
    assert_eq!(labels.len(), 9);
    assert_eq!(labels.n_clusters(), 3);

    let fit = engine.current_fit().expect("fitted");
    assert_eq!(fit.centroids().expect("centroid fit").n_rows(), 3);
    assert!(fit.inertia().expect("centroid fit") < 1.0);

    let report = engine.evaluate(None).expect("evaluate");
    assert!(report.silhouette > 0.8);
    assert!(report.inertia.is_some());
}

#[test]
fn test_fit_kmeans_validation() {
    let mut engine = loaded();
    assert_eq!(engine.fit_kmeans(0, 1).expect_err("k=0").kind(), ErrorKind::Validation);
    assert!(engine.fit_kmeans(10, 1).is_err());
    assert!(engine.fit_kmeans(2, 0).is_err());
}

#[test]
fn test_fixed_seed_is_reproducible() {
    let mut a = loaded();
    let mut b = loaded();
    let la = a.fit_kmeans(3, 4).expect("fit").clone();
    let lb = b.fit_kmeans(3, 4).expect("fit").clone();
    assert_eq!(la, lb);
}

#[test]
fn test_fit_hierarchical_ward_override_visible() {
    let mut engine = loaded();
    engine
        .fit_hierarchical(3, Linkage::Ward, DistanceMetric::Cosine)
        .expect("fit");
    match engine.current_fit().expect("fitted").model() {
        FitModel::Hierarchical {
            requested_metric,
            metric,
            metric_overridden,
            ..
        } => {
            assert_eq!(*requested_metric, DistanceMetric::Cosine);
            assert_eq!(*metric, DistanceMetric::Euclidean);
            assert!(*metric_overridden);
        }
        other => panic!("unexpected model {other:?}"),
    }
}

#[test]
fn test_fit_dbscan_with_noise_and_evaluate() {
    let mut data = three_groups().as_slice().to_vec();
    data.extend_from_slice(&[50.0, 50.0]);
    let mut engine = ClusteringEngine::new();
    engine
        .set_data(Matrix::from_vec(10, 2, data).expect("valid"))
        .expect("valid");

    let labels = engine.fit_dbscan(1.0, 2).expect("fit").clone();
    assert_eq!(labels.n_clusters(), 3);
    assert_eq!(labels.get(9), Some(Membership::Noise));

    let report = engine.evaluate(None).expect("evaluate");
    assert_eq!(report.n_noise, 1);
    assert_eq!(report.n_clusters, 3);
    assert!(report.inertia.is_none());
}

#[test]
fn test_fit_dbscan_validation() {
    let mut engine = loaded();
    assert_eq!(engine.fit_dbscan(0.0, 2).expect_err("eps").kind(), ErrorKind::Validation);
    assert_eq!(engine.fit_dbscan(0.5, 0).expect_err("min").kind(), ErrorKind::Validation);
}

#[test]
fn test_all_noise_is_degenerate() {
    let mut engine = loaded();
    engine.fit_dbscan(0.01, 2).expect("fit");
    let report = engine.evaluate(None).expect("evaluate");
    assert_eq!(report.silhouette, 0.0);
    assert_eq!(report.calinski_harabasz, 0.0);
    assert!(report.davies_bouldin.is_infinite());
}

#[test]
fn test_fit_gaussian_mixture() {
    let mut engine = loaded();
    let labels = engine.fit_gaussian_mixture(3, 2).expect("fit").clone();
    assert_eq!(labels.len(), 9);
    let fit = engine.current_fit().expect("fitted");
    assert!(fit.centroids().is_some());
    assert!(fit.inertia().is_none());
    match fit.model() {
        FitModel::Mixture { weights, log_likelihood, .. } => {
            assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(log_likelihood.is_finite());
        }
        other => panic!("unexpected model {other:?}"),
    }
}

#[test]
fn test_find_optimal_k() {
    let engine = loaded();
    let table = engine.find_optimal_k(2..=5).expect("search");
    assert_eq!(table.rows().len(), 4);
    assert_eq!(table.rows()[0].k, 2);
    assert_eq!(table.recommended(QualityMetric::Silhouette), Some(3));
    assert_eq!(table.recommendations().len(), 3);
    // Searching does not fit.
    assert_eq!(engine.state(), EngineState::DataLoaded);
}

#[test]
fn test_find_optimal_k_range_validation() {
    let engine = loaded();
    assert!(engine.find_optimal_k(1..=3).is_err());
    assert!(engine.find_optimal_k(2..=10).is_err());
    #[allow(clippy::reversed_empty_ranges)]
    let empty = 5..=3;
    assert_eq!(engine.find_optimal_k(empty).expect_err("empty").kind(), ErrorKind::Validation);
}

#[test]
fn test_recommended_ties_pick_smallest_k() {
    let row = |k| OptimalKRow {
        k,
        inertia: 1.0,
        silhouette: 0.5,
        calinski_harabasz: 2.0,
        davies_bouldin: 0.7,
    };
    let table = OptimalKTable {
        rows: vec![row(2), row(3), row(4)],
    };
    for metric in QualityMetric::ALL {
        assert_eq!(table.recommended(metric), Some(2));
    }
}

#[test]
fn test_cut_dendrogram() {
    let mut engine = loaded();
    let matrix = engine.linkage_matrix(Linkage::Average).expect("linkage");
    assert_eq!(matrix.steps().len(), 8);

    for k in 1..=9 {
        let labels = engine.cut_dendrogram(&matrix, Some(k), None).expect("cut");
        assert_eq!(labels.n_clusters(), k);
        assert_eq!(labels.get(0), Some(Membership::Assigned(0)));
    }
    assert!(matches!(
        engine.current_fit().expect("fitted").model(),
        FitModel::Hierarchical { .. }
    ));

    let by_height = engine.cut_dendrogram(&matrix, None, Some(1.0)).expect("cut");
    assert_eq!(by_height.n_clusters(), 3);
}

#[test]
fn test_hierarchical_fit_keeps_its_own_merge_history() {
    let mut engine = loaded();
    engine
        .fit_hierarchical(3, Linkage::Average, DistanceMetric::Manhattan)
        .expect("fit");
    let fit = engine.current_fit().expect("fitted");

    let expected =
        LinkageMatrix::build(&three_groups(), Linkage::Average, DistanceMetric::Manhattan).expect("linkage");
    assert_eq!(fit.linkage_matrix(), Some(&expected));

    engine.fit_kmeans(3, 2).expect("fit");
    assert!(engine.current_fit().expect("fitted").linkage_matrix().is_none());
}

#[test]
fn test_cut_dendrogram_needs_exactly_one_criterion() {
    let mut engine = loaded();
    let matrix = engine.linkage_matrix(Linkage::Ward).expect("linkage");
    let both = engine.cut_dendrogram(&matrix, Some(2), Some(1.0));
    assert_eq!(both.expect_err("both").kind(), ErrorKind::Validation);
    let neither = engine.cut_dendrogram(&matrix, None, None);
    assert_eq!(neither.expect_err("neither").kind(), ErrorKind::Validation);
}

#[test]
fn test_evaluate_explicit_labels_length() {
    let engine = loaded();
    let short = ClusterAssignment::from_labels(&[0, 1]);
    assert_eq!(engine.evaluate(Some(&short)).expect_err("short").kind(), ErrorKind::Validation);

    let labels = ClusterAssignment::from_labels(&[0, 0, 0, 1, 1, 1, 2, 2, 2]);
    let report = engine.evaluate(Some(&labels)).expect("explicit labels");
    assert!(report.inertia.is_none());
    assert_eq!(report.per_cluster_silhouette.len(), 3);
}

#[test]
fn test_cluster_profiles_noise_first_and_skip_missing() {
    let engine = ClusteringEngine::new();
    let labels = ClusterAssignment::from_raw(&[0, 0, 0, 1, 1, 1, -1, 2, 2]).expect("valid");
    let profiles = engine
        .cluster_profiles(&provinces(), &["gelir".to_string()], Some(&labels))
        .expect("profiles");

    assert_eq!(profiles.len(), 4);
    assert_eq!(profiles[0].label, Membership::Noise);
    assert_eq!(profiles[0].size, 1);
    // Row 2 is missing, so cluster 0 averages 1 and 3.
    assert_eq!(profiles[1].means[0], ("gelir".to_string(), Some(2.0)));
    assert_eq!(profiles[3].means[0].1, Some(23.0));
}

#[test]
fn test_cluster_profiles_rejects_text_feature() {
    let engine = ClusteringEngine::new();
    let labels = ClusterAssignment::from_labels(&[0; 9]);
    let err = engine
        .cluster_profiles(&provinces(), &["il_adi".to_string()], Some(&labels))
        .expect_err("text column");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_cluster_members() {
    let engine = ClusteringEngine::new();
    let labels = ClusterAssignment::from_raw(&[1, 1, 0, 0, -1, 0, 1, 1, 1]).expect("valid");
    let members = engine
        .cluster_members(&provinces(), Some(&labels), "il_adi")
        .expect("members");
    let keys: Vec<i64> = members.keys().map(|m| m.to_raw()).collect();
    assert_eq!(keys, vec![-1, 0, 1]);
    assert_eq!(members[&Membership::Assigned(0)], vec!["il2", "il3", "il5"]);

    let plates = engine
        .cluster_members(&provinces(), Some(&labels), "plaka")
        .expect("members");
    assert_eq!(plates[&Membership::Noise], vec!["5"]);

    assert!(engine.cluster_members(&provinces(), Some(&labels), "nope").is_err());
}

#[test]
fn test_compare_pipelines_keeps_current_fit() {
    let mut engine = loaded();
    engine.fit_dbscan(1.0, 2).expect("fit");
    let before = engine.current_fit().cloned();

    let rows = engine.compare_pipelines(3).expect("compare");
    let methods: Vec<&str> = rows.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, vec!["kmeans", "hierarchical_ward", "hierarchical_complete", "gmm"]);
    assert!(rows.iter().all(|r| r.scores.silhouette > 0.5));
    assert_eq!(engine.current_fit().cloned(), before);
}

#[test]
fn test_project() {
    let engine = loaded();
    let projection = engine.project(2).expect("project");
    assert_eq!(projection.coordinates.shape(), (9, 2));
    let total: f64 = projection.explained_variance_ratio.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_cluster_distribution() {
    let mut engine = loaded();
    engine.fit_kmeans(3, 3).expect("fit");
    let shares = engine.cluster_distribution(None).expect("distribution");
    assert_eq!(shares.len(), 3);
    assert!(shares.iter().all(|s| s.count == 3));
    let total: f64 = shares.iter().map(|s| s.percentage).sum();
    assert!((total - 100.0).abs() < 1e-9);
}
