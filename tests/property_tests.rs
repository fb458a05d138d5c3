//! Property-based tests using proptest.
//!
//! These tests check contracts that hold for any finite input.

use provclust::cluster::LinkageMatrix;
use provclust::metrics::{calinski_harabasz_score, silhouette_samples};
use provclust::preprocessing::select_by_correlation;
use provclust::prelude::*;
use proptest::prelude::*;

// Strategy for small finite matrices with at least `min_rows` rows
fn matrix_strategy(min_rows: usize, max_rows: usize, cols: usize) -> impl Strategy<Value = Matrix<f64>> {
    (min_rows..=max_rows).prop_flat_map(move |rows| {
        proptest::collection::vec(-100.0f64..100.0, rows * cols)
            .prop_map(move |data| Matrix::from_vec(rows, cols, data).expect("Test data should be valid"))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn kmeans_labels_cover_every_row(x in matrix_strategy(4, 24, 3), k in 1usize..4) {
        let mut engine = ClusteringEngine::new().with_n_init(2);
        engine.set_data(x.clone()).expect("finite data");
        let labels = engine.fit_kmeans(k, 2).expect("fit").clone();

        prop_assert_eq!(labels.len(), x.n_rows());
        prop_assert_eq!(labels.n_noise(), 0);
        let m = labels.n_clusters();
        prop_assert!(m >= 1 && m <= k);
        let expected: std::collections::BTreeSet<Membership> = (0..m).map(Membership::Assigned).collect();
        prop_assert_eq!(labels.distinct(), expected);
    }

    #[test]
    fn hierarchical_cut_yields_exactly_k(x in matrix_strategy(3, 20, 2), k in 1usize..4) {
        let k = k.min(x.n_rows());
        let linkage = ward(&x);
        let labels = linkage.cut_k(k).expect("cut");
        let distinct: std::collections::BTreeSet<usize> = labels.iter().copied().collect();
        prop_assert_eq!(distinct.len(), k);
        prop_assert_eq!(distinct.iter().max().copied(), Some(k - 1));
    }

    #[test]
    fn linkage_heights_are_monotone_for_ward(x in matrix_strategy(2, 20, 3)) {
        let linkage = ward(&x);
        let heights: Vec<f64> = linkage.steps().iter().map(|s| s.distance).collect();
        prop_assert_eq!(heights.len(), x.n_rows() - 1);
        for pair in heights.windows(2) {
            prop_assert!(pair[1] >= pair[0] - 1e-9);
        }
        prop_assert_eq!(linkage.steps().last().map(|s| s.size), Some(x.n_rows()));
    }

    #[test]
    fn silhouette_samples_are_bounded(x in matrix_strategy(4, 20, 2), seed in 0u64..1000) {
        let n = x.n_rows();
        let labels: Vec<usize> = (0..n).map(|i| ((i as u64 + seed) % 3) as usize).collect();
        for s in silhouette_samples(&x, &labels) {
            prop_assert!((-1.0 - 1e-12..=1.0 + 1e-12).contains(&s));
        }
        prop_assert!(calinski_harabasz_score(&x, &labels) >= 0.0);
    }

    #[test]
    fn dbscan_noise_plus_members_is_n(x in matrix_strategy(1, 24, 2), eps in 1.0f64..60.0, min_samples in 1usize..5) {
        let mut engine = ClusteringEngine::new();
        engine.set_data(x.clone()).expect("finite data");
        let labels = engine.fit_dbscan(eps, min_samples).expect("fit").clone();

        let members: usize = labels
            .counts()
            .into_iter()
            .filter(|(label, _)| !label.is_noise())
            .map(|(_, count)| count)
            .sum();
        prop_assert_eq!(members + labels.n_noise(), x.n_rows());
        if min_samples == 1 {
            prop_assert_eq!(labels.n_noise(), 0);
        }
    }

    #[test]
    fn standard_scaling_centers_columns(x in matrix_strategy(3, 20, 3)) {
        let rows: Vec<Vec<f64>> = (0..x.n_rows()).map(|i| x.row(i).to_vec()).collect();
        let columns: Vec<(String, Column)> = (0..x.n_cols())
            .map(|j| (format!("f{j}"), Column::Numeric(rows.iter().map(|r| Some(r[j])).collect())))
            .collect();
        let pre = Preprocessor::from_dataset(Dataset::new(columns).expect("dataset"));
        let (scaled, _) = pre.normalize(NormalizeMethod::Standard, None).expect("normalize");

        for (j, mean) in scaled.column_means().into_iter().enumerate() {
            prop_assert!(mean.abs() < 1e-9);
            let raw = x.column(j);
            let spread = raw.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
                - raw.iter().fold(f64::INFINITY, |a, &b| a.min(b));
            if spread > 1e-3 {
                let col = scaled.column(j);
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
                prop_assert!((var - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn correlation_selection_is_idempotent(
        cells in proptest::collection::vec(proptest::collection::vec(-10.0f64..10.0, 8), 2..6),
        mix in proptest::collection::vec(0.0f64..1.0, 6),
        threshold in 0.3f64..0.99,
    ) {
        // blend each column with the first so some pairs are strongly correlated
        let columns: Vec<(String, Vec<Option<f64>>)> = cells
            .iter()
            .enumerate()
            .map(|(j, col)| {
                let blended = col
                    .iter()
                    .zip(&cells[0])
                    .map(|(v, base)| Some(mix[j] * base + (1.0 - mix[j]) * v))
                    .collect();
                (format!("f{j}"), blended)
            })
            .collect();
        let borrowed: Vec<(&str, &[Option<f64>])> =
            columns.iter().map(|(n, v)| (n.as_str(), v.as_slice())).collect();
        let first = select_by_correlation(&borrowed, threshold).expect("select");

        let kept: Vec<(&str, &[Option<f64>])> = borrowed
            .iter()
            .filter(|(n, _)| first.selected.iter().any(|s| s == n))
            .copied()
            .collect();
        let second = select_by_correlation(&kept, threshold).expect("select");
        prop_assert_eq!(second.selected, first.selected);
    }
}

/// Ward linkage over the rows of `x`.
fn ward(x: &Matrix<f64>) -> LinkageMatrix {
    LinkageMatrix::build(x, Linkage::Ward, DistanceMetric::Euclidean).expect("linkage")
}
