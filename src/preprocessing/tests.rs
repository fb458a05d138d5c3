//! Tests for preprocessing module.

use super::*;

fn two_columns() -> Matrix<f64> {
    Matrix::from_vec(3, 2, vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0]).expect("valid matrix dimensions")
}

#[test]
fn test_new() {
    let scaler = StandardScaler::new();
    assert!(!scaler.is_fitted());
}

#[test]
fn test_fit_basic() {
    let mut scaler = StandardScaler::new();
    scaler
        .fit(&two_columns())
        .expect("fit should succeed with valid data");

    assert!(scaler.is_fitted());

    let mean = scaler.mean().expect("fitted");
    assert!((mean[0] - 2.0).abs() < 1e-12);
    assert!((mean[1] - 20.0).abs() < 1e-12);

    // Population std is sqrt(2/3)
    let scale = scaler.scale().expect("fitted");
    let expected_std = (2.0_f64 / 3.0).sqrt();
    assert!((scale[0] - expected_std).abs() < 1e-12);
    assert!((scale[1] - expected_std * 10.0).abs() < 1e-12);
}

#[test]
fn test_standard_zero_mean_unit_variance() {
    let mut scaler = StandardScaler::new();
    let scaled = scaler.fit_transform(&two_columns()).expect("fit_transform");
    for j in 0..2 {
        let col = scaled.column(j);
        let mean = col.iter().sum::<f64>() / 3.0;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_standard_constant_column_scales_by_one() {
    let data = Matrix::from_vec(3, 1, vec![5.0, 5.0, 5.0]).expect("valid");
    let mut scaler = StandardScaler::new();
    let scaled = scaler.fit_transform(&data).expect("fit_transform");
    assert!(scaled.as_slice().iter().all(|v| v.abs() < 1e-12));
    assert_eq!(scaler.scale().expect("fitted"), &[1.0]);
}

#[test]
fn test_transform_not_fitted() {
    let scaler = StandardScaler::new();
    let err = scaler.transform(&two_columns()).expect_err("not fitted");
    assert_eq!(err.kind(), crate::error::ErrorKind::State);
}

#[test]
fn test_transform_dimension_mismatch() {
    let mut scaler = StandardScaler::new();
    scaler.fit(&two_columns()).expect("fit");
    let narrow = Matrix::from_vec(2, 1, vec![1.0, 2.0]).expect("valid");
    assert!(scaler.transform(&narrow).is_err());
}

#[test]
fn test_fit_empty() {
    let empty = Matrix::zeros(0, 2);
    assert!(StandardScaler::new().fit(&empty).is_err());
    assert!(MinMaxScaler::new().fit(&empty).is_err());
    assert!(RobustScaler::new().fit(&empty).is_err());
}

#[test]
fn test_minmax_range() {
    let data = Matrix::from_vec(3, 2, vec![0.0, 0.0, 5.0, 10.0, 10.0, 20.0]).expect("valid");
    let mut scaler = MinMaxScaler::new();
    let scaled = scaler.fit_transform(&data).expect("fit_transform");
    assert!((scaled.get(0, 0) - 0.0).abs() < 1e-12);
    assert!((scaled.get(1, 0) - 0.5).abs() < 1e-12);
    assert!((scaled.get(2, 1) - 1.0).abs() < 1e-12);
    assert_eq!(scaler.data_min().expect("fitted"), &[0.0, 0.0]);
}

#[test]
fn test_minmax_constant_column() {
    let data = Matrix::from_vec(2, 1, vec![3.0, 3.0]).expect("valid");
    let scaled = MinMaxScaler::new().fit_transform(&data).expect("fit_transform");
    assert_eq!(scaled.as_slice(), &[0.0, 0.0]);
}

#[test]
fn test_robust_uses_median_and_iqr() {
    let data = Matrix::from_vec(5, 1, vec![1.0, 2.0, 3.0, 4.0, 100.0]).expect("valid");
    let mut scaler = RobustScaler::new();
    let scaled = scaler.fit_transform(&data).expect("fit_transform");
    assert_eq!(scaler.center().expect("fitted"), &[3.0]);
    // IQR = 4 - 2
    assert!((scaled.get(0, 0) + 1.0).abs() < 1e-12);
    assert!((scaled.get(4, 0) - 48.5).abs() < 1e-12);
}

#[test]
fn test_normalize_method_parse() {
    assert_eq!("MinMax".parse::<NormalizeMethod>().ok(), Some(NormalizeMethod::MinMax));
    assert_eq!("robust".parse::<NormalizeMethod>().ok(), Some(NormalizeMethod::Robust));
    let err = "zscore".parse::<NormalizeMethod>().expect_err("unknown");
    assert!(err.to_string().contains("'zscore'"));
    assert_eq!(NormalizeMethod::MinMax.to_string(), "minmax");
}

#[test]
fn test_scaler_state_replays() {
    let features = vec!["a".to_string(), "b".to_string()];
    let state = ScalerState::fit(NormalizeMethod::Standard, features, &two_columns()).expect("fit");
    assert_eq!(state.method(), NormalizeMethod::Standard);
    assert_eq!(state.features(), &["a".to_string(), "b".to_string()]);

    let new_rows = Matrix::from_vec(1, 2, vec![2.0, 20.0]).expect("valid");
    let out = state.transform(&new_rows).expect("transform");
    assert!(out.get(0, 0).abs() < 1e-12);
    assert!(out.get(0, 1).abs() < 1e-12);
}

#[test]
fn test_scaler_state_width_mismatch() {
    let features = vec!["a".to_string()];
    assert!(ScalerState::fit(NormalizeMethod::MinMax, features, &two_columns()).is_err());
}
