//! Artifact export for the downstream figure and document generators.
//!
//! An [`ArtifactBundle`] collects whatever a run produced and writes one
//! file per artifact. Artifacts left as `None` produce no file. Labels are
//! written as raw integers with `-1` for noise.

use crate::cluster::{ClusterAssignment, LinkageMatrix, Membership};
use crate::config::ReportConfig;
use crate::engine::{ClusterProfile, ClusterShare, ComparisonRow, OptimalKTable};
use crate::error::Result;
use crate::metrics::EvaluationReport;
use crate::preprocessing::Projection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const LABELS_FILE: &str = "labels.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const PROFILES_FILE: &str = "profiles.csv";
pub const MEMBERS_FILE: &str = "members.json";
pub const DISTRIBUTION_FILE: &str = "distribution.json";
pub const LINKAGE_FILE: &str = "linkage.json";
pub const PROJECTION_FILE: &str = "projection.json";
pub const OPTIMAL_K_FILE: &str = "optimal_k.json";
pub const COMPARISON_FILE: &str = "comparison.json";
pub const SETTINGS_FILE: &str = "report_settings.json";

/// Member names of one cluster as written to [`MEMBERS_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberList {
    pub label: Membership,
    pub members: Vec<String>,
}

/// Outputs of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct ArtifactBundle {
    pub labels: Option<ClusterAssignment>,
    pub metrics: Option<EvaluationReport>,
    pub profiles: Option<Vec<ClusterProfile>>,
    pub members: Option<BTreeMap<Membership, Vec<String>>>,
    pub distribution: Option<Vec<ClusterShare>>,
    pub linkage: Option<LinkageMatrix>,
    pub projection: Option<Projection>,
    pub optimal_k: Option<OptimalKTable>,
    pub comparison: Option<Vec<ComparisonRow>>,
    pub settings: Option<ReportConfig>,
}

impl ArtifactBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes every present artifact into `dir`, creating it if needed.
    ///
    /// Returns the paths written, in a fixed order.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or a file cannot be written.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        if let Some(labels) = &self.labels {
            written.push(write_json(dir, LABELS_FILE, &labels.to_raw())?);
        }
        if let Some(metrics) = &self.metrics {
            written.push(write_json(dir, METRICS_FILE, &metrics.to_map())?);
        }
        if let Some(profiles) = &self.profiles {
            written.push(write_profiles(dir, profiles)?);
        }
        if let Some(members) = &self.members {
            let lists: Vec<MemberList> = members
                .iter()
                .map(|(label, members)| MemberList {
                    label: *label,
                    members: members.clone(),
                })
                .collect();
            written.push(write_json(dir, MEMBERS_FILE, &lists)?);
        }
        if let Some(distribution) = &self.distribution {
            written.push(write_json(dir, DISTRIBUTION_FILE, distribution)?);
        }
        if let Some(linkage) = &self.linkage {
            written.push(write_json(dir, LINKAGE_FILE, linkage)?);
        }
        if let Some(projection) = &self.projection {
            written.push(write_json(dir, PROJECTION_FILE, projection)?);
        }
        if let Some(optimal_k) = &self.optimal_k {
            written.push(write_json(dir, OPTIMAL_K_FILE, optimal_k)?);
        }
        if let Some(comparison) = &self.comparison {
            written.push(write_json(dir, COMPARISON_FILE, comparison)?);
        }
        if let Some(settings) = &self.settings {
            written.push(write_json(dir, SETTINGS_FILE, settings)?);
        }

        info!(dir = %dir.display(), files = written.len(), "artifacts written");
        Ok(written)
    }
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let path = dir.join(name);
    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(writer, value)?;
    debug!(path = %path.display(), "wrote artifact");
    Ok(path)
}

/// One row per cluster: label, size, then the feature means. Missing
/// means are left empty.
fn write_profiles(dir: &Path, profiles: &[ClusterProfile]) -> Result<PathBuf> {
    let path = dir.join(PROFILES_FILE);
    let mut writer = csv::Writer::from_path(&path)?;

    let features: Vec<&str> = profiles
        .first()
        .map(|p| p.means.iter().map(|(name, _)| name.as_str()).collect())
        .unwrap_or_default();
    let mut header = vec!["label", "size"];
    header.extend(features.iter().copied());
    writer.write_record(&header)?;

    for profile in profiles {
        let mut record = vec![profile.label.to_raw().to_string(), profile.size.to_string()];
        record.extend(
            profile
                .means
                .iter()
                .map(|(_, mean)| mean.map(|m| m.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), "wrote artifact");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Matrix;

    fn labels() -> ClusterAssignment {
        ClusterAssignment::new(vec![
            Membership::Assigned(0),
            Membership::Assigned(0),
            Membership::Noise,
            Membership::Assigned(1),
        ])
    }

    #[test]
    fn test_empty_bundle_writes_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let written = ArtifactBundle::new().write_to(dir.path()).expect("write");
        assert!(written.is_empty());
        assert_eq!(fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn test_labels_written_raw() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bundle = ArtifactBundle {
            labels: Some(labels()),
            ..ArtifactBundle::default()
        };
        bundle.write_to(dir.path()).expect("write");

        let text = fs::read_to_string(dir.path().join(LABELS_FILE)).expect("read");
        let raw: Vec<i64> = serde_json::from_str(&text).expect("json");
        assert_eq!(raw, vec![0, 0, -1, 1]);
    }

    #[test]
    fn test_members_keep_label_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut members = BTreeMap::new();
        members.insert(Membership::Assigned(1), vec!["Van".to_string()]);
        members.insert(Membership::Noise, vec!["Hakkari".to_string()]);
        members.insert(Membership::Assigned(0), vec!["Ankara".to_string(), "Izmir".to_string()]);
        let bundle = ArtifactBundle {
            members: Some(members),
            ..ArtifactBundle::default()
        };
        bundle.write_to(dir.path()).expect("write");

        let text = fs::read_to_string(dir.path().join(MEMBERS_FILE)).expect("read");
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        let order: Vec<i64> = json
            .as_array()
            .expect("array")
            .iter()
            .map(|entry| entry["label"].as_i64().expect("label"))
            .collect();
        assert_eq!(order, vec![-1, 0, 1]);
        assert_eq!(json[1]["members"][1], "Izmir");
    }

    #[test]
    fn test_profiles_csv_layout() {
        let dir = tempfile::tempdir().expect("temp dir");
        let profiles = vec![
            ClusterProfile {
                label: Membership::Assigned(0),
                size: 2,
                means: vec![("gelir".to_string(), Some(1.5)), ("okul".to_string(), None)],
            },
            ClusterProfile {
                label: Membership::Noise,
                size: 1,
                means: vec![("gelir".to_string(), Some(4.0)), ("okul".to_string(), Some(2.0))],
            },
        ];
        let bundle = ArtifactBundle {
            profiles: Some(profiles),
            ..ArtifactBundle::default()
        };
        bundle.write_to(dir.path()).expect("write");

        let text = fs::read_to_string(dir.path().join(PROFILES_FILE)).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["label,size,gelir,okul", "0,2,1.5,", "-1,1,4,2"]);
    }

    #[test]
    fn test_metrics_and_settings_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let data = Matrix::from_vec(4, 1, vec![0.0, 1.0, 5.0, 6.0]).expect("valid");
        let bundle = ArtifactBundle {
            metrics: Some(EvaluationReport::compute(&data, &[0, 0, 1, 1], 0, None)),
            settings: Some(ReportConfig::default()),
            ..ArtifactBundle::default()
        };
        let written = bundle.write_to(dir.path().join("nested")).expect("write");
        assert_eq!(written.len(), 2);

        let text = fs::read_to_string(&written[0]).expect("read");
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert!(json["silhouette_score"].as_f64().expect("number") > 0.5);
        assert!(json.get("inertia").is_none());

        let text = fs::read_to_string(&written[1]).expect("read");
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json["palette"][0], "#d73027");
    }
}
