//! provclust CLI: prepare provincial indicators, cluster them and export
//! the artifacts the report generators read.

use clap::{Parser, Subcommand};
use colored::Colorize;
use provclust::cluster::Algorithm;
use provclust::config::AnalysisConfig;
use provclust::engine::{ClusteringEngine, OptimalKTable};
use provclust::error::{ClusterError, ErrorKind, Result};
use provclust::metrics::QualityMetric;
use provclust::preprocessor::{PreparedData, Preprocessor};
use provclust::report::ArtifactBundle;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "provclust")]
#[command(about = "Socio-economic clustering of provinces")]
#[command(version)]
struct Cli {
    /// Analysis configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print shape and missing values of an input table
    Summary {
        /// Input CSV file
        input: PathBuf,
    },

    /// Score a range of K values with K-Means
    OptimalK {
        /// Input CSV file
        input: PathBuf,

        /// Smallest K (overrides config)
        #[arg(long)]
        k_min: Option<usize>,

        /// Largest K (overrides config)
        #[arg(long)]
        k_max: Option<usize>,

        /// Artifact directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cluster the provinces and export every artifact
    Run {
        /// Input CSV file
        input: PathBuf,

        /// Algorithm (overrides config)
        #[arg(short, long)]
        algorithm: Option<Algorithm>,

        /// Number of clusters (overrides config)
        #[arg(short = 'k', long)]
        n_clusters: Option<usize>,

        /// Artifact directory
        #[arg(short, long, default_value = "reports/output")]
        output: PathBuf,
    },

    /// Score K-Means, Ward, complete linkage and GMM at one K
    Compare {
        /// Input CSV file
        input: PathBuf,

        /// Number of clusters (overrides config)
        #[arg(short = 'k', long)]
        n_clusters: Option<usize>,

        /// Artifact directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Summary { input } => cmd_summary(&config, &input),
        Commands::OptimalK {
            input,
            k_min,
            k_max,
            output,
        } => cmd_optimal_k(&config, &input, k_min, k_max, output.as_deref()),
        Commands::Run {
            input,
            algorithm,
            n_clusters,
            output,
        } => cmd_run(&config, &input, algorithm, n_clusters, &output),
        Commands::Compare {
            input,
            n_clusters,
            output,
        } => cmd_compare(&config, &input, n_clusters, output.as_deref()),
    });

    if let Err(e) = result {
        eprintln!("{} {e}", "[ERROR]".red().bold());
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(err: &ClusterError) -> i32 {
    match err.kind() {
        ErrorKind::Validation => 2,
        ErrorKind::Io => 3,
        ErrorKind::State => 4,
        ErrorKind::Internal => 1,
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path),
        None => Ok(AnalysisConfig::default()),
    }
}

fn section(title: &str) {
    println!("\n{}", format!("=== {title} ===").cyan().bold());
}

fn kv(key: &str, value: impl std::fmt::Display) {
    println!("  {}: {}", key.white().bold(), value);
}

fn prepare(config: &AnalysisConfig, input: &Path) -> Result<PreparedData> {
    let mut pre = Preprocessor::new()
        .with_meta_columns(config.data.meta_columns.clone())
        .with_correlation_threshold(config.preprocessing.correlation_threshold);
    pre.load(input)?;
    pre.prepare_for_clustering(
        &config.preprocessing.exclude,
        config.preprocessing.normalize,
        config.preprocessing.outlier_action,
    )
}

fn engine_for(config: &AnalysisConfig, prepared: &PreparedData) -> Result<ClusteringEngine> {
    let mut engine = ClusteringEngine::new()
        .with_seed(config.seed)
        .with_max_iter(config.clustering.max_iter)
        .with_n_init(config.clustering.n_init);
    engine.set_data(prepared.matrix.clone())?;
    Ok(engine)
}

fn cmd_summary(config: &AnalysisConfig, input: &Path) -> Result<()> {
    let mut pre = Preprocessor::new().with_meta_columns(config.data.meta_columns.clone());
    pre.load(input)?;
    let summary = pre.summarize()?;

    section("Dataset");
    kv("Rows", summary.rows);
    kv("Columns", summary.columns);
    kv("Numeric", summary.numeric_columns);
    kv("Categorical", summary.categorical_columns);
    kv(
        "Missing cells",
        format!("{} ({:.2}%)", summary.missing_cells, summary.missing_percentage),
    );

    let missing = pre.analyze_missing()?;
    if !missing.is_empty() {
        section("Missing values");
        for stat in &missing {
            kv(&stat.column, format!("{} ({:.2}%)", stat.count, stat.percentage));
        }
    }
    Ok(())
}

fn print_optimal_k(table: &OptimalKTable) {
    section("Optimal K");
    println!(
        "  {:>3} {:>12} {:>10} {:>18} {:>15}",
        "K", "inertia", "silhouette", "calinski_harabasz", "davies_bouldin"
    );
    for row in table.rows() {
        println!(
            "  {:>3} {:>12.4} {:>10.4} {:>18.4} {:>15.4}",
            row.k, row.inertia, row.silhouette, row.calinski_harabasz, row.davies_bouldin
        );
    }
    for metric in QualityMetric::ALL {
        if let Some(k) = table.recommended(metric) {
            kv(&format!("Best by {metric}"), k);
        }
    }
}

fn cmd_optimal_k(
    config: &AnalysisConfig,
    input: &Path,
    k_min: Option<usize>,
    k_max: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let prepared = prepare(config, input)?;
    let engine = engine_for(config, &prepared)?;

    let k_min = k_min.unwrap_or(config.clustering.k_min);
    let k_max = k_max.unwrap_or(config.clustering.k_max);
    let table = engine.find_optimal_k(k_min..=k_max)?;
    print_optimal_k(&table);

    if let Some(dir) = output {
        let bundle = ArtifactBundle {
            optimal_k: Some(table),
            ..ArtifactBundle::default()
        };
        bundle.write_to(dir)?;
    }
    Ok(())
}

fn cmd_run(
    config: &AnalysisConfig,
    input: &Path,
    algorithm: Option<Algorithm>,
    n_clusters: Option<usize>,
    output: &Path,
) -> Result<()> {
    let prepared = prepare(config, input)?;
    let mut engine = engine_for(config, &prepared)?;
    let clustering = &config.clustering;
    let algorithm = algorithm.unwrap_or(clustering.algorithm);
    let k = n_clusters.unwrap_or(clustering.n_clusters);

    let mut linkage = None;
    match algorithm {
        Algorithm::KMeans => {
            engine.fit_kmeans(k, clustering.n_init)?;
        }
        Algorithm::Hierarchical => {
            engine.fit_hierarchical(k, clustering.linkage, clustering.metric)?;
            linkage = engine.current_fit().and_then(|fit| fit.linkage_matrix().cloned());
        }
        Algorithm::Dbscan => {
            engine.fit_dbscan(clustering.eps, clustering.min_samples)?;
        }
        Algorithm::Gmm => {
            engine.fit_gaussian_mixture(k, clustering.n_init)?;
        }
    }
    info!(%algorithm, "clustering finished");

    let metrics = engine.evaluate(None)?;
    let profiles = engine.cluster_profiles(&prepared.dataset, &prepared.features, None)?;
    let members = engine.cluster_members(&prepared.dataset, None, &config.data.id_column)?;
    let distribution = engine.cluster_distribution(None)?;
    let projection = engine.project(prepared.matrix.n_cols().min(2))?;
    let labels = engine
        .current_fit()
        .map(|fit| fit.labels().clone())
        .ok_or_else(|| ClusterError::state("no clustering result"))?;

    section(&format!("{algorithm} clustering"));
    kv("Clusters", metrics.n_clusters);
    kv("Noise points", metrics.n_noise);
    kv("Silhouette", format!("{:.4}", metrics.silhouette));
    kv("Calinski-Harabasz", format!("{:.4}", metrics.calinski_harabasz));
    kv("Davies-Bouldin", format!("{:.4}", metrics.davies_bouldin));
    if let Some(inertia) = metrics.inertia {
        kv("Inertia", format!("{inertia:.4}"));
    }

    section("Distribution");
    for share in &distribution {
        kv(
            &share.label.to_string(),
            format!("{} ({:.1}%)", share.count, share.percentage),
        );
    }

    let bundle = ArtifactBundle {
        labels: Some(labels),
        metrics: Some(metrics),
        profiles: Some(profiles),
        members: Some(members),
        distribution: Some(distribution),
        linkage,
        projection: Some(projection),
        settings: Some(config.report.clone()),
        ..ArtifactBundle::default()
    };
    let written = bundle.write_to(output)?;
    println!(
        "\n{} {} artifacts written to {}",
        "[PASS]".green().bold(),
        written.len(),
        output.display()
    );
    Ok(())
}

fn cmd_compare(
    config: &AnalysisConfig,
    input: &Path,
    n_clusters: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let prepared = prepare(config, input)?;
    let engine = engine_for(config, &prepared)?;
    let rows = engine.compare_pipelines(n_clusters.unwrap_or(config.clustering.n_clusters))?;

    section("Pipeline comparison");
    println!(
        "  {:<22} {:>3} {:>10} {:>18} {:>15}",
        "method", "K", "silhouette", "calinski_harabasz", "davies_bouldin"
    );
    for row in &rows {
        println!(
            "  {:<22} {:>3} {:>10.4} {:>18.4} {:>15.4}",
            row.method,
            row.n_clusters,
            row.scores.silhouette,
            row.scores.calinski_harabasz,
            row.scores.davies_bouldin
        );
    }

    if let Some(dir) = output {
        let bundle = ArtifactBundle {
            comparison: Some(rows),
            ..ArtifactBundle::default()
        };
        bundle.write_to(dir)?;
    }
    Ok(())
}
