use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use netdesign::analysis::Analyzer;
use netdesign::config::{AnalyzerConfig, LoggingConfig};
use netdesign::scoring::ModelCache;
use netdesign::topology::Topology;
use netdesign::{features, simulate, suggest, topology, training};

#[derive(Parser)]
#[command(
    name = "netdesign",
    about = "Network design analyzer: feature extraction, anomaly scoring, and risk annotation",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Validate a topology file
    Validate {
        /// Topology JSON file
        topology: PathBuf,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the feature vector of a topology file
    Extract {
        /// Topology JSON file
        topology: PathBuf,
    },

    /// Simulate, score, and annotate a topology file
    Analyze {
        /// Topology JSON file
        topology: PathBuf,

        /// Model artifact (overrides config)
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Derive remediation suggestions from an analysis result
    Suggest {
        /// Analysis JSON file as produced by `analyze`
        analysis: PathBuf,
    },

    /// Generate the synthetic training corpus
    GenerateDataset {
        /// Number of synthetic topologies
        #[arg(long)]
        samples: Option<usize>,

        /// Output CSV path
        #[arg(long)]
        output: Option<PathBuf>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Train the anomaly model from a corpus
    Train {
        /// Corpus CSV path (generated first if missing)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Output model artifact path
        #[arg(long)]
        model: Option<PathBuf>,

        /// Expected outlier fraction
        #[arg(long)]
        contamination: Option<f64>,

        /// Number of trees
        #[arg(long)]
        estimators: Option<usize>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_topology(path: &Path) -> Result<Topology> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read topology file: {}", path.display()))?;
    Topology::from_json(&content).with_context(|| format!("invalid topology file: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AnalyzerConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting netdesign service");
            netdesign::serve(&config).await?;
        }
        Commands::Validate { topology: path, json } => {
            let topo = read_topology(&path)?;
            let report = topology::validate(&topo)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("valid: {}", report.valid);
                for warning in &report.warnings {
                    println!("  warning: {}", warning);
                }
            }
        }
        Commands::Extract { topology: path } => {
            let topo = read_topology(&path)?;
            let vector = features::extract(&topo);
            vector.check_finite()?;
            for (name, value) in vector.named() {
                println!("{:<18} {}", name, value);
            }
        }
        Commands::Analyze { topology: path, model } => {
            let topo = read_topology(&path)?;
            let model_path = model.unwrap_or_else(|| config.model.path.clone());
            let analyzer = Analyzer::new(
                simulate::from_config(&config.simulation),
                Arc::new(ModelCache::new(model_path)),
            );
            let result = analyzer.analyze(&topo).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Suggest { analysis } => {
            let content = std::fs::read_to_string(&analysis)
                .with_context(|| format!("failed to read analysis file: {}", analysis.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)?;
            let recs = suggest::suggest_value(&value)?;
            println!("{}", serde_json::to_string_pretty(&recs)?);
        }
        Commands::GenerateDataset { samples, output, seed } => {
            let samples = samples.unwrap_or(config.training.samples);
            let output = output.unwrap_or_else(|| config.training.dataset_path.clone());
            let seed = seed.unwrap_or(config.training.seed);
            let rows = training::generate_dataset(samples, seed);
            training::write_dataset(&output, &rows)?;
            println!("Dataset created with {} samples: {}", rows.len(), output.display());
        }
        Commands::Train {
            dataset,
            model,
            contamination,
            estimators,
            seed,
        } => {
            let mut settings = config.training.clone();
            if let Some(c) = contamination {
                settings.contamination = c;
            }
            if let Some(n) = estimators {
                settings.n_estimators = n;
            }
            if let Some(s) = seed {
                settings.seed = s;
            }
            let dataset = dataset.unwrap_or_else(|| settings.dataset_path.clone());
            let model_path = model.unwrap_or_else(|| config.model.path.clone());

            let rows = if dataset.exists() {
                training::read_dataset(&dataset)?
            } else {
                tracing::info!(path = %dataset.display(), "corpus missing, generating");
                let rows = training::generate_dataset(settings.samples, settings.seed);
                training::write_dataset(&dataset, &rows)?;
                rows
            };

            let artifact = training::train(&rows, &settings.forest_params(), settings.seed)?;
            artifact.save(&model_path)?;
            println!(
                "Model trained on {} rows (contamination {}) and saved: {}",
                rows.len(),
                settings.contamination,
                model_path.display()
            );
        }
    }

    Ok(())
}
