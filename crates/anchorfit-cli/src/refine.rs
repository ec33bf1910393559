//! Refinement pipeline: batch file → near-miss rows → refined results file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anchorfit_ai::{EmbeddingSimilarity, OllamaClient};
use anchorfit_core::{DecisionStrategy, EngineConfig, GeneratorKind};
use anchorfit_engine::{CandidateGenerator, Controller, DeterministicGenerator, ModelGenerator, Scorer};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use tracing::info;

use crate::display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    CoverageRollback,
    BestOfN,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeneratorArg {
    Deterministic,
    Model,
}

#[derive(Debug, Args)]
pub struct RefineArgs {
    /// Batch file (.csv or .parquet)
    #[arg(short, long, env = "ANCHORFIT_INPUT")]
    pub input: PathBuf,

    /// Results file (.csv or .parquet); defaults to a timestamped CSV in --output-dir
    #[arg(short, long, env = "ANCHORFIT_OUTPUT")]
    pub output: Option<PathBuf>,

    #[arg(long, env = "ANCHORFIT_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// JSON config file; flags override its values
    #[arg(short, long, env = "ANCHORFIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "ANCHORFIT_STRATEGY")]
    pub strategy: Option<StrategyArg>,

    #[arg(long, env = "ANCHORFIT_GENERATOR")]
    pub generator: Option<GeneratorArg>,

    #[arg(long, env = "ANCHORFIT_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    #[arg(short, long, env = "ANCHORFIT_WORKERS")]
    pub workers: Option<usize>,

    /// Lower bound of the near-miss band
    #[arg(long, env = "ANCHORFIT_BAND_MIN")]
    pub band_min: Option<f64>,

    /// Upper bound of the near-miss band
    #[arg(long, env = "ANCHORFIT_BAND_MAX")]
    pub band_max: Option<f64>,

    /// Status label of rows eligible for refinement
    #[arg(long, env = "ANCHORFIT_COMPATIBLE_STATUS")]
    pub compatible_status: Option<String>,

    /// Directory holding model.onnx and tokenizer.json
    #[arg(long, env = "ANCHORFIT_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    #[arg(long, env = "ANCHORFIT_OLLAMA_HOST")]
    pub ollama_host: Option<String>,

    #[arg(long, env = "ANCHORFIT_OLLAMA_MODEL")]
    pub ollama_model: Option<String>,

    #[arg(long, env = "ANCHORFIT_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Per-request generation timeout in seconds
    #[arg(long, env = "ANCHORFIT_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

impl RefineArgs {
    /// Config file (or defaults) with flag overrides applied, validated.
    pub fn resolve_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(strategy) = self.strategy {
            config.strategy = match strategy {
                StrategyArg::CoverageRollback => DecisionStrategy::CoverageRollback,
                StrategyArg::BestOfN => DecisionStrategy::BestOfN,
            };
        }
        if let Some(generator) = self.generator {
            config.generator = match generator {
                GeneratorArg::Deterministic => GeneratorKind::Deterministic,
                GeneratorArg::Model => GeneratorKind::Model,
            };
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = n;
        }
        if let Some(n) = self.workers {
            config.workers = n;
        }
        if let Some(min) = self.band_min {
            config.batch.band.min = min;
        }
        if let Some(max) = self.band_max {
            config.batch.band.max = max;
        }
        if let Some(status) = &self.compatible_status {
            config.batch.compatible_status = status.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.embedding.model_dir = dir.clone();
        }
        if let Some(host) = &self.ollama_host {
            config.generation.host = host.clone();
        }
        if let Some(model) = &self.ollama_model {
            config.generation.model = model.clone();
        }
        if let Some(t) = self.temperature {
            config.generation.temperature = t;
        }
        if let Some(secs) = self.timeout_secs {
            config.generation.timeout_secs = secs;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Default results path: `<dir>/refined_<UTC timestamp>.csv`.
pub fn default_output(dir: &Path, started: DateTime<Utc>) -> PathBuf {
    dir.join(format!("refined_{}.csv", started.format("%Y%m%d_%H%M%S")))
}

/// Wire the configured generator and strategy around `scorer`.
///
/// With the model generator, best-of-N scores the model's candidate ahead
/// of the two deterministic ones.
pub fn build_controller(config: &EngineConfig, scorer: Scorer) -> anyhow::Result<Controller> {
    let model: Option<Arc<dyn CandidateGenerator>> = match config.generator {
        GeneratorKind::Deterministic => None,
        GeneratorKind::Model => {
            let client = OllamaClient::new(&config.generation).context("building Ollama client")?;
            info!(
                host = %config.generation.host,
                model = %config.generation.model,
                "using model generator"
            );
            Some(Arc::new(
                ModelGenerator::new(Arc::new(client))
                    .with_reply_field(config.generation.reply_field.clone()),
            ))
        }
    };

    let controller = match config.strategy {
        DecisionStrategy::CoverageRollback => {
            let primary =
                model.unwrap_or_else(|| Arc::new(DeterministicGenerator::rule_based()));
            Controller::coverage_rollback(primary, scorer)
        }
        DecisionStrategy::BestOfN => {
            let mut contenders: Vec<Arc<dyn CandidateGenerator>> = model.into_iter().collect();
            contenders.push(Arc::new(DeterministicGenerator::rule_based()));
            contenders.push(Arc::new(DeterministicGenerator::short_answer()));
            Controller::best_of_n(scorer).with_contenders(contenders)
        }
    };
    Ok(controller)
}

/// Run the full pipeline: read batch → load models → refine in parallel →
/// write results.
pub fn run(args: &RefineArgs) -> anyhow::Result<()> {
    let started = Utc::now();
    let config = args.resolve_config()?;

    let selection = anchorfit_store::load_requests(&args.input, &config.batch, config.max_attempts)
        .with_context(|| format!("reading batch {}", args.input.display()))?;
    eprintln!(
        "  Read {} rows from {}: {} selected, {} incompatible, {} outside [{}, {}]",
        selection.total_rows,
        args.input.display(),
        selection.requests.len(),
        selection.incompatible,
        selection.out_of_band,
        config.batch.band.min,
        config.batch.band.max,
    );

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.output_dir, started));

    if selection.requests.is_empty() {
        anchorfit_store::write_results(&output, &[])
            .with_context(|| format!("writing {}", output.display()))?;
        eprintln!("  Nothing to refine; wrote empty {}", output.display());
        return Ok(());
    }

    eprintln!("  Loading embedding model from {}...", config.embedding.model_dir.display());
    let similarity = EmbeddingSimilarity::load(&config.embedding.model_dir)
        .context("loading embedding model")?;
    // The Ollama client is blocking: build and drop it outside the runtime.
    let controller = Arc::new(build_controller(&config, Scorer::new(Arc::new(similarity)))?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;

    let total = selection.requests.len();
    let (results, summary) = runtime.block_on(anchorfit_engine::run_batch(
        Arc::clone(&controller),
        selection.requests,
        config.workers,
        |done, _| {
            eprint!(
                "\r  Refined {done}/{total} ({:.1}%)",
                done as f64 / total as f64 * 100.0
            );
        },
    ));
    eprintln!();
    drop(runtime);

    let written = anchorfit_store::write_results(&output, &results)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(rows = written, path = %output.display(), "results written");

    let stats = anchorfit_store::ResultStats::from_results(&results);
    display::print_summary(&summary, &stats, &output, started);
    display::print_top_changes(&results);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: RefineArgs,
    }

    fn parse(argv: &[&str]) -> RefineArgs {
        Wrapper::try_parse_from(std::iter::once("anchorfit").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "--input",
            "batch.csv",
            "--strategy",
            "best-of-n",
            "--generator",
            "deterministic",
            "--max-attempts",
            "5",
            "--band-min",
            "0.6",
            "--ollama-host",
            "http://gpu:11434",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.strategy, DecisionStrategy::BestOfN);
        assert_eq!(config.generator, GeneratorKind::Deterministic);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.batch.band.min, 0.6);
        assert_eq!(config.batch.band.max, 0.85);
        assert_eq!(config.generation.host, "http://gpu:11434");
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"max_attempts": 7, "workers": 2}}"#).unwrap();
        file.flush().unwrap();

        let path = file.path().to_str().unwrap();
        let args = parse(&["--input", "b.csv", "--config", path, "--workers", "8"]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.workers, 8);
    }

    #[test]
    fn invalid_override_rejected() {
        let args = parse(&["--input", "b.csv", "--band-min", "0.9", "--band-max", "0.5"]);
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn default_output_is_timestamped() {
        let started = DateTime::parse_from_rfc3339("2026-03-01T09:05:07Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            default_output(Path::new("output"), started),
            PathBuf::from("output/refined_20260301_090507.csv")
        );
    }

    #[test]
    fn best_of_n_without_model_uses_deterministic_contenders() {
        let config = EngineConfig {
            strategy: DecisionStrategy::BestOfN,
            generator: GeneratorKind::Deterministic,
            ..EngineConfig::default()
        };
        let scorer = Scorer::new(Arc::new(anchorfit_core::FnSimilarity(|_: &str, _: &str| 0.5)));
        let controller = build_controller(&config, scorer).unwrap();
        assert_eq!(controller.strategy(), DecisionStrategy::BestOfN);
    }
}
