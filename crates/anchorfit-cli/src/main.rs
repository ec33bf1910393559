mod display;
mod refine;

use std::path::PathBuf;

use anchorfit_core::{RefinementRequest, StructuralTag};
use anchorfit_engine::{normalize, validate};
use anchorfit_store::ResultStats;
use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anchorfit", version)]
#[command(about = "Refine page fragments toward a target query without breaking their structure")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refine the near-miss rows of a CSV or Parquet batch file
    Refine(refine::RefineArgs),

    /// Summarize a results file as JSON
    Stats {
        /// Results file written by `refine`
        path: PathBuf,
    },

    /// Normalize one fragment and check it against its tag's rules
    Normalize {
        /// Section label: h1-h6, li, p, ...
        #[arg(long, default_value = "p")]
        tag: String,

        /// Target query or intent phrase
        #[arg(long)]
        anchor: String,

        /// Original fragment, for length caps; defaults to TEXT
        #[arg(long)]
        original: Option<String>,

        /// Candidate text to normalize
        text: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    tracing::debug!("anchorfit v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Refine(args) => refine::run(&args),
        Commands::Stats { path } => {
            let rows = anchorfit_store::read_results(&path)
                .with_context(|| format!("reading results from {}", path.display()))?;
            let stats = ResultStats::from_stored(&rows);
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Normalize {
            tag,
            anchor,
            original,
            text,
        } => {
            let tag = StructuralTag::from_label(&tag);
            let original = original.unwrap_or_else(|| text.clone());
            let normalized = normalize(&text, tag, &anchor, &original);
            let request = RefinementRequest::new(anchor, original, tag, 0.0);
            display::print_normalized(&normalized, tag, validate(&normalized, &request));
            Ok(())
        }
    }
}
