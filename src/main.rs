use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use dimscan::config::AnalyzerConfig;
use dimscan::pipeline::analysis::{
    detect_format, DrawingAnalyzer, FileImageSource, LoadError, PdfiumRasterizer,
};
use dimscan::pipeline::batch::{render_report, scan_drawings, write_report, BatchRunner};
use dimscan::pipeline::dimensions::{extract_metadata, DimensionExtractor, DimensionSummary};
use dimscan::pipeline::prompt_templates::PromptSelection;
use dimscan::pipeline::vision::{connect_from_config, VisionModel};

#[derive(Parser)]
#[command(name = "dimscan")]
#[command(about = "Extract dimensions and title-block data from engineering drawings")]
#[command(version)]
struct Cli {
    /// JSON config file (overrides DIMSCAN_CONFIG and the per-user file)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single drawing and print the JSON report
    Analyze {
        path: PathBuf,
        /// Custom prompt text (replaces the drawing-analysis prompt)
        #[arg(long, conflicts_with = "quick")]
        prompt: Option<String>,
        /// Template wrapped around --prompt: analyze, describe, technical
        #[arg(long, requires = "prompt")]
        template: Option<String>,
        /// Short general-purpose scan instead of the full analysis
        #[arg(long)]
        quick: bool,
        /// Write `<stem>_analysis.json` here instead of printing
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Analyze every drawing in a directory
    Batch {
        dir: PathBuf,
        /// Report directory (default: <dir>/results)
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Concurrent inferences (default: from config)
        #[arg(long)]
        workers: Option<usize>,
        /// Move successfully analyzed drawings here
        #[arg(long, value_name = "DIR")]
        move_processed: Option<PathBuf>,
    },
    /// Run the regex extraction pass over a text file (no model)
    Extract { file: PathBuf },
}

fn main() -> ExitCode {
    dimscan::init_tracing();
    let cli = Cli::parse();

    let config = match AnalyzerConfig::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Commands::Extract { file } => run_extract(&config, &file),
        Commands::Analyze {
            path,
            prompt,
            template,
            quick,
            output_dir,
        } => {
            let selection = match (prompt, quick) {
                (Some(text), _) => PromptSelection::custom(text, template.as_deref()),
                (None, true) => PromptSelection::QuickScan,
                (None, false) => PromptSelection::DrawingAnalysis,
            };
            if let Err(e) = preflight(&path) {
                error!(error = %e, "Drawing cannot be loaded");
                return ExitCode::FAILURE;
            }
            with_model(&config, |analyzer| {
                run_analyze(analyzer, &path, &selection, output_dir.as_deref())
            })
        }
        Commands::Batch {
            dir,
            output_dir,
            workers,
            move_processed,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| dir.join("results"));
            let workers = workers.unwrap_or(config.workers);
            let inputs = match scan_drawings(&dir) {
                Ok(inputs) => inputs,
                Err(e) => {
                    error!(error = %e, "Cannot scan drawing directory");
                    return ExitCode::FAILURE;
                }
            };
            if inputs.is_empty() {
                warn!(dir = %dir.display(), "No drawings found");
                return ExitCode::SUCCESS;
            }
            with_model(&config, |analyzer| {
                run_batch(analyzer, &inputs, &output_dir, workers, move_processed)
            })
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

/// Reject a missing or unsupported drawing before the backend is contacted.
fn preflight(path: &Path) -> Result<(), LoadError> {
    detect_format(path).map(|_| ())
}

/// Connect the backend, build the analyzer, run `f`, then release the model.
fn with_model<F>(config: &AnalyzerConfig, f: F) -> Result<(), String>
where
    F: FnOnce(&DrawingAnalyzer) -> Result<(), String>,
{
    let model: Arc<dyn VisionModel> = connect_from_config(config).map_err(|e| e.to_string())?;

    let mut images = FileImageSource::new(config.pdf_scale);
    match PdfiumRasterizer::new() {
        Ok(rasterizer) => images = images.with_pdf_rasterizer(Arc::new(rasterizer)),
        Err(e) => warn!(error = %e, "PDF support unavailable"),
    }

    let analyzer = DrawingAnalyzer::new(Arc::new(images), model.clone())
        .with_boost(config.boost.clone())
        .with_turn_markers(config.turn_markers);

    let outcome = f(&analyzer);

    if let Err(e) = model.shutdown() {
        warn!(error = %e, "Model shutdown failed");
    }
    outcome
}

fn run_analyze(
    analyzer: &DrawingAnalyzer,
    path: &Path,
    selection: &PromptSelection,
    output_dir: Option<&Path>,
) -> Result<(), String> {
    let result = analyzer.analyze(path, selection).map_err(|e| e.to_string())?;

    match output_dir {
        Some(dir) => {
            let report = write_report(dir, &result).map_err(|e| e.to_string())?;
            println!("{}", report.display());
        }
        None => {
            let json = render_report(&result).map_err(|e| e.to_string())?;
            println!("{json}");
        }
    }
    Ok(())
}

fn run_batch(
    analyzer: &DrawingAnalyzer,
    inputs: &[PathBuf],
    output_dir: &Path,
    workers: usize,
    move_processed: Option<PathBuf>,
) -> Result<(), String> {
    let mut runner = BatchRunner::new(analyzer, output_dir).with_workers(workers);
    if let Some(processed) = move_processed {
        runner = runner.with_processed_dir(processed);
    }
    let summary = runner.run(inputs);

    info!(
        processed = summary.processed.len(),
        failed = summary.failed.len(),
        "Batch finished"
    );
    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    println!("{json}");

    if summary.processed.is_empty() {
        return Err(format!("all {} drawings failed", summary.failed.len()));
    }
    Ok(())
}

fn run_extract(config: &AnalyzerConfig, file: &Path) -> Result<(), String> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;

    let dimensions = DimensionExtractor::new(config.boost.clone()).extract(&text);
    let metadata = extract_metadata(&text);
    let summary = DimensionSummary::from_records(&dimensions);

    let report = serde_json::json!({
        "source_identifier": file.display().to_string(),
        "dimensions": dimensions,
        "metadata": metadata,
        "summary": summary,
    });
    let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}
