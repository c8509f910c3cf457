use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, ValueEnum};
use dfaligner_rs::{
    AlignmentError, DecodeStrategy, DurationExtractor, DurationExtractorBuilder,
    DurationReport, ExtractionMethod, ExtractorConfig, PosteriorMatrix, TokenSequence,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[path = "extract_durations/json_report_formatter.rs"]
mod json_report_formatter;

use json_report_formatter::{ItemFailure, Meta, Output, SCHEMA_VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodChoice {
    #[value(alias = "dijkstra")]
    Exact,
    Beam,
}

impl MethodChoice {
    fn extraction_method(self) -> ExtractionMethod {
        match self {
            Self::Exact => ExtractionMethod::Dijkstra,
            Self::Beam => ExtractionMethod::Beam,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "extract_durations")]
#[command(about = "Extract per-token durations from frame-level symbol posteriors")]
struct Args {
    /// JSON array of `{ "id", "tokens", "posteriors" | "logits" }` items.
    #[arg(long, env = "DFALIGNER_INPUT")]
    input: PathBuf,
    #[arg(long, env = "DFALIGNER_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "DFALIGNER_METHOD", value_enum)]
    method: Option<MethodChoice>,
    #[arg(long, env = "DFALIGNER_BEAM_WIDTH")]
    beam_width: Option<usize>,
    #[arg(long, env = "DFALIGNER_PROB_FLOOR")]
    prob_floor: Option<f32>,
    /// JSON object mapping symbol labels to ids; enables text renderings.
    #[arg(long, env = "DFALIGNER_SYMBOLS")]
    symbols: Option<PathBuf>,
    #[arg(long, env = "DFALIGNER_OUT", default_value = "durations.json")]
    out: PathBuf,
    /// Re-run an item with the exact decoder when the beam is exhausted.
    #[arg(long, env = "DFALIGNER_FALLBACK_EXACT", default_value_t = false)]
    fallback_exact: bool,
    /// Abort on the first failing item instead of recording it.
    #[arg(long, default_value_t = false)]
    fail_fast: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputItem {
    id: String,
    tokens: Vec<usize>,
    #[serde(default)]
    posteriors: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    logits: Option<Vec<Vec<f32>>>,
}

impl InputItem {
    fn into_parts(self) -> Result<(String, PosteriorMatrix, TokenSequence), String> {
        let matrix = match (self.posteriors, self.logits) {
            (Some(rows), None) => PosteriorMatrix::from_rows(rows),
            (None, Some(rows)) => PosteriorMatrix::from_logits(rows),
            _ => {
                return Err(format!(
                    "{}: exactly one of \"posteriors\" or \"logits\" must be given",
                    self.id
                ))
            }
        }
        .map_err(|err| format!("{}: {err}", self.id))?;
        Ok((self.id, matrix, TokenSequence::new(self.tokens)))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    let config = resolve_config(&args)?;
    let mut builder = DurationExtractorBuilder::new(config.clone());
    if let Some(path) = args.symbols.as_ref() {
        builder = builder.with_symbols_path(path);
    }
    let extractor = builder
        .build()
        .map_err(|err| format!("Failed to build duration extractor: {err}"))?;

    let items = load_items(&args.input)?;
    if items.is_empty() {
        return Err(format!("No items found in '{}'.", args.input.display()));
    }
    tracing::info!(
        items = items.len(),
        method = ?config.extraction_method,
        "extracting durations"
    );

    let progress = ProgressBar::new(items.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );

    let mut reports: Vec<DurationReport> = Vec::with_capacity(items.len());
    let mut failures: Vec<ItemFailure> = Vec::new();
    let mut fallback_count = 0usize;
    for item in items {
        progress.set_message(item.id.clone());
        let id = item.id.clone();
        let outcome = item.into_parts().and_then(|(id, matrix, tokens)| {
            extract_item(&extractor, &id, &matrix, &tokens, args.fallback_exact)
                .map_err(|err| format!("{id}: {err}"))
        });
        match outcome {
            Ok((report, fell_back)) => {
                fallback_count += usize::from(fell_back);
                reports.push(report);
            }
            Err(err) if args.fail_fast => {
                progress.abandon();
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(item = %id, "{err}");
                failures.push(ItemFailure { id, error: err });
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message("extraction complete");

    let output = Output {
        schema_version: SCHEMA_VERSION,
        meta: Meta {
            generated_at: Utc::now().to_rfc3339(),
            input_path: args.input.display().to_string(),
            extraction_method: extractor.strategy().kind().to_string(),
            beam_width: extractor.strategy().beam_width(),
            prob_floor: extractor.cost_model().floor(),
            item_count: reports.len(),
            fallback_count,
        },
        items: reports,
        failures,
    };
    json_report_formatter::write_output(&args.out, &output)?;
    tracing::info!(
        written = output.items.len(),
        failed = output.failures.len(),
        fallbacks = fallback_count,
        out = %args.out.display(),
        "wrote durations"
    );
    Ok(())
}

fn resolve_config(args: &Args) -> Result<ExtractorConfig, String> {
    let mut config = match args.config.as_ref() {
        Some(path) => ExtractorConfig::load(path).map_err(|err| err.to_string())?,
        None => ExtractorConfig::default(),
    };
    if let Some(method) = args.method {
        config.extraction_method = method.extraction_method();
    }
    if let Some(beam_width) = args.beam_width {
        config.beam_width = beam_width;
    }
    if let Some(prob_floor) = args.prob_floor {
        config.prob_floor = prob_floor;
    }
    Ok(config)
}

fn extract_item(
    extractor: &DurationExtractor,
    id: &str,
    matrix: &PosteriorMatrix,
    tokens: &TokenSequence,
    fallback_exact: bool,
) -> Result<(DurationReport, bool), AlignmentError> {
    match extractor.report(id, matrix, tokens) {
        Err(err) if fallback_exact && err.is_beam_exhausted() => {
            tracing::warn!(item = id, "{err}; retrying with the exact decoder");
            let report = extractor.report_with(DecodeStrategy::Exact, id, matrix, tokens)?;
            Ok((report, true))
        }
        other => other.map(|report| (report, false)),
    }
}

fn load_items(path: &Path) -> Result<Vec<InputItem>, String> {
    let file = File::open(path)
        .map_err(|err| format!("Failed to open input '{}': {err}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("Failed to parse input '{}': {err}", path.display()))
}
