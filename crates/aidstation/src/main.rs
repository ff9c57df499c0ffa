use std::fs::File;
use std::path::{Path, PathBuf};

use aidstation_core::{CheckpointNormalizer, NormalizationReport, NormalizerConfig};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use polars::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aid station split normalization", long_about = None)]
struct Cli {
    /// Normalizer config (TOML). Falls back to AIDSTATION_CONFIG, then built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve checkpoint timestamps and split off runners with timing errors
    Normalize(NormalizeArgs),
    /// Print the race year to start date table in use
    Calendar,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Split table exported as CSV with a header row
    #[arg(long)]
    input: PathBuf,
    /// Directory receiving the validated table, the flagged table and report.json
    #[arg(long)]
    out_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Normalize(args) => handle_normalize(config, args),
        Command::Calendar => {
            let mut table = Table::new();
            table.set_header(vec!["year", "race date", "race start"]);
            for (year, date) in config.calendar().entries() {
                table.add_row(vec![
                    year.to_string(),
                    date.to_string(),
                    config.race_start.to_string(),
                ]);
            }
            println!("{table}");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<NormalizerConfig> {
    dotenvy::dotenv().ok();

    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::var("AIDSTATION_CONFIG").ok().map(PathBuf::from),
    };

    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading normalizer config");
            NormalizerConfig::from_path(&path)
        }
        None => Ok(NormalizerConfig::default()),
    }
}

fn handle_normalize(config: NormalizerConfig, args: NormalizeArgs) -> Result<()> {
    let input = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(args.input.clone()))
        .and_then(|reader| reader.finish())
        .with_context(|| format!("failed to read split table '{}'", args.input.display()))?;

    let normalizer = CheckpointNormalizer::new(config);
    let output = normalizer
        .normalize(&input)
        .context("checkpoint normalization failed")?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create '{}'", args.out_dir.display()))?;

    let ext = args.format.extension();
    let mut validated = output.validated;
    let mut flagged = output.flagged;
    write_frame(&mut validated, &args.out_dir.join(format!("validated.{ext}")), args.format)?;
    write_frame(&mut flagged, &args.out_dir.join(format!("flagged.{ext}")), args.format)?;

    let report_path = args.out_dir.join("report.json");
    let report_file = File::create(&report_path)
        .with_context(|| format!("failed to create '{}'", report_path.display()))?;
    serde_json::to_writer_pretty(report_file, &output.report)?;

    print_summary(&output.report);
    Ok(())
}

fn write_frame(df: &mut DataFrame, path: &Path, format: OutputFormat) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create '{}'", path.display()))?;
    match format {
        OutputFormat::Csv => {
            CsvWriter::new(file).include_header(true).finish(df)?;
        }
        OutputFormat::Parquet => {
            ParquetWriter::new(file).finish(df)?;
        }
    }
    info!(path = %path.display(), rows = df.height(), "Wrote table");
    Ok(())
}

fn print_summary(report: &NormalizationReport) {
    let mut table = Table::new();
    table.set_header(vec!["metric", "value"]);
    table.add_row(vec!["input rows".to_string(), report.input_rows.to_string()]);
    table.add_row(vec![
        "years seen".to_string(),
        format!("{:?}", report.calendar.years_seen),
    ]);
    table.add_row(vec![
        "null year rows".to_string(),
        report.calendar.null_year_rows.to_string(),
    ]);
    table.add_row(vec![
        "unsupported year rows".to_string(),
        report.calendar.unsupported_year_rows.to_string(),
    ]);
    table.add_row(vec!["rollovers".to_string(), report.rollovers.to_string()]);
    for (column, count) in report.diagnostic_counts() {
        table.add_row(vec![format!("parse failures ({column})"), count.to_string()]);
    }
    table.add_row(vec![
        "flagged runners".to_string(),
        report.flagged_runners.len().to_string(),
    ]);
    table.add_row(vec!["flagged rows".to_string(), report.flagged_rows.to_string()]);
    table.add_row(vec![
        "validated rows".to_string(),
        report.validated_rows.to_string(),
    ]);
    println!("{table}");
}
