//! polycheck - command line front end of the polygon checker
//!
//! Loads the given files, runs every rule on the merged layer and prints
//! one status line per rule. Exits with 0 when every rule passed, 1 when
//! any rule failed and 2 when a file or the configuration could not be
//! read.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use polygon_checker::core::config::CheckConfig;
use polygon_checker::core::error::{CheckError, Result};
use polygon_checker::present::{status_messages, write_geojson, Level, MapView};
use polygon_checker::session::{Report, Session};

/// Check polygon datasets for invalid geometries, duplicates, gaps and overlaps
#[derive(Parser, Debug)]
#[command(name = "polycheck")]
#[command(about = "Check polygon datasets for invalid geometries, duplicates, gaps and overlaps")]
struct Args {
    /// Input files (.geojson, .json, .kml, .zip shapefile bundle, .gpkg)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Repair invalid geometries before reporting
    #[arg(long)]
    fix: bool,

    /// Write the cleaned merged layer as GeoJSON (default path from config)
    #[arg(long, short = 'o', num_args = 0..=1)]
    output: Option<Option<PathBuf>>,

    /// Write the map overlay document
    #[arg(long)]
    map: Option<PathBuf>,

    /// Also check every pair of files for intersections
    #[arg(long)]
    cross: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        "polygon_checker=debug,polycheck=debug"
    } else {
        "polygon_checker=info,polycheck=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every rule passed
fn run(args: &Args) -> Result<bool> {
    let config = match &args.config {
        Some(path) => CheckConfig::load(path)?,
        None => CheckConfig::default(),
    };
    config.validate().map_err(CheckError::InvalidConfig)?;

    let mut session = Session::open(&args.files, config)?;
    if args.fix {
        session.fix();
    }
    let report = session.run(args.cross);

    match args.format {
        Format::Text => print_text(&report),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Some(output) = &args.output {
        let path = output.clone().unwrap_or_else(|| session.config().output.clone());
        write_geojson(session.merged(), &path)?;
    }

    if let Some(path) = &args.map {
        MapView::from_report(&report, session.merged(), &session.config().map).write(path)?;
    }

    Ok(report.passed())
}

fn print_text(report: &Report) {
    println!(
        "{}: {} features ({})",
        report.layer, report.feature_count, report.crs
    );
    for message in status_messages(report) {
        let tag = match message.level {
            Level::Success => "ok",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        println!("[{tag}] {}", message.text);
    }

    for result in report.results.iter().filter(|r| !r.passed()) {
        for finding in &result.findings {
            println!("  {}: {}", result.rule, finding.detail);
        }
    }
}
