//! Command-line inspector for key event logs
//!
//! Loads a CESR file, runs the parse/validate pipeline, applies the same
//! filter surface the web layer exposes, and prints the structured result.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use kerilog_log::{ByteSource, EventRecord, FileSource, KeyEventLog, LogEntry, MemorySource};
use kerilog_query::{parse as parse_filter, FilterExpression};

#[derive(Parser)]
#[command(name = "kerilog")]
#[command(about = "Parse, validate, and query a KERI key event log", long_about = None)]
struct Cli {
    /// CESR file to load, or - for stdin
    input: PathBuf,

    /// Filter expression, e.g. 'kind == "rot" and sn >= 1'
    #[arg(short, long)]
    filter: Option<String>,

    /// Event-kind shortcut, equivalent to kind == <value>
    #[arg(short = 't', long)]
    filter_type: Option<String>,

    /// Restrict output to one identifier prefix
    #[arg(short, long)]
    identifier: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: Format,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Aligned columns for reading
    Table,
    /// The full structured representation
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let log = load_log(&cli.input)?;

    let mut filters: Vec<FilterExpression> = Vec::new();
    if let Some(kind) = &cli.filter_type {
        filters.push(FilterExpression::kind_shortcut(kind));
    }
    if let Some(text) = &cli.filter {
        match parse_filter(text) {
            Ok(filter) => filters.push(filter),
            Err(e) => bail!("{e}"),
        }
    }

    let entries: Vec<&LogEntry> = log
        .entries()
        .iter()
        .filter(|entry| {
            cli.identifier
                .as_deref()
                .map(|aid| entry.event.identifier_str() == aid)
                .unwrap_or(true)
        })
        .filter(|entry| {
            filters
                .iter()
                .all(|f| f.matches(&entry.event, &entry.diagnostics))
        })
        .collect();

    match cli.format {
        Format::Json => print_json(&log, &entries)?,
        Format::Table => print_table(&log, &entries),
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_log(input: &PathBuf) -> Result<KeyEventLog> {
    if input.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("reading stdin")?;
        return MemorySource::new("stdin", bytes)
            .load()
            .context("parsing stream from stdin");
    }
    FileSource::new(input)
        .load()
        .with_context(|| format!("parsing {}", input.display()))
}

fn print_json(log: &KeyEventLog, entries: &[&LogEntry]) -> Result<()> {
    let records: Vec<EventRecord> = entries.iter().map(|e| EventRecord::from_entry(e)).collect();
    let output = serde_json::json!({
        "source": log.source_label(),
        "events": records,
        "summary": log.summary(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_table(log: &KeyEventLog, entries: &[&LogEntry]) {
    println!(
        "{:<4} {:<6} {:<20} {:<16} {:<8} {}",
        "SN", "KIND", "IDENTIFIER", "DIGEST", "STATUS", "DIAGNOSTICS"
    );
    for entry in entries {
        let status = if entry.accepted { "ok" } else { "reject" };
        let diags = entry
            .diagnostics
            .iter()
            .map(|d| d.code.to_string())
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<4} {:<6} {:<20} {:<16} {:<8} {}",
            entry.event.sn,
            entry.event.kind.code(),
            short(entry.event.identifier_str(), 20),
            entry.event.digest.short(),
            status,
            diags
        );
    }
    for diag in log.stream_diagnostics() {
        println!("stream: {diag}");
    }
    let summary = log.summary();
    println!(
        "{} events, {} diagnostics, {}",
        summary.event_count,
        summary.diagnostic_count,
        if summary.clean { "clean" } else { "has issues" }
    );
}

fn short(text: &str, width: usize) -> String {
    if text.len() > width {
        format!("{}...", &text[..width - 3])
    } else {
        text.to_string()
    }
}
