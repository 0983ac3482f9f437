//! rowforge-export: render record collections into xlsx workbooks
//!
//! Usage:
//!   # Records as a JSON array, template-driven columns
//!   rowforge-export --template report.json data.json -o report.xlsx
//!
//!   # Read newline-delimited records from stdin
//!   cat records.jsonl | rowforge-export --template report.json --ndjson -o report.xlsx

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use rowforge::{export_records, SheetTemplate, XlsxSink};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

#[derive(Parser, Debug)]
#[command(name = "rowforge-export")]
#[command(about = "Export structured records into an xlsx workbook", long_about = None)]
struct Args {
    /// Input records file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Sheet template JSON file
    #[arg(long, short = 't')]
    template: String,

    /// Output workbook path
    #[arg(long, short = 'o', default_value = "export.xlsx")]
    output: String,

    /// Process newline-delimited JSON (one record per line)
    #[arg(long)]
    ndjson: bool,

    /// Rows per sheet (header included) before rolling over to a new sheet
    #[arg(long)]
    threshold: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let template_text = std::fs::read_to_string(&args.template)
        .with_context(|| format!("Failed to read template: {}", args.template))?;
    let template = SheetTemplate::from_json_str(&template_text)?;

    let records = if args.ndjson {
        read_ndjson(args.input.as_deref())?
    } else {
        read_json(args.input.as_deref())?
    };

    let mut sink = XlsxSink::new(&args.output)?;
    if let Some(threshold) = args.threshold {
        sink = sink.with_threshold(threshold);
    }
    export_records(&template, &records, &mut sink)?;

    eprintln!("Wrote {} records to {}", records.len(), args.output);
    Ok(())
}

/// Read the whole input as one JSON document; a top-level array is the
/// record list, anything else is a single record.
fn read_json(input: Option<&str>) -> Result<Vec<Value>> {
    let mut bytes = read_all(input)?;
    let value: Value =
        simd_json::serde::from_slice(&mut bytes).context("Failed to parse JSON input")?;
    Ok(match value {
        Value::Array(records) => records,
        other => vec![other],
    })
}

/// Read newline-delimited JSON, one record per line, skipping blank lines.
fn read_ndjson(input: Option<&str>) -> Result<Vec<Value>> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input: {}", path))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let mut bytes = line.into_bytes();
        let value: Value =
            simd_json::serde::from_slice(&mut bytes).context("Failed to parse record")?;
        records.push(value);
    }
    Ok(records)
}

fn read_all(input: Option<&str>) -> Result<Vec<u8>> {
    match input {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read input: {}", path)),
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}
