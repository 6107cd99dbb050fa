//! arrayio - Read a range of a text file or spreadsheet and write it elsewhere

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use rust_xlsxwriter::Workbook;

use arrayio::backend::{open_workbook_sheet, XlsxEditor};
use arrayio::{logging, read_csv_range, read_excel_range, Config, Span, Table};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Copy a range of lines or cells into delimited text or a workbook
#[derive(Parser, Debug)]
#[command(name = "arrayio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input file (text or spreadsheet)
    input: PathBuf,

    /// Inclusive range: `FROM[:TO]` line numbers for text, cells for spreadsheets (e.g. B3:K20)
    #[arg(short, long)]
    range: String,

    /// For spreadsheet input: which sheet to read (default: first)
    #[arg(long)]
    sheet: Option<String>,

    /// Re-read the source on every pass instead of loading it up front
    #[arg(long)]
    lazy: bool,

    /// Output file; `.xlsx` cells are written into the workbook (created if
    /// missing), anything else is appended to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Top-left cell for spreadsheet output
    #[arg(long, default_value = "A1")]
    origin: String,

    /// Worksheet of the output workbook to write into (default: first)
    #[arg(long)]
    output_sheet: Option<String>,

    /// Format used when printing to stdout
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level_from_verbosity(cli.verbose));

    let config = Config::new().with_progress(!cli.quiet);
    let (from, to) = split_range(&cli.range);

    if is_spreadsheet(&cli.input) {
        let sheet = open_workbook_sheet(&cli.input, cli.sheet.as_deref())
            .with_context(|| format!("Failed to open spreadsheet: {}", cli.input.display()))?;
        let span = match to {
            Some(to) => Span::Between(from, to),
            None => Span::Single(from),
        };
        let table = read_excel_range(sheet, span, cli.lazy, config)
            .with_context(|| format!("Failed to read range {}", cli.range))?;
        emit(table, &cli)
    } else {
        let from = parse_line_number(from)?;
        let span = match to {
            Some(to) => Span::Between(from, parse_line_number(to)?),
            None => Span::Single(from),
        };
        let table = read_csv_range(&cli.input, span, cli.lazy, config)
            .with_context(|| format!("Failed to read file: {}", cli.input.display()))?;
        emit(table, &cli)
    }
}

fn emit(mut table: Table<'_>, cli: &Cli) -> Result<()> {
    match &cli.output {
        Some(path) if is_xlsx(path) && path.exists() => {
            let mut editor = XlsxEditor::open(path, cli.output_sheet.as_deref())
                .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
            table
                .write_spreadsheet(&mut editor, &cli.origin)
                .with_context(|| format!("Failed to write cells at {}", cli.origin))?;
            editor
                .save(path)
                .with_context(|| format!("Failed to save workbook: {}", path.display()))?;
        }
        Some(path) if is_xlsx(path) => {
            let mut workbook = Workbook::new();
            let worksheet = workbook.add_worksheet();
            if let Some(name) = &cli.output_sheet {
                worksheet.set_name(name)?;
            }
            table
                .write_spreadsheet(worksheet, &cli.origin)
                .with_context(|| format!("Failed to write cells at {}", cli.origin))?;
            workbook
                .save(path)
                .with_context(|| format!("Failed to save workbook: {}", path.display()))?;
        }
        Some(path) => {
            table.write_delimited(path)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            match cli.format {
                OutputFormat::Text => {
                    table.write_delimited_to(&mut out)?;
                }
                OutputFormat::Json => {
                    serde_json::to_writer(&mut out, table.materialize()?)?;
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}

fn split_range(range: &str) -> (&str, Option<&str>) {
    match range.split_once(':') {
        Some((from, to)) => (from.trim(), Some(to.trim())),
        None => (range.trim(), None),
    }
}

fn parse_line_number(s: &str) -> Result<usize> {
    s.parse()
        .with_context(|| format!("Invalid line number: {}", s))
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn is_spreadsheet(path: &Path) -> bool {
    matches!(extension(path).as_str(), "xlsx" | "xlsm" | "xlsb" | "xls" | "ods")
}

fn is_xlsx(path: &Path) -> bool {
    extension(path) == "xlsx"
}
