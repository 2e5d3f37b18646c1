//! Fill a DOCX template from spreadsheet rows, one output document per row.
//!
//! Usage:
//!   docx-merge init --template letter.docx --items "姓名；部门" [--format F]
//!   docx-merge run [--config docx-merge.json] [--template T] [--data D] \
//!     [--output-dir O] [--format F] [--color red|black] [--jobs N]
//!
//! `init` splits the replace items, scaffolds the data workbook whose header
//! row is the token list, and saves the settings. After the workbook is
//! filled in (one record per row), `run` produces the documents.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

use docx_merge::batch::{run_batch, BatchOptions, RecordSource};
use docx_merge::config::{HighlightColor, MergeConfig};
use docx_merge::docx::{DocxSaver, DocxTemplateLoader};
use docx_merge::sheet::{create_template_workbook, CsvSource, XlsxSource};
use docx_merge::tokens::split_replace_items;

#[derive(Parser)]
#[command(name = "docx-merge", about = "Fill a DOCX template from spreadsheet rows")]
struct Cli {
    /// Settings file (created by `init`, read by `run`)
    #[arg(long, global = true, default_value = "docx-merge.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold the data workbook and save settings
    Init {
        /// DOCX template file
        #[arg(long)]
        template: PathBuf,

        /// Replace items; names can share one flag joined by the delimiter
        #[arg(long, required = true)]
        items: Vec<String>,

        /// Output filename format pattern (may contain token names)
        #[arg(long)]
        format: Option<String>,

        /// Where to write the data workbook
        /// (default: an Output/ directory next to the template)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Separator between token names inside one item
        #[arg(long)]
        delimiter: Option<char>,
    },

    /// Process every data row into an output document
    Run {
        /// DOCX template file (overrides the settings file)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Data file, .xlsx/.xlsm or .csv (overrides the settings file)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Directory for the output documents (overrides the settings file)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output filename format pattern (overrides the settings file)
        #[arg(long)]
        format: Option<String>,

        /// Color applied to substituted runs
        #[arg(long, value_enum)]
        color: Option<HighlightColor>,

        /// Separator between token names inside one item
        #[arg(long)]
        delimiter: Option<char>,

        /// Replace items (overrides the settings file)
        #[arg(long)]
        items: Vec<String>,

        /// Worker threads; 1 processes rows sequentially
        #[arg(long, default_value_t = 1)]
        jobs: usize,
    },
}

fn default_output_dir(template: &Path) -> PathBuf {
    template
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("Output")
}

fn init(
    config_path: &Path,
    template: PathBuf,
    items: Vec<String>,
    format: Option<String>,
    data: Option<PathBuf>,
    delimiter: Option<char>,
) -> Result<()> {
    if !template.exists() {
        bail!("template not found: {}", template.display());
    }

    let mut config = MergeConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(d) = delimiter {
        config.delimiter = d;
    }

    let tokens = split_replace_items(&items, config.delimiter);
    if tokens.is_empty() {
        bail!("no token names left after splitting the replace items");
    }

    let output_dir = default_output_dir(&template);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let data_path = data.unwrap_or_else(|| output_dir.join("template.xlsx"));

    create_template_workbook(&data_path, &tokens)?;
    println!("Created data workbook: {}", data_path.display());
    println!("  columns: {}", tokens.join(", "));

    config.template = Some(template);
    config.data_path = Some(data_path);
    config.output_dir = Some(output_dir);
    config.replace_items = items;
    if format.is_some() {
        config.output_format = format;
    }
    config
        .save(config_path)
        .with_context(|| format!("Failed to save {}", config_path.display()))?;
    println!("Saved settings: {}", config_path.display());
    println!("Fill in the workbook, then start `docx-merge run`.");
    Ok(())
}

fn open_source(path: &Path) -> Result<Box<dyn RecordSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" => Ok(Box::new(XlsxSource::open(path)?)),
        "csv" => Ok(Box::new(CsvSource::open(path)?)),
        other => bail!("unsupported data file extension {other:?} (expected xlsx, xlsm, or csv)"),
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    config_path: &Path,
    template: Option<PathBuf>,
    data: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    format: Option<String>,
    color: Option<HighlightColor>,
    delimiter: Option<char>,
    items: Vec<String>,
    jobs: usize,
) -> Result<()> {
    let mut config = MergeConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if template.is_some() {
        config.template = template;
    }
    if data.is_some() {
        config.data_path = data;
    }
    if output_dir.is_some() {
        config.output_dir = output_dir;
    }
    if format.is_some() {
        config.output_format = format;
    }
    if let Some(c) = color {
        config.color = c;
    }
    if let Some(d) = delimiter {
        config.delimiter = d;
    }
    if !items.is_empty() {
        config.replace_items = items;
    }

    let Some(template) = config.template.clone() else {
        bail!("no template configured (use --template or run `init` first)");
    };
    let Some(data_path) = config.data_path.clone() else {
        bail!("no data file configured (use --data or run `init` first)");
    };
    let Some(pattern) = config.output_format.clone() else {
        bail!("no output filename format configured (use --format)");
    };
    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(&template));

    let tokens = split_replace_items(&config.replace_items, config.delimiter);
    if tokens.is_empty() {
        bail!("no replace items configured (use --items or run `init` first)");
    }

    println!("Reading data: {}", data_path.display());
    let source = open_source(&data_path)?;
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let options = BatchOptions {
        tokens,
        output_pattern: pattern,
        output_dir,
        color: config.color,
        jobs,
    };
    let loader = DocxTemplateLoader::new(&template);

    let report = run_batch(source.as_ref(), &loader, &DocxSaver, &options, |p| {
        eprint!("\r[{}/{}] processing... ({} failed)", p.completed, p.total, p.failed);
        std::io::stderr().flush().ok();
        true
    })?;
    eprintln!();

    println!(
        "Processed {} rows: {} written, {} failed",
        report.attempted,
        report.succeeded(),
        report.failed()
    );
    for failure in &report.failures {
        println!("  row {}: {}", failure.row + 1, failure.error);
    }
    if report.succeeded() == 0 {
        bail!("no output documents were written");
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Init {
            template,
            items,
            format,
            data,
            delimiter,
        } => init(&cli.config, template, items, format, data, delimiter),
        Command::Run {
            template,
            data,
            output_dir,
            format,
            color,
            delimiter,
            items,
            jobs,
        } => run(
            &cli.config,
            template,
            data,
            output_dir,
            format,
            color,
            delimiter,
            items,
            jobs,
        ),
    }
}
