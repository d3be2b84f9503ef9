//! CLI binary for edgequake-docflow.
//!
//! A thin shim over the library crate: maps flags to `ClientConfig`, drives
//! one workflow per invocation and prints the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_docflow::config::{BASE_URL_ENV, TIMEOUT_ENV};
use edgequake_docflow::{
    formats, ClientConfig, DocflowClient, NoticeLevel, Notification, Notifier, ProgressCallback,
    ResultPresenter, SharedNotifier, StagedFile, UploadProgressCallback, Workflow, WorkflowResult,
    WorkflowState,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar per request, created on start and cleared on completion.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }
}

impl UploadProgressCallback for CliProgressCallback {
    fn on_request_start(&self, endpoint: &str) {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Uploading");
        bar.set_message(endpoint.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_progress(&self, _endpoint: &str, percent: u8) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(ref bar) = *slot {
                bar.set_position(u64::from(percent));
            }
        }
    }

    fn on_request_complete(&self, _endpoint: &str, _success: bool) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

// ── Notifications on stderr ──────────────────────────────────────────────────

struct CliNotifier {
    /// Only warnings and errors are shown.
    quiet: bool,
}

impl Notifier for CliNotifier {
    fn notify(&self, n: Notification) {
        let mark = match n.level {
            NoticeLevel::Success => green("✔"),
            NoticeLevel::Info => dim("•"),
            NoticeLevel::Warning => yellow("⚠"),
            NoticeLevel::Error => red("✘"),
        };
        if self.quiet && matches!(n.level, NoticeLevel::Success | NoticeLevel::Info) {
            return;
        }
        match n.description {
            Some(ref d) => eprintln!("{mark} {}  {}", bold(&n.title), dim(d)),
            None => eprintln!("{mark} {}", bold(&n.title)),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Index documents with explicit labels
  docflow index contract.pdf notes.txt --label "Contract 2024" --label "Meeting notes"

  # Ask a question about the indexed documents
  docflow search "What is the termination clause?" --top-k 3

  # One-click summary
  docflow summarize

  # Convert a Word document to PDF
  docflow convert report.docx --to pdf -o out/

  # Extract text from a scan
  docflow ocr receipt.png -o receipt.txt

  # Show which conversions are possible
  docflow formats
  docflow formats png

ENVIRONMENT VARIABLES:
  DOCFLOW_API_BASE_URL     Backend base URL (default http://localhost:8000)
  DOCFLOW_REQUEST_TIMEOUT  Whole-request timeout in seconds (default: none)
  RUST_LOG                 Overrides the log filter
"#;

/// Index, search, convert and OCR documents against an EdgeQuake backend.
#[derive(Parser, Debug)]
#[command(
    name = "docflow",
    version,
    about = "Index, search, convert and OCR documents against an EdgeQuake backend",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL.
    #[arg(long, global = true, env = BASE_URL_ENV, default_value = "http://localhost:8000")]
    base_url: String,

    /// Whole-request timeout in seconds. No timeout when unset.
    #[arg(long, global = true, env = TIMEOUT_ENV)]
    timeout: Option<u64>,

    /// Print results as JSON on stdout.
    #[arg(long, global = true, env = "DOCFLOW_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOCFLOW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCFLOW_VERBOSE")]
    verbose: bool,

    /// Hide progress, notifications and status lines. Results still go to
    /// stdout.
    #[arg(short, long, global = true, env = "DOCFLOW_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload pdf, docx or txt files for AI indexing.
    Index {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Metadata label for the file in the same position. Files without
        /// one are labelled with their name.
        #[arg(long = "label")]
        labels: Vec<String>,
    },

    /// Ask a question about the indexed documents.
    Search {
        query: String,

        /// Number of matches to return (1–20).
        #[arg(long, env = "DOCFLOW_TOP_K")]
        top_k: Option<usize>,
    },

    /// Summarize the indexed documents.
    Summarize,

    /// Convert one file to another format.
    Convert {
        file: PathBuf,

        /// Target format, e.g. pdf, docx, txt, jpg.
        #[arg(long = "to")]
        to: String,

        /// Output file, or a directory to save under the suggested name.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract text from an image or document.
    Ocr {
        file: PathBuf,

        /// Write the text to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported conversions, optionally for one source extension.
    Formats { extension: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise next to the progress bar.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Command::Formats { ref extension } = cli.command {
        return print_formats(extension.as_deref(), cli.json);
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn UploadProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let notifier: SharedNotifier = Arc::new(CliNotifier {
        quiet: cli.quiet || cli.json,
    });
    let transport = Arc::new(
        edgequake_docflow::HttpTransport::new(&config).context("Failed to create HTTP client")?,
    );
    let client = DocflowClient::with_parts(config, transport, notifier);
    let presenter = ResultPresenter::new();

    match &cli.command {
        Command::Index { files, labels } => {
            check_label_count(files.len(), labels.len())?;
            let mut staged = Vec::with_capacity(files.len());
            for (i, path) in files.iter().enumerate() {
                let mut file = StagedFile::from_path(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                if let Some(label) = labels.get(i) {
                    file = file.with_label(label.clone());
                }
                staged.push(file);
            }

            let mut research = client.research();
            research.stage(staged).context("No files could be staged")?;
            research.submit().await.context("Upload rejected")?;
            let receipt = settled(research.state(), cli.json)?;
            emit(&cli, &presenter, WorkflowResult::Indexed(receipt), receipt)?;
        }

        Command::Search { query, top_k } => {
            let mut research = client.research();
            research.search(query, *top_k).await.context("Search rejected")?;
            let answer = settled(research.search_state(), cli.json)?;
            emit(&cli, &presenter, WorkflowResult::Answer(answer), answer)?;
        }

        Command::Summarize => {
            let mut research = client.research();
            research.summarize().await.context("Summary rejected")?;
            let answer = settled(research.search_state(), cli.json)?;
            emit(&cli, &presenter, WorkflowResult::Answer(answer), answer)?;
        }

        Command::Convert { file, to, output } => {
            let source = StagedFile::from_path(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let mut convert = client.convert();
            convert.stage(vec![source]).context("File not accepted")?;
            convert.choose_target(to).context("Target format not accepted")?;
            convert.submit().await.context("Conversion rejected")?;
            let converted = settled(convert.state(), cli.json)?;

            let saved = match output {
                Some(path) if path.is_dir() => converted.save_into(path).await,
                Some(path) => converted.save_to(path).await,
                None => converted.save_into(".").await,
            }
            .context("Failed to save converted file")?;

            if cli.json {
                let out = json!({
                    "source_name": converted.source_name,
                    "target_format": converted.target_format,
                    "bytes": converted.len(),
                    "saved_to": saved,
                });
                println!("{}", serde_json::to_string_pretty(&out).context("Failed to serialise output")?);
            } else {
                print!("{}", presenter.render(WorkflowResult::Converted(converted)));
                if !cli.quiet {
                    eprintln!("   → {}", bold(&saved.display().to_string()));
                }
            }
        }

        Command::Ocr { file, output } => {
            let source = StagedFile::from_path(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let mut ocr = client.ocr();
            ocr.stage(vec![source]).context("File not accepted")?;
            ocr.submit().await.context("OCR rejected")?;
            let text = settled(ocr.state(), cli.json)?;

            if let Some(path) = output {
                tokio::fs::write(path, &text.text)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.quiet && !cli.json {
                    eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
                }
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(text).context("Failed to serialise output")?);
            } else if output.is_none() {
                print!("{}", presenter.render(WorkflowResult::Extracted(text)));
            }
        }

        Command::Formats { extension } => print_formats(extension.as_deref(), cli.json)?,
    }

    Ok(())
}

/// Each `--label` pairs with the file in the same position, so a surplus
/// label has nothing to describe.
fn check_label_count(files: usize, labels: usize) -> Result<()> {
    if labels > files {
        anyhow::bail!("{labels} labels given for {files} file(s); pass at most one --label per file");
    }
    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder().base_url(&cli.base_url);
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// The result of a finished workflow, or its failure as an error.
///
/// In JSON mode the failure is also printed on stdout so scripts can read it.
fn settled<R>(state: &WorkflowState<R>, json: bool) -> Result<&R> {
    match state {
        WorkflowState::Succeeded(r) => Ok(r),
        WorkflowState::Failed(f) => {
            if json {
                let out = json!({ "error": f });
                println!("{}", serde_json::to_string_pretty(&out).context("Failed to serialise output")?);
            }
            Err(anyhow::Error::new(f.clone()))
        }
        other => anyhow::bail!("Request did not finish (stage: {})", other.stage()),
    }
}

fn emit<T: serde::Serialize>(
    cli: &Cli,
    presenter: &ResultPresenter,
    result: WorkflowResult<'_>,
    value: &T,
) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(value).context("Failed to serialise output")?);
    } else {
        print!("{}", presenter.render(result));
    }
    Ok(())
}

fn print_formats(extension: Option<&str>, as_json: bool) -> Result<()> {
    let rows: Vec<(&str, &[&str])> = match extension {
        Some(ext) => {
            let ext = ext.trim_start_matches('.');
            let targets = formats::allowed_targets(ext)
                .with_context(|| format!("No conversions available for .{ext}"))?;
            formats::supported_sources()
                .filter(|s| s.eq_ignore_ascii_case(ext))
                .map(|s| (s, targets))
                .collect()
        }
        None => formats::supported_sources()
            .filter_map(|s| formats::allowed_targets(s).map(|t| (s, t)))
            .collect(),
    };

    if as_json {
        let map: serde_json::Map<String, serde_json::Value> = rows
            .iter()
            .map(|(s, t)| (s.to_string(), json!(t)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map).context("Failed to serialise output")?);
    } else {
        for (source, targets) in rows {
            println!("{:<6} → {}", source, targets.join(", "));
        }
    }
    Ok(())
}
