//! CLI binary for pdf-litreview.
//!
//! A thin shim over the library crate: maps flags to `ReviewConfig`,
//! prints the review to stdout as it streams in, and writes the finished
//! Markdown to a file.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_litreview::config::{
    DEFAULT_BASE_URL, DEFAULT_CHAR_BUDGET, DEFAULT_MODEL, DEFAULT_OUTPUT_FILE,
};
use pdf_litreview::{
    extract_only, generate_review, generate_review_stream, read_documents, write_review,
    ProgressCallback, ReviewConfig, ReviewProgressCallback, ReviewSession, UploadedDocument,
};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar over the uploaded papers, turning into a spinner while the
/// model is thinking.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Remove the bar before review text goes to stdout.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ReviewProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_documents: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} papers  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_documents as u64);
        self.bar.set_prefix("Extracting");
    }

    fn on_document_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(
        &self,
        index: usize,
        total: usize,
        name: &str,
        chars: usize,
        truncated: bool,
    ) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  {}{}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{chars} chars")),
            if truncated { dim(" (truncated)") } else { String::new() },
        ));
    }

    fn on_document_error(&self, index: usize, total: usize, _name: &str, error: &str) {
        self.bar.println(format!("  {} {:>3}/{:<3} {}", red("✗"), index, total, red(error)));
    }

    fn on_progress(&self, fraction: f32) {
        let len = self.bar.length().unwrap_or(0);
        self.bar.set_position((fraction * len as f32).round() as u64);
    }

    fn on_extraction_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        self.bar.println(format!(
            "{} {}/{} papers extracted{}",
            mark,
            bold(&success_count.to_string()),
            total,
            if failed > 0 {
                format!("  ({} failed)", red(&failed.to_string()))
            } else {
                String::new()
            },
        ));
    }

    fn on_generation_start(&self, model: &str, corpus_chars: usize) {
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        self.bar.set_prefix("Generating");
        self.bar.set_message(format!("{model} reading {corpus_chars} chars…"));
    }

    fn on_generation_complete(&self, _review_chars: usize, _complete: bool) {
        self.clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review a folder of papers; the review streams to the terminal and is
  # saved to Literature_Review_Interpolation.md
  litreview papers/*.pdf

  # Choose the output file
  litreview a.pdf b.pdf -o review.md

  # Any OpenAI-compatible endpoint
  litreview --base-url https://api.deepseek.com/v1 --model deepseek-chat papers/*.pdf

  # Give each paper more room in the prompt (long-context models)
  litreview --max-chars-per-paper 20000 papers/*.pdf

  # Check what will be sent, without an API key
  litreview --extract-only papers/*.pdf

  # Machine-readable output
  litreview --json papers/*.pdf > review.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY    API key (required unless --extract-only)
  OPENAI_BASE_URL   API base URL
  LITREVIEW_MODEL   Model ID
  PDFIUM_LIB_PATH   Path to libpdfium; otherwise the system loader path is searched
  RUST_LOG          Log filter, overrides -v / -q
"#;

/// Write a literature review from a batch of PDF papers.
#[derive(Parser, Debug)]
#[command(
    name = "litreview",
    version,
    about = "Write a structured literature review from PDF papers with a streaming LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to review, in order.
    inputs: Vec<PathBuf>,

    /// Write the review to this file.
    #[arg(short, long, env = "LITREVIEW_OUTPUT", default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    /// API key for the chat-completions endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API base URL; `/chat/completions` is appended.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Chat model ID.
    #[arg(long, env = "LITREVIEW_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Characters of text embedded per paper.
    #[arg(long, env = "LITREVIEW_MAX_CHARS", default_value_t = DEFAULT_CHAR_BUDGET,
          value_parser = parse_budget)]
    max_chars_per_paper: usize,

    /// Sampling temperature (0.0–2.0). Service default when unset.
    #[arg(long, env = "LITREVIEW_TEMPERATURE")]
    temperature: Option<f32>,

    /// Maximum tokens to generate. Service default when unset.
    #[arg(long, env = "LITREVIEW_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Connect timeout in seconds.
    #[arg(long, env = "LITREVIEW_CONNECT_TIMEOUT", default_value_t = 30)]
    connect_timeout: u64,

    /// Overall request timeout in seconds, including streaming.
    #[arg(long, env = "LITREVIEW_TIMEOUT", default_value_t = 600)]
    timeout: u64,

    /// Extract and print the corpus; do not contact the model.
    #[arg(long)]
    extract_only: bool,

    /// Print structured JSON instead of streaming Markdown.
    #[arg(long, env = "LITREVIEW_JSON")]
    json: bool,

    /// Do not echo the review to stdout while it streams.
    #[arg(long, env = "LITREVIEW_NO_LIVE")]
    no_live: bool,

    /// Disable the progress bar.
    #[arg(long, env = "LITREVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LITREVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LITREVIEW_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the bar; keep them quiet while
    // it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && io::stderr().is_terminal();
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

    // ── Read inputs ──────────────────────────────────────────────────────
    let (documents, unreadable) = read_documents(&cli.inputs).await;
    for e in &unreadable {
        eprintln!("{} {}", red("✗"), e);
    }
    if documents.is_empty() && !unreadable.is_empty() {
        anyhow::bail!("None of the {} input file(s) could be read", unreadable.len());
    }

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|cb| cb as ProgressCallback))?;

    if cli.extract_only {
        return run_extract_only(&cli, &documents, &config, progress.as_deref()).await;
    }
    if cli.json {
        return run_json(&cli, &documents, &config).await;
    }
    run_live(&cli, &documents, &config, progress).await
}

/// Print the corpus (or the extraction report as JSON) and stop.
async fn run_extract_only(
    cli: &Cli,
    documents: &[UploadedDocument],
    config: &ReviewConfig,
    progress: Option<&CliProgressCallback>,
) -> Result<()> {
    let report = extract_only(documents, config)
        .await
        .context("Extraction failed")?;
    if let Some(cb) = progress {
        cb.clear();
    }
    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(report.corpus.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !cli.quiet {
            eprintln!(
                "{} papers embedded, {} chars",
                report.success_count(),
                report.corpus.chars()
            );
        }
    }
    Ok(())
}

/// Generate eagerly and print the whole `ReviewOutput` as JSON.
async fn run_json(cli: &Cli, documents: &[UploadedDocument], config: &ReviewConfig) -> Result<()> {
    let output = generate_review(documents, config)
        .await
        .context("Review generation failed")?;
    let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
    println!("{json}");

    if output.complete {
        write_review(&cli.output, &output.markdown).await?;
        Ok(())
    } else {
        let path = partial_path(&cli.output);
        write_review(&path, &output.markdown).await?;
        anyhow::bail!(
            "Review was interrupted; partial review saved to {}",
            path.display()
        )
    }
}

/// Stream the review to stdout while it is written, then save it.
async fn run_live(
    cli: &Cli,
    documents: &[UploadedDocument],
    config: &ReviewConfig,
    progress: Option<Arc<CliProgressCallback>>,
) -> Result<()> {
    let start = Instant::now();
    let live = !cli.no_live && !cli.quiet;
    let ReviewSession {
        report,
        mut snapshots,
    } = generate_review_stream(documents, config)
        .await
        .context("Review generation failed")?;

    let stdout = io::stdout();
    let mut printed = 0usize;
    let mut fragments = 0usize;
    let mut review = String::new();

    while let Some(item) = snapshots.next().await {
        match item {
            Ok(snapshot) => {
                if live && snapshot.text.len() > printed {
                    if let Some(ref cb) = progress {
                        cb.clear();
                    }
                    let mut handle = stdout.lock();
                    handle
                        .write_all(&snapshot.text.as_bytes()[printed..])
                        .and_then(|_| handle.flush())
                        .context("Failed to write to stdout")?;
                    printed = snapshot.text.len();
                } else if let Some(ref cb) = progress {
                    cb.bar
                        .set_message(format!("{} chars received", snapshot.text.chars().count()));
                }
                fragments = snapshot.fragments;
                review = snapshot.text;
            }
            Err(interrupted) => {
                if let Some(ref cb) = progress {
                    cb.clear();
                }
                if live && printed > 0 {
                    println!();
                }
                let path = partial_path(&cli.output);
                write_review(&path, &interrupted.partial).await?;
                eprintln!(
                    "{} {}\n  partial review ({} chars) saved to {}",
                    red("✘"),
                    interrupted,
                    interrupted.partial.chars().count(),
                    bold(&path.display().to_string())
                );
                anyhow::bail!("Review generation was interrupted");
            }
        }
    }

    if let Some(ref cb) = progress {
        cb.clear();
    }
    if live && !review.ends_with('\n') {
        println!();
    }

    write_review(&cli.output, &review).await?;

    if !cli.quiet {
        eprintln!(
            "{}  {} papers  {} chars  {} fragments  {}ms  →  {}",
            if report.failure_count() == 0 { green("✔") } else { cyan("⚠") },
            report.success_count(),
            review.chars().count(),
            fragments,
            start.elapsed().as_millis(),
            bold(&cli.output.display().to_string()),
        );
    }
    Ok(())
}

/// Map CLI args to `ReviewConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReviewConfig> {
    let mut builder = ReviewConfig::builder()
        .base_url(cli.base_url.clone())
        .model(cli.model.clone())
        .char_budget(cli.max_chars_per_paper)
        .connect_timeout_secs(cli.connect_timeout)
        .request_timeout_secs(cli.timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn parse_budget(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// `review.md` → `review.partial.md`, next to the requested output.
fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "review".to_string());
    output.with_file_name(format!("{stem}.partial.md"))
}
