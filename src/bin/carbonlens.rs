//! CLI binary for carbonlens.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig` and renders results.

use anyhow::{Context, Result};
use carbonlens::{analyze_input, analyze_stream, AnalysisConfig, AnalysisOutput};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a photo
  carbonlens desk.jpg

  # Analyze several photos concurrently
  carbonlens kitchen.jpg office.jpg garage.jpg

  # Use a specific model
  carbonlens --model gpt-4.1 --provider openai desk.jpg

  # Analyze a photo from a URL
  carbonlens https://photos.example.org/desk.jpg

  # Assume EU grid intensity
  carbonlens --region EU desk.jpg

  # Structured JSON output
  carbonlens --json desk.jpg > analysis.json

SUPPORTED PROVIDERS & MODELS:
  Provider     Model                        Vision
  ─────────    ───────────────────────────  ──────
  openai       gpt-4.1-mini (default)       ✓
  openai       gpt-4.1, gpt-4o              ✓
  anthropic    claude-sonnet-4-20250514     ✓
  gemini       gemini-2.0-flash             ✓
  ollama       llava, llama3.2-vision       ✓

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY           OpenAI API key
  ANTHROPIC_API_KEY        Anthropic API key
  GEMINI_API_KEY           Google Gemini API key
  CARBONLENS_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  CARBONLENS_MODEL         Override model ID

SETUP:
  1. Set API key:   export OPENAI_API_KEY=sk-...
  2. Analyze:       carbonlens photo.jpg
"#;

/// Estimate the carbon footprint of objects in photos using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "carbonlens",
    version,
    about = "Estimate the carbon footprint of objects in photos using Vision LLMs",
    long_about = "Detect the objects in a photo (local file or URL) and estimate their \
manufacturing, operational, and lifetime carbon footprints using Vision Language Models. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image file paths and/or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "CARBONLENS_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "CARBONLENS_PROVIDER")]
    provider: Option<String>,

    /// Region assumed for grid intensity when the photo gives no cue.
    #[arg(long, env = "CARBONLENS_REGION", default_value = "Global")]
    region: String,

    /// Number of concurrent model calls for multi-photo runs.
    #[arg(short, long, env = "CARBONLENS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Max LLM output tokens per photo.
    #[arg(long, env = "CARBONLENS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "CARBONLENS_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per photo on LLM failure.
    #[arg(long, env = "CARBONLENS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Maximum image dimension in pixels before upload.
    #[arg(long, env = "CARBONLENS_MAX_PIXELS", default_value_t = 1280)]
    max_image_pixels: u32,

    /// Output structured JSON instead of the report.
    #[arg(long, env = "CARBONLENS_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "CARBONLENS_NO_SPINNER")]
    no_spinner: bool,

    /// Enable DEBUG-level tracing logs (shows every field repair).
    #[arg(short, long, env = "CARBONLENS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "CARBONLENS_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CARBONLENS_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Per-photo LLM call timeout in seconds.
    #[arg(long, env = "CARBONLENS_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner owns the terminal while a call is in flight; suppress
    // INFO-level library logs unless the user asked for them.
    let show_spinner = !cli.quiet && !cli.no_spinner && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_spinner {
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

    let config = build_config(&cli)?;

    if cli.inputs.len() == 1 {
        run_single(&cli, &config, show_spinner).await
    } else {
        run_batch(&cli, &config).await
    }
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli) -> Result<AnalysisConfig> {
    let builder = AnalysisConfig::builder()
        .default_region(cli.region.as_str())
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .max_image_pixels(cli.max_image_pixels)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    let mut config = builder.build().context("Invalid configuration")?;

    // Fields the builder intentionally leaves optional.
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();

    Ok(config)
}

/// Analyze one photo with an optional spinner.
async fn run_single(cli: &Cli, config: &AnalysisConfig, show_spinner: bool) -> Result<()> {
    let input = &cli.inputs[0];

    let spinner = if show_spinner {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_message(format!("Analyzing {input}…"));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let outcome = analyze_input(input, config).await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let output = outcome.with_context(|| format!("Analysis failed for '{input}'"))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else {
        print_report(input, &output);
    }
    Ok(())
}

/// Analyze several photos concurrently, printing each as it completes.
async fn run_batch(cli: &Cli, config: &AnalysisConfig) -> Result<()> {
    let total = cli.inputs.len();
    let mut stream =
        analyze_stream(cli.inputs.clone(), config).context("Failed to start batch analysis")?;

    let mut failures = 0usize;
    let mut json_items: Vec<serde_json::Value> = Vec::new();
    let mut done = 0usize;

    while let Some((input, outcome)) = stream.next().await {
        done += 1;
        match outcome {
            Ok(output) => {
                if cli.json {
                    json_items.push(serde_json::json!({ "input": input, "analysis": output }));
                } else {
                    eprintln!(
                        "{} [{done}/{total}] {}",
                        green("✓"),
                        bold(&input)
                    );
                    print_report(&input, &output);
                }
            }
            Err(e) => {
                failures += 1;
                if cli.json {
                    json_items.push(serde_json::json!({ "input": input, "error": e.to_string() }));
                } else {
                    eprintln!("{} [{done}/{total}] {}  {}", red("✗"), bold(&input), red(&e.to_string()));
                }
            }
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json_items).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        if failures == 0 {
            eprintln!("{} {} photos analyzed", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} photos analyzed  ({} failed)",
                cyan("⚠"),
                total - failures,
                total,
                red(&failures.to_string()),
            );
        }
    }

    if failures == total && total > 0 {
        anyhow::bail!("All {total} photos failed");
    }
    Ok(())
}

/// Render one analysis as a human-readable report.
fn print_report(input: &str, output: &AnalysisOutput) {
    let result = &output.result;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let _ = writeln!(
        out,
        "{} {} — {} object(s), image quality: {}",
        cyan("◆"),
        bold(input),
        result.number_of_objects_detected,
        result.image_quality,
    );

    let mut total_kg = 0.0;
    let mut total_trees = 0u64;
    for obj in &result.objects {
        let fp = &obj.carbon_footprint;
        total_kg += fp.lifetime_total_kg_co2;
        total_trees += fp.trees_required;

        let _ = writeln!(
            out,
            "  {:<24} {:>10.1} kg CO2e  {:>5} tree(s)  {}",
            obj.name,
            fp.lifetime_total_kg_co2,
            fp.trees_required,
            dim(&format!("confidence {:.2}", fp.confidence_score)),
        );
        let _ = writeln!(
            out,
            "    {}",
            dim(&format!(
                "{:.1} kg manufacturing · {:.2} kg/day · {:.0}-year lifespan · {} source(s)",
                fp.manufacturing_kg_co2,
                fp.daily_operation_kg_co2,
                obj.metadata.assumed_lifespan_years,
                fp.sources.len(),
            )),
        );
    }

    let _ = writeln!(
        out,
        "  {} {:.1} kg CO2e total · {} tree(s) to offset · region {}",
        bold("Σ"),
        total_kg,
        total_trees,
        result.default_region,
    );
    let _ = writeln!(
        out,
        "  {}",
        dim(&format!(
            "{} in / {} out tokens · {}ms · model {}",
            output.stats.input_tokens,
            output.stats.output_tokens,
            output.stats.total_duration_ms,
            result.model_version,
        )),
    );
}
