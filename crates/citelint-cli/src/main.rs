use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use citelint_core::lookup::CrossRef;
use citelint_core::{CheckStats, Config, ProgressEvent, config_file};
use citelint_parsing::{CitationExtractor, ParsingConfig, ParsingConfigBuilder};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

use output::ColorMode;

/// Citation checker - verify that the works cited by a document exist
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the citations of a plain-text document and verify each one
    Check(CheckArgs),

    /// Verify a single DOI
    VerifyDoi {
        /// DOI, `doi:` identifier, or doi.org URL
        doi: String,

        #[command(flatten)]
        lookup: LookupArgs,

        /// Emit the result as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Path to the plain-text document to check
    file_path: PathBuf,

    #[command(flatten)]
    lookup: LookupArgs,

    /// Citations verified concurrently per batch (1 = sequential)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Pause between lookups in milliseconds (between batches when batching)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Reject title matches whose similarity is below this value (0.0-1.0)
    #[arg(long)]
    min_similarity: Option<f64>,

    /// Dry run: extract and print citations without querying CrossRef
    #[arg(long)]
    dry_run: bool,

    /// Emit results and summary as JSON
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Path to output report file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LookupArgs {
    /// Contact email for the CrossRef polite pool
    #[arg(long)]
    mailto: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Check(args) => {
            let file = config_file::load_config();
            let parsing = parsing_config(&file)?;
            if args.dry_run {
                dry_run(&args, parsing)
            } else {
                let config = resolve_config(&file, &args.lookup, Some(&args))?;
                check(&args, config, parsing).await
            }
        }
        Command::VerifyDoi {
            doi,
            lookup,
            json,
            no_color,
        } => {
            let file = config_file::load_config();
            let config = resolve_config(&file, &lookup, None)?;
            verify_doi(&doi, config, json, no_color).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("citelint={}", level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Resolve configuration: defaults < config files < env vars < CLI flags.
fn resolve_config(
    file: &config_file::ConfigFile,
    lookup: &LookupArgs,
    check: Option<&CheckArgs>,
) -> anyhow::Result<Config> {
    let mut config = config_file::apply(Config::default(), file);

    if let Ok(mailto) = std::env::var("CROSSREF_MAILTO")
        && !mailto.trim().is_empty()
    {
        config.crossref_mailto = Some(mailto.trim().to_string());
    }
    if let Some(secs) = std::env::var("CITELINT_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.timeout_secs = secs;
    }

    if let Some(ref mailto) = lookup.mailto {
        config.crossref_mailto = Some(mailto.clone());
    }
    if let Some(secs) = lookup.timeout {
        config.timeout_secs = secs;
    }
    if let Some(args) = check {
        if let Some(n) = args.batch_size {
            config.batch_size = n;
        }
        if let Some(ms) = args.delay_ms {
            let delay = Duration::from_millis(ms);
            config.request_delay = delay;
            config.batch_delay = delay;
        }
        if args.min_similarity.is_some() {
            config.min_title_similarity = args.min_similarity;
        }
    }

    config.validate()?;
    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

fn parsing_config(file: &config_file::ConfigFile) -> anyhow::Result<ParsingConfig> {
    let mut builder = ParsingConfigBuilder::new();
    if let Some(ref section) = file.parsing {
        builder = builder.with_file_section(section);
    }
    builder
        .build()
        .context("invalid regex in [parsing] configuration")
}

fn open_writer(output: &Option<PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    })
}

fn read_document(path: &Path) -> anyhow::Result<(String, String)> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok((text, file_name))
}

fn dry_run(args: &CheckArgs, parsing: ParsingConfig) -> anyhow::Result<()> {
    let (text, file_name) = read_document(&args.file_path)?;
    let extraction = CitationExtractor::with_config(parsing).extract(&text)?;

    let color = ColorMode(!args.no_color && args.output.is_none() && !args.json);
    let mut writer = open_writer(&args.output)?;
    if args.json {
        output::write_json_citations(&mut writer, &extraction.citations)
    } else {
        output::print_dry_run(&mut writer, &file_name, &extraction, color)?;
        Ok(())
    }
}

async fn check(args: &CheckArgs, config: Config, parsing: ParsingConfig) -> anyhow::Result<()> {
    let (text, file_name) = read_document(&args.file_path)?;
    let extraction = CitationExtractor::with_config(parsing).extract(&text)?;
    let extracted = extraction.citations.len();

    let color = ColorMode(!args.no_color && args.output.is_none() && !args.json);
    let mut writer = open_writer(&args.output)?;

    if !args.json {
        output::print_extraction_summary(&mut writer, &file_name, &extraction, color)?;
    }

    let lookup = CrossRef::new(&config)?;

    // Progress goes to stderr when the report goes to a file
    let bar = (!args.json && std::io::stdout().is_terminal() && args.output.is_none())
        .then(|| output::progress_bar(extracted));
    let progress_writer: Mutex<Box<dyn Write + Send>> = if args.output.is_some() {
        Mutex::new(Box::new(std::io::stderr()))
    } else {
        Mutex::new(Box::new(std::io::stdout()))
    };
    let quiet = args.json;
    let progress_cb = |event: ProgressEvent| {
        if let Some(ref bar) = bar {
            output::update_bar(bar, &event, color);
        } else if !quiet && let Ok(mut w) = progress_writer.lock() {
            let _ = output::print_progress(&mut *w, &event, color);
            let _ = w.flush();
        }
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let results =
        citelint_core::verify_citations(extraction.citations, &lookup, &config, progress_cb, cancel)
            .await;

    if let Some(bar) = bar
        && !bar.is_finished()
    {
        bar.finish_and_clear();
    }

    let stats = CheckStats::from_results(&results);
    if args.json {
        return output::write_json_report(&mut writer, &file_name, extracted, &results, &stats);
    }

    writeln!(writer)?;
    output::print_problem_report(&mut writer, &results, color)?;
    output::print_summary(&mut writer, &stats, extracted, color)?;

    Ok(())
}

async fn verify_doi(input: &str, config: Config, json: bool, no_color: bool) -> anyhow::Result<()> {
    let doi = citelint_core::normalize_doi(input);
    if !citelint_core::is_valid_doi(&doi) {
        anyhow::bail!("Not a valid DOI: {}", input);
    }

    let lookup = CrossRef::new(&config)?;
    let result = citelint_core::verifier::verify_doi(&doi, &lookup).await;

    let mut stdout = std::io::stdout();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &result)?;
        writeln!(stdout)?;
    } else {
        let color = ColorMode(!no_color && stdout.is_terminal());
        output::print_doi_result(&mut stdout, &result, color)?;
    }
    Ok(())
}
