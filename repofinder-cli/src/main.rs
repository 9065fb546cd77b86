//! repofinder CLI
//!
//! Discover GitHub repositories affiliated with a university and score them
//! for affiliation confidence and recent activity.

mod prompt;

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use repofinder_core::{ConfigError, OrgIdentity, Settings, WeightTable};
use repofinder_github::{GitHubClient, GitHubConfig, HostApi, RateBucket};
use repofinder_runtime::{
    Exporter, Pipeline, PipelineConfig, PipelineError, RunReport, RunSummary, ScoringContext,
};

use crate::prompt::Prompter;

#[derive(Parser)]
#[command(name = "repofinder")]
#[command(author, version, about = "Find and score a university's open source repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ActivityMetric {
    /// Built-in weights and ceilings
    Default,
    /// Prompt for the window and a weight per metric
    Custom,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Organization name, e.g. "University of California, Santa Cruz"
    #[arg(long)]
    name: Option<String>,

    /// Organization acronym, e.g. "UCSC"
    #[arg(long)]
    acronym: Option<String>,

    /// Organization email domain, e.g. "ucsc.edu"
    #[arg(long)]
    email_domain: Option<String>,

    /// Organization website, e.g. "https://www.ucsc.edu"
    #[arg(long)]
    website: Option<String>,

    /// Extra search keyword (repeatable)
    #[arg(long = "keyword")]
    keywords: Vec<String>,

    /// Activity weighting mode
    #[arg(long, value_enum)]
    activity_metric: Option<ActivityMetric>,

    /// Activity window in months
    #[arg(long)]
    window_months: Option<u32>,

    /// Settings file (default: ./repofinder.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Domain taxonomy file (.toml or .json)
    #[arg(long)]
    taxonomy: Option<PathBuf>,

    /// Maximum number of candidates to score
    #[arg(long)]
    limit: Option<usize>,

    /// Candidates processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Directory for the output files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// GitHub token (or set GITHUB_TOKEN env var)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API base URL
    #[arg(long, default_value = repofinder_github::DEFAULT_API_URL)]
    api_url: String,

    /// Never prompt; use only flags and settings
    #[arg(long)]
    no_prompt: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, extract and score repositories for an organization
    Run(RunArgs),

    /// Show the token's GitHub rate-limit budget
    Status {
        /// GitHub token (or set GITHUB_TOKEN env var)
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// GitHub API base URL
        #[arg(long, default_value = repofinder_github::DEFAULT_API_URL)]
        api_url: String,
    },

    /// Print the effective activity metric table
    Weights {
        /// Settings file (default: ./repofinder.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Run(args) => run(args).await?,
        Commands::Status { token, api_url } => check_status(token, api_url).await?,
        Commands::Weights { config } => show_weights(config)?,
    }

    Ok(())
}

fn load_settings(config: Option<&PathBuf>) -> Result<Settings> {
    let settings = match config {
        Some(path) => Settings::load(path)?,
        None => Settings::discover(&std::env::current_dir()?)?,
    };
    if let Some(source) = &settings.source {
        tracing::info!("Loaded settings from {}", source.display());
    }
    Ok(settings)
}

fn require_token(token: Option<String>) -> Result<String> {
    token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
        ConfigError::Missing("GitHub token. Set GITHUB_TOKEN or use --token".to_string()).into()
    })
}

/// Fill in identity fields, prompting for the ones not given as flags
fn resolve_identity<R: io::BufRead, W: io::Write>(
    args: &RunArgs,
    prompter: Option<&mut Prompter<R, W>>,
) -> io::Result<OrgIdentity> {
    let mut identity = OrgIdentity::new(args.name.as_deref().unwrap_or_default());
    if let Some(acronym) = &args.acronym {
        identity = identity.with_acronym(acronym);
    }
    if let Some(domain) = &args.email_domain {
        identity = identity.with_email_domain(domain);
    }
    if let Some(website) = &args.website {
        identity = identity.with_website(website);
    }
    for keyword in &args.keywords {
        identity.add_keyword(keyword);
    }

    let Some(prompter) = prompter else {
        return Ok(identity);
    };

    if args.name.is_none() {
        identity.name = prompter.ask("Organization name")?;
    }
    if args.acronym.is_none() {
        identity = identity.with_acronym(&prompter.ask("Organization acronym")?);
    }
    if args.email_domain.is_none() {
        identity = identity.with_email_domain(&prompter.ask("Organization email domain")?);
    }
    if args.website.is_none() {
        identity = identity.with_website(&prompter.ask("Organization website URL")?);
    }
    if args.keywords.is_empty() {
        for keyword in prompter.keywords()? {
            identity.add_keyword(&keyword);
        }
    }
    Ok(identity)
}

async fn run(args: RunArgs) -> Result<()> {
    println!("🎓 repofinder - university repository discovery\n");

    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let interactive = !args.no_prompt;

    let identity = resolve_identity(&args, interactive.then_some(&mut prompter))
        .context("Failed to read organization details")?;

    let mut settings = load_settings(args.config.as_ref())?;
    if let Some(path) = &args.taxonomy {
        settings.classification.taxonomy = Some(path.clone());
    }
    if let Some(concurrency) = args.concurrency {
        settings.extraction.concurrency = concurrency;
    }
    if let Some(months) = args.window_months {
        settings.activity.window_months = months;
    }

    let mode = match args.activity_metric {
        Some(mode) => mode,
        None if interactive => {
            let answer = prompter.ask("Activity metric (default/custom) [default]")?;
            if answer.eq_ignore_ascii_case("custom") {
                ActivityMetric::Custom
            } else {
                ActivityMetric::Default
            }
        }
        None => ActivityMetric::Default,
    };
    if mode == ActivityMetric::Custom {
        if !interactive {
            anyhow::bail!("--activity-metric custom needs prompts; drop --no-prompt or use a settings file");
        }
        if args.window_months.is_none() {
            settings.activity.window_months =
                prompter.window_months(settings.activity.window_months)?;
        }
        settings.activity.weights = prompter.weights()?;
    }
    drop(prompter);

    settings.validate()?;
    let token = require_token(args.token)?;
    let context = Arc::new(ScoringContext::from_settings(identity, &settings)?);

    let client = GitHubClient::new(
        GitHubConfig::default()
            .with_token(token)
            .with_api_url(args.api_url),
    )?;

    let window = context.window();
    println!("🏛️  Organization: {}", context.identity().name);
    println!("🔑 Identifiers: {}", context.identity().identifiers().join(", "));
    println!(
        "📅 Activity window: {} to {}",
        window.start.format("%Y-%m-%d"),
        window.end.format("%Y-%m-%d")
    );
    println!(
        "⚙️  Workers: {} | Limit: {}\n",
        settings.extraction.concurrency,
        args.limit.map_or("none".to_string(), |l| l.to_string())
    );

    let pipeline = Pipeline::new(PipelineConfig {
        host: Arc::new(client),
        context: context.clone(),
        extraction: settings.extraction.clone(),
        limit: args.limit,
    });

    println!("🚀 Starting discovery (Ctrl-C to stop and keep completed records)...");
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = pipeline.run(shutdown).await;

    let exporter = Exporter::new(&args.output_dir, context.identity());
    let (summary, result) = conclude(outcome, &exporter, &context);
    print!("{}", summary);
    result
}

fn push_counts(out: &mut String, summary: &RunSummary) {
    let _ = writeln!(out, "📊 Discovered: {}", summary.discovered);
    let _ = writeln!(
        out,
        "   Scored: {} | Skipped: {} | Failed: {}",
        summary.scored, summary.skipped, summary.failed
    );
}

/// Export what the run produced and render the closing summary. The
/// counts are rendered on every path, a failed run or export included.
fn conclude(
    outcome: Result<RunReport, PipelineError>,
    exporter: &Exporter,
    context: &ScoringContext,
) -> (String, Result<()>) {
    let mut out = String::new();
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            let _ = writeln!(out, "\n❌ Run failed: {}", e);
            push_counts(&mut out, &RunSummary::default());
            return (out, Err(e.into()));
        }
    };

    if let Some(reason) = &report.aborted {
        let _ = writeln!(out, "\n❌ Run aborted: {}", reason);
    } else if report.interrupted {
        let _ = writeln!(out, "\n⚠️  Run interrupted, keeping completed records");
    } else {
        let _ = writeln!(out, "\n✅ Run complete!");
    }
    push_counts(&mut out, &report.summary);

    match exporter.write(&report, context) {
        Ok(paths) => {
            let _ = writeln!(out, "📄 Records: {}", paths.json.display());
            let _ = writeln!(out, "📄 Table: {}", paths.csv.display());
            let _ = writeln!(out, "📄 Rows: {}", paths.jsonl.display());
            (out, Ok(()))
        }
        Err(e) => {
            let _ = writeln!(out, "❌ Export failed: {}", e);
            (out, Err(e.into()))
        }
    }
}

fn describe_bucket(label: &str, bucket: &RateBucket) {
    let reset = bucket.reset.map_or("unknown".to_string(), |r| {
        let secs = (r - chrono::Utc::now()).num_seconds().max(0);
        format!("{} ({}s)", r.format("%H:%M:%S UTC"), secs)
    });
    println!(
        "   {}: {}/{} remaining, resets {}",
        label, bucket.remaining, bucket.limit, reset
    );
}

async fn check_status(token: Option<String>, api_url: String) -> Result<()> {
    println!("🔌 Checking GitHub API budget...\n");

    let token = require_token(token)?;
    let client = GitHubClient::new(
        GitHubConfig::default()
            .with_token(token)
            .with_api_url(api_url),
    )?;

    match client.rate_limit().await {
        Ok(status) => {
            println!("✅ Token accepted");
            describe_bucket("core", &status.core);
            describe_bucket("search", &status.search);
        }
        Err(e) => {
            println!("❌ Error checking rate limit: {}", e);
        }
    }

    Ok(())
}

fn print_table(table: &WeightTable) {
    println!("{:<36} {:>10} {:>8}", "Metric", "Ceiling", "Weight");
    for (metric, spec) in table.iter() {
        println!(
            "{:<36} {:>10} {:>7}%",
            metric.label(),
            spec.ceiling,
            spec.weight
        );
    }
    println!("{:<36} {:>10} {:>7}%", "Total", "", table.total_weight());
    if table.is_builtin() {
        println!("(built-in weights; scores are capped at 100)");
    }
}

fn show_weights(config: Option<PathBuf>) -> Result<()> {
    let settings = load_settings(config.as_ref())?;
    let table = settings.activity.weight_table()?;
    println!(
        "📐 Activity window: {} months\n",
        settings.activity.window_months
    );
    print_table(&table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cli: &[&str]) -> RunArgs {
        let mut argv = vec!["repofinder", "run"];
        argv.extend_from_slice(cli);
        match Cli::parse_from(argv).command {
            Commands::Run(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_flags_only_identity() {
        let args = args(&[
            "--name",
            "UC Santa Cruz",
            "--acronym",
            "UCSC",
            "--keyword",
            "slugs",
            "--keyword",
            "banana slugs",
            "--no-prompt",
        ]);
        let identity = resolve_identity::<&[u8], Vec<u8>>(&args, None).unwrap();
        assert_eq!(identity.name, "UC Santa Cruz");
        assert_eq!(identity.acronym, "UCSC");
        assert!(identity.email_domain.is_empty());
        assert_eq!(identity.extra_keywords, vec!["slugs", "banana slugs"]);
    }

    #[test]
    fn test_prompts_for_missing_fields() {
        let args = args(&["--acronym", "UCSC"]);
        let input = "UC Santa Cruz\n@ucsc.edu\nhttps://www.ucsc.edu\ngenomics\nn\n";
        let mut prompter = Prompter::new(input.as_bytes(), Vec::new());
        let identity = resolve_identity(&args, Some(&mut prompter)).unwrap();

        assert_eq!(identity.name, "UC Santa Cruz");
        assert_eq!(identity.acronym, "UCSC");
        assert_eq!(identity.email_domain, "ucsc.edu");
        assert_eq!(identity.website_host(), "ucsc.edu");
        assert_eq!(identity.extra_keywords, vec!["genomics"]);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = require_token(Some("  ".into())).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
        assert!(require_token(Some("ghp_x".into())).is_ok());
    }

    #[test]
    fn test_activity_metric_flag() {
        let args = args(&["--activity-metric", "custom", "--window-months", "12"]);
        assert!(args.activity_metric == Some(ActivityMetric::Custom));
        assert_eq!(args.window_months, Some(12));
    }

    fn context() -> ScoringContext {
        ScoringContext::new(
            OrgIdentity::new("UC Santa Cruz").with_acronym("UCSC"),
            repofinder_core::ClassificationSettings::default()
                .build_classifier()
                .unwrap(),
            WeightTable::default(),
            repofinder_core::ActivityWindow::last_months(6).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_summary_reported_when_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context();
        let exporter = Exporter::new(dir.path(), ctx.identity());
        let outcome = Err(PipelineError::Agent(
            repofinder_agents::AgentError::SearchUnavailable {
                attempted: 3,
                last: "status 503".into(),
            },
        ));

        let (summary, result) = conclude(outcome, &exporter, &ctx);

        assert!(result.is_err());
        assert!(summary.contains("Run failed: Search API unreachable"));
        assert!(summary.contains("Discovered: 0"));
        assert!(summary.contains("Scored: 0 | Skipped: 0 | Failed: 0"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_summary_reported_when_export_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("out");
        std::fs::write(&blocked, "not a directory").unwrap();
        let ctx = context();

        let mut report = RunReport::new();
        report.summary = RunSummary {
            discovered: 4,
            scored: 2,
            skipped: 1,
            failed: 0,
        };
        report.aborted = Some("Run aborted: Authentication failed".into());

        let (summary, result) = conclude(Ok(report), &Exporter::new(&blocked, ctx.identity()), &ctx);

        assert!(result.is_err());
        assert!(summary.contains("❌ Run aborted"));
        assert!(summary.contains("Discovered: 4"));
        assert!(summary.contains("Scored: 2 | Skipped: 1 | Failed: 0"));
        assert!(summary.contains("Export failed"));
    }

    #[test]
    fn test_summary_lists_export_files() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context();
        let mut report = RunReport::new();
        report.interrupted = true;

        let (summary, result) = conclude(Ok(report), &Exporter::new(dir.path(), ctx.identity()), &ctx);

        assert!(result.is_ok());
        assert!(summary.contains("Run interrupted"));
        assert!(summary.contains("repository_data_UCSC.partial.csv"));
        assert!(summary.contains("repository_data_UCSC.partial.json"));
    }
}
