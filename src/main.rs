use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use shorts_moderator::pipeline::batch::{load_batch, write_report, write_results};
use shorts_moderator::pipeline::review::{
    DEFAULT_MIN_CONFIDENCE, DEFAULT_REVIEW_LIMIT, ResultFilter, load_results,
};
use shorts_moderator::pipeline::types::{Decision, EscalationPriority, ModerationResult};
use shorts_moderator::{ModerationPipeline, ModeratorConfig};

#[derive(Parser, Debug)]
#[command(
    name = "shorts-moderator",
    about = "Moderate the text surfaces of short videos",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Moderate a single short and print the result
    Moderate(ModerateArgs),
    /// Moderate a batch file and write the results
    Batch(BatchArgs),
    /// Show exported results that need human attention
    Review(ReviewArgs),
}

#[derive(Args, Debug)]
struct ModerateArgs {
    /// JSON file with one short
    #[arg(long)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// JSON array of shorts, or an object with a "shorts" array
    #[arg(long)]
    input: PathBuf,
    /// Where to write the results array
    #[arg(long)]
    output: PathBuf,
    /// Optional full batch report (summary stats and skipped items)
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// Results file written by `batch`
    #[arg(long)]
    results: PathBuf,
    /// Decisions to show (repeatable, default REMOVE and ESCALATE_TO_HUMAN)
    #[arg(long = "decision")]
    decisions: Vec<Decision>,
    /// Priorities to show (repeatable, default P0 and P1)
    #[arg(long = "priority")]
    priorities: Vec<EscalationPriority>,
    /// Minimum confidence score
    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    min_confidence: f64,
    /// Maximum number of results to show
    #[arg(long, default_value_t = DEFAULT_REVIEW_LIMIT)]
    limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ModeratorConfig::from_env().context("Invalid configuration")?;
    let _guard = init_tracing(config.log_dir.as_deref());

    match cli.command {
        Command::Moderate(args) => moderate(&config, args).await,
        Command::Batch(args) => batch(&config, args).await,
        Command::Review(args) => review(args).await,
    }
}

/// Stderr logging, plus a daily rolling file when a log directory is set.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "shorts-moderator.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    guard
}

async fn moderate(config: &ModeratorConfig, args: ModerateArgs) -> anyhow::Result<()> {
    let pipeline = ModerationPipeline::from_config(config)?;
    let result = pipeline
        .process_file(&args.input)
        .await
        .with_context(|| format!("Failed to moderate {}", args.input.display()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn batch(config: &ModeratorConfig, args: BatchArgs) -> anyhow::Result<()> {
    let pipeline = ModerationPipeline::from_config(config)?;

    let items = load_batch(&args.input).await?;
    info!(path = %args.input.display(), count = items.len(), "Loaded batch");

    let report = pipeline.process_batch(items).await;
    write_results(&args.output, &report.results).await?;
    info!(path = %args.output.display(), "Results written");

    if let Some(path) = &args.report {
        write_report(path, &report).await?;
        info!(path = %path.display(), "Batch report written");
    }

    println!("Batch {}", report.batch_id);
    for (decision, count) in &report.summary_stats {
        println!("  {:<18} {count}", decision.as_str());
    }
    println!(
        "Processed {}/{} shorts ({} skipped)",
        report.total_processed,
        report.total_items(),
        report.skipped.len()
    );
    Ok(())
}

async fn review(args: ReviewArgs) -> anyhow::Result<()> {
    let results = load_results(&args.results).await?;

    let mut filter = ResultFilter {
        min_confidence: args.min_confidence,
        limit: Some(args.limit),
        ..Default::default()
    };
    if !args.decisions.is_empty() {
        filter.decisions = args.decisions.into_iter().collect();
    }
    if !args.priorities.is_empty() {
        filter.priorities = args.priorities.into_iter().collect();
    }

    let selected = filter.apply(&results);
    let matching = results.iter().filter(|r| filter.matches(r)).count();
    println!(
        "{} of {} results need attention (showing {})",
        matching,
        results.len(),
        selected.len()
    );
    for result in selected {
        print_result(result);
    }
    Ok(())
}

fn print_result(result: &ModerationResult) {
    println!();
    println!(
        "[{}] {} {}",
        result.escalation_priority, result.short_id, result.overall_decision
    );
    println!("  urgency: {}", result.escalation_priority.description());
    println!(
        "  primary: {} ({:.1}%)",
        result.primary_violation,
        result.confidence_score * 100.0
    );
    println!("  action:  {}", result.action_recommendation);
    println!("  notes:   {}", result.notes_for_human_reviewer);
    for (category, score) in &result.categories {
        if !score.evidence.is_empty() {
            println!("  evidence ({category}): {}", score.evidence.join("; "));
        }
    }
}
