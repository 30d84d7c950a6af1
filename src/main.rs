//! peerly: section-by-section critique of LaTeX technical documents.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use peerly::cache;
use peerly::config;
use peerly::constants;
use peerly::env;
use peerly::orchestrator;
use peerly::output;
use peerly::progress;
use peerly::providers;
use peerly::retrieval;
use peerly::segmenter;
use peerly::telemetry;
use peerly::workers;

use std::io::{IsTerminal, Read};
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use tracing::info;

use cli::args::{Cli, Command, LogFormat, OutputFormat};
use config::Config;
use env::Env;
use orchestrator::{ReviewController, ReviewRequest};
use progress::ProgressTracker;
use providers::GenerationProvider;
use providers::rig::RigProvider;
use retrieval::GuidelineRetriever;
use retrieval::http::HttpKnowledgeStore;
use retrieval::local::LocalKnowledgeStore;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose, cli.log_format == LogFormat::Json);

    match cli.command {
        Command::Review(args) => run_review(*args).await,
        Command::Segment(args) => run_segment(args).await,
        Command::Workers(args) => run_workers(args).await,
        Command::Validate(args) => run_validate(args).await,
        Command::Version => run_version(),
    }
}

/// Print detailed version and build information.
fn run_version() -> Result<()> {
    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(())
}

/// Read a document from a path, or from stdin when the path is `-`.
async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let text = tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map(|_| buf)
        })
        .await
        .context("stdin reader panicked")?
        .context("failed to read stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Print the section outline of a document.
async fn run_segment(args: cli::args::SegmentArgs) -> Result<()> {
    let text = read_input(&args.input).await?;
    let segmentation = segmenter::segment_with_diagnostics(&text);

    if args.json {
        let json = serde_json::to_string_pretty(&segmentation.sections)
            .context("failed to serialize sections")?;
        println!("{json}");
    } else {
        print!("{}", output::terminal::render_outline(&segmentation.sections));
        println!(
            "{}",
            format!(
                "{} line(s), {} top-level section(s)",
                segmentation.line_count,
                segmentation.sections.len()
            )
            .dimmed()
        );
    }

    for err in &segmentation.errors {
        eprintln!("  {} {}", "⚠".yellow().bold(), err);
    }
    Ok(())
}

/// List available worker profiles.
async fn run_workers(args: cli::args::WorkersArgs) -> Result<()> {
    let defs = workers::load_definitions(args.profile_dir.as_deref())
        .await
        .context("failed to load worker profiles")?;

    if defs.is_empty() {
        println!("No workers found.");
        return Ok(());
    }

    for def in &defs {
        let p = &def.profile;
        println!("  {}  {}", p.name.bold(), p.description.dimmed());
        if let Some(ref model) = p.model {
            println!("         {}  {}", "model:".cyan(), model);
        }
        if !p.retrieval.query.is_empty() {
            println!("         {}  {}", "query:".cyan(), p.retrieval.query);
        }
    }

    Ok(())
}

/// Validate a custom worker profile markdown file.
async fn run_validate(args: cli::args::ValidateArgs) -> Result<()> {
    match workers::load_profile_file(&args.file).await {
        Ok(def) => {
            let p = &def.profile;
            println!(
                "  {} {}  {}",
                "✔".green().bold(),
                p.name.bold(),
                p.description.dimmed(),
            );
            if let Some(ref model) = p.model {
                println!("         {}  {}", "model:".cyan(), model);
            }
            println!("         {}  {:?}", "sections:".cyan(), p.sections);
            if !p.retrieval.hints.is_empty() {
                println!("         {}  {}", "hints:".cyan(), p.retrieval.hints.len());
            }
            println!("         {}  {} chars", "prompt:".cyan(), def.system_prompt.len());
            Ok(())
        }
        Err(e) => {
            bail!("{} {}", "✖".red().bold(), format!("Invalid profile: {e}").red());
        }
    }
}

async fn run_review(args: cli::args::ReviewArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine working directory")?;
    let mut config =
        Config::load(Some(&cwd), &Env::real()).context("failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    let text = read_input(&args.input).await?;

    let defs = workers::load_definitions(config.review.profile_dir.as_deref())
        .await
        .context("failed to load worker profiles")?;
    let provider: Arc<dyn GenerationProvider> = Arc::new(
        RigProvider::new(config.provider.clone()).context("failed to set up provider")?,
    );
    let registry = workers::WorkerRegistry::from_definitions(defs, provider);

    let guideline_cache = Arc::new(cache::GuidelineCache::from_config(&config.guidelines));
    let (retriever, guidelines_label) = build_retriever(&config, Arc::clone(&guideline_cache))?;

    let show_progress = !args.quiet
        && !args.no_progress
        && args.format == OutputFormat::Terminal
        && std::io::stderr().is_terminal();
    if show_progress {
        cli::print_banner(&config.review.workers, &guidelines_label);
    }

    let mut controller = ReviewController::new(registry, Arc::new(retriever), config.clone());
    if show_progress {
        controller = controller.with_progress(Arc::new(ProgressTracker::new(
            &config.review.workers,
            true,
        )));
    }
    if let Some(report_cache) = cache::ReportCache::from_config(&config.review) {
        controller = controller.with_report_cache(Arc::new(report_cache));
    }

    let request = ReviewRequest::new(text)
        .with_workers(config.review.workers.clone())
        .with_sections(args.sections.clone());
    let report = controller.review(request).await;

    let stats = guideline_cache.stats();
    info!(
        entries = stats.entries,
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        hit_rate = stats.hit_rate(),
        "guideline cache"
    );

    print!("{}", args.format.render(&report));

    if !report.success {
        bail!(
            "review failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(threshold) = args.fail_threshold(&config) {
        let failing = report.summary.by_severity.at_or_above(threshold);
        if failing > 0 {
            let counts = &report.summary.by_severity;
            eprintln!(
                "\nReview complete: {} error(s), {} warning(s), {} info · failing on {threshold}+",
                counts.error, counts.warning, counts.info,
            );
            bail!("found {failing} suggestion(s) at or above {threshold} threshold");
        }
    }

    Ok(())
}

/// Pick the knowledge store: HTTP endpoint, local directory, or none.
fn build_retriever(
    config: &Config,
    guideline_cache: Arc<cache::GuidelineCache>,
) -> Result<(GuidelineRetriever, String)> {
    let g = &config.guidelines;
    let timeout = std::time::Duration::from_secs(g.timeout_secs);

    if !g.enabled {
        return Ok((GuidelineRetriever::disabled(guideline_cache), "disabled".into()));
    }
    if let Some(url) = &g.url {
        let store = HttpKnowledgeStore::new(url.clone(), g.collection.clone());
        let retriever = GuidelineRetriever::new(Arc::new(store), guideline_cache).with_timeout(timeout);
        return Ok((retriever, url.clone()));
    }
    if let Some(dir) = &g.dir {
        let store = LocalKnowledgeStore::load(dir)
            .with_context(|| format!("failed to load guidelines from {}", dir.display()))?;
        info!(chunks = store.len(), dir = %dir.display(), "loaded local guidelines");
        let retriever = GuidelineRetriever::new(Arc::new(store), guideline_cache).with_timeout(timeout);
        return Ok((retriever, dir.display().to_string()));
    }
    Ok((GuidelineRetriever::disabled(guideline_cache), "none configured".into()))
}
