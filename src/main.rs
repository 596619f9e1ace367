mod cli;

use evermedia::{
    config,
    dispatch::{EventDispatcher, PipelineEvent},
    library::JsonLibrary,
    pipeline::{Outcome, PersistStatus, Pipeline, SkipReason},
    scanner,
    sidecar::SidecarCache,
    watch,
};
use evermedia_probe::{check_tool, FfprobeEncoder};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "evermedia=trace,evermedia_probe=debug".to_string()
        } else {
            "evermedia=info,evermedia_probe=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Process { links } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(process_links(&links, cli.config.as_deref()))
        }
        Commands::Scan { dir } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan(&dir, cli.config.as_deref()))
        }
        Commands::Watch => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(watch_dirs(cli.config.as_deref()))
        }
        Commands::Show { link, json } => show(&link, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
    }
}

/// Library and pipeline wired from configuration.
fn build(config: &config::Config) -> Result<(JsonLibrary, Arc<Pipeline>)> {
    let library = JsonLibrary::open(&config.library.catalog_path)?;
    let encoder = Arc::new(FfprobeEncoder::with_program(&config.probe.ffprobe_path));
    let pipeline = Pipeline::from_config(config, encoder, Arc::new(library.clone()));
    Ok((library, Arc::new(pipeline)))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

async fn process_links(links: &[PathBuf], config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let (library, pipeline) = build(&config)?;
    let cancel = CancellationToken::new();

    let mut failed = 0;
    for link in links {
        let link = absolute(link)?;
        if !pipeline.accepts(&link) {
            print_outcome(&link, &Outcome::Rejected);
            failed += 1;
            continue;
        }
        let (binding, _) = library.get_or_insert(&link)?;
        let outcome = pipeline.run(&binding, &cancel).await;
        print_outcome(&link, &outcome);
        if matches!(outcome, Outcome::Failed { .. } | Outcome::Rejected) {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} link files failed", failed, links.len());
    }
    Ok(())
}

async fn scan(dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let (library, pipeline) = build(&config)?;
    let dir = absolute(dir)?;

    let dispatcher = EventDispatcher::new(pipeline, &config.dispatch);
    let mut events = dispatcher.subscribe();
    let collector = tokio::spawn(async move {
        let mut tally = Tally::default();
        loop {
            match events.recv().await {
                Ok(PipelineEvent::Finished { outcome, .. }) => tally.record(&outcome),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Missed {} pipeline events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
        tally
    });

    let summary = scanner::scan_directory(&dir, &library, &dispatcher).await;
    dispatcher.close().await;
    let summary = summary?;
    let tally = collector.await?;

    println!("Link files: {} ({} new)", summary.found, summary.added);
    println!(
        "Done: {}, skipped: {}, failed: {}, cancelled: {}",
        tally.done, tally.skipped, tally.failed, tally.cancelled
    );
    Ok(())
}

#[derive(Debug, Default)]
struct Tally {
    done: usize,
    skipped: usize,
    failed: usize,
    cancelled: usize,
}

impl Tally {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Done(_) => self.done += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed { .. } | Outcome::Rejected => self.failed += 1,
            Outcome::Cancelled { .. } => self.cancelled += 1,
        }
    }
}

async fn watch_dirs(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if !config.watch.enabled {
        anyhow::bail!("File watching is disabled; set [watch] enabled = true");
    }
    let (library, pipeline) = build(&config)?;

    let dispatcher = Arc::new(EventDispatcher::new(pipeline, &config.dispatch));
    let mut watcher = watch::FileWatcher::new(config.watch.clone(), library, Arc::clone(&dispatcher));
    watcher.start().await?;

    tracing::info!("Watching for link files, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down...");
    watcher.stop();
    dispatcher.shutdown().await;
    Ok(())
}

fn print_outcome(link: &Path, outcome: &Outcome) {
    match outcome {
        Outcome::Rejected => println!("✗ {}: not a link file", link.display()),
        Outcome::Skipped(SkipReason::Remote(target)) => {
            println!("- {}: remote target {}", link.display(), target)
        }
        Outcome::Skipped(SkipReason::Invalid(reason)) => {
            println!("- {}: {}", link.display(), reason)
        }
        Outcome::Done(report) => {
            println!("✓ {} -> {}", link.display(), report.target);
            match &report.sidecar {
                Ok(path) => println!("    sidecar: {}", path.display()),
                Err(e) => println!("    sidecar: {}", e),
            }
            match &report.persist {
                PersistStatus::Committed => println!("    library: committed"),
                PersistStatus::Refreshed(_) => println!("    library: refreshed"),
                PersistStatus::Skipped(e) => println!("    library: skipped ({})", e),
            }
        }
        Outcome::Failed { stage, error } => {
            println!("✗ {}: {} failed: {}", link.display(), stage, error)
        }
        Outcome::Cancelled { stage } => println!("✗ {}: cancelled before {}", link.display(), stage),
    }
}

fn show(link: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let cache = SidecarCache::new(config.library.sidecar_suffix.clone());
    let sidecar = cache.read(link)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sidecar)?);
        return Ok(());
    }

    let source = &sidecar.media_source;
    println!("Sidecar: {}", cache.path_for(link).display());
    println!("Source: {}", source.source_path);
    println!("Protocol: {}", source.protocol);
    if let Some(ref container) = source.container {
        println!("Container: {}", container);
    }
    if let Some(duration) = source.duration() {
        let secs = duration.as_secs();
        let mins = secs / 60;
        let hours = mins / 60;
        println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
    }

    println!("\nStreams: {}", source.streams.len());
    for stream in &source.streams {
        print!("  [{}] {}", stream.index, stream.stream_type);
        if let Some(ref codec) = stream.codec {
            print!(" {}", codec);
        }
        println!();
    }

    if !sidecar.chapters.is_empty() {
        println!("\nChapters: {}", sidecar.chapters.len());
        for chapter in &sidecar.chapters {
            let secs = chapter.start_position_ticks / evermedia_common::TICKS_PER_SECOND;
            println!(
                "  {:02}:{:02}:{:02} {}",
                secs / 3600,
                (secs / 60) % 60,
                secs % 60,
                chapter.name.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let program = config.probe.ffprobe_path.to_string_lossy();
    let tool = check_tool(&program, "-version");

    let status = if tool.available { "✓" } else { "✗" };
    print!("{} {}", status, tool.name);
    if let Some(ref version) = tool.version {
        print!(" ({})", version);
    }
    if let Some(ref path) = tool.path {
        print!(" - {}", path.display());
    }
    println!();

    println!();
    if tool.available {
        println!("All required tools are available!");
    } else {
        println!("ffprobe is missing. Install it or set [probe] ffprobe_path.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Link extension: .{}", config.library.link_extension);
    println!("  Sidecar suffix: .{}", config.library.sidecar_suffix);
    println!("  Catalog: {:?}", config.library.catalog_path);
    println!("  Persist strategy: {:?}", config.persist.strategy);
    println!(
        "  Dispatch: queue {}, {} concurrent runs",
        config.dispatch.queue_capacity, config.dispatch.max_concurrent_runs
    );
    println!("  Watch enabled: {}", config.watch.enabled);
    println!("  Watch paths: {}", config.watch.paths.len());

    Ok(())
}
