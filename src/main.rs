//! Rubigene - ruby-gloss subtitles for English learners
//!
//! Command line entry point: annotates SRT files with glosses for difficult
//! words and writes ASS subtitles, and manages the translation cache.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rubigene::cli::{AnnotateOptions, Args, CacheAction, Commands};
use rubigene::config::Config;
use rubigene::file_utils::FileManager;
use rubigene::pipeline::RunReport;
use rubigene::setup::SetupManager;
use rubigene::subtitle::MalformedBlockPolicy;
use rubigene::tokenize::RuleBasedModel;
use rubigene::translate::{DeepLTranslator, TranslationCache};
use rubigene::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Rubigene");

    let mut config = if args.command.needs_config() {
        Config::discover(args.config.as_deref())?
    } else {
        Config::default()
    };

    match args.command {
        Commands::InitConfig { output, force } => {
            Config::write_default(&output, force)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Check { verify_api_key, api_key } => {
            let setup_manager = SetupManager::new()?;

            println!("\nLookup Tables:");
            println!("{:<12} {:<10} {:<50}", "Table", "Status", "Path");
            println!("{}", "-".repeat(72));
            for status in setup_manager.table_status(&config.data) {
                println!(
                    "{:<12} {:<10} {:<50}",
                    status.name,
                    if status.exists { "Found" } else { "Missing" },
                    status.path.display()
                );
            }

            let tables = setup_manager.initialize(&config)?;
            let (ngsl, cefr, frequency) = tables.sizes();
            println!("\nLoaded {} NGSL, {} CEFR and {} frequency entries", ngsl, cefr, frequency);

            if verify_api_key {
                if let Some(key) = api_key {
                    config.translate.api_key = key;
                }
                let translator = DeepLTranslator::new(&config.translate)?;
                translator
                    .validate_credentials(config.require_api_key()?, &config.translate.target_language)
                    .await?;
                println!("API key accepted by {}", translator.endpoint());
            }
        }
        Commands::Cache { action } => {
            let cache = TranslationCache::open(&config.translate.cache_dir)?;

            match action {
                CacheAction::List => {
                    let entries = cache.list().await?;

                    if entries.is_empty() {
                        println!("No cached glosses found.");
                    } else {
                        println!("\nCached Glosses:");
                        println!("{:<25} {:<10} {:<15} {:<40}", "Lemma", "Language", "Cached", "Gloss");
                        println!("{}", "-".repeat(90));

                        for entry in entries {
                            let cached_ago = (Utc::now() - entry.fetched_at).num_seconds().max(0) as u64;
                            println!(
                                "{:<25} {:<10} {:<15} {:<40}",
                                entry.lemma,
                                entry.target_language,
                                format_duration(cached_ago),
                                entry.gloss
                            );
                        }
                    }
                }
                CacheAction::Info => {
                    let info = cache.info().await?;

                    println!("\nCache Statistics:");
                    println!("Directory: {}", info.directory.display());
                    println!("Entries: {}", info.entries);
                    println!("Size: {:.2} KB", info.total_bytes as f64 / 1024.0);

                    if let Some(oldest) = info.oldest {
                        let oldest_ago = (Utc::now() - oldest).num_seconds().max(0) as u64;
                        println!("Oldest entry: {} ago", format_duration(oldest_ago));
                    }
                    if let Some(newest) = info.newest {
                        let newest_ago = (Utc::now() - newest).num_seconds().max(0) as u64;
                        println!("Newest entry: {} ago", format_duration(newest_ago));
                    }
                }
                CacheAction::Clear => {
                    let deleted_count = cache.clear().await?;
                    println!("Cleared {} cached glosses", deleted_count);
                }
            }
        }
        Commands::Annotate { input, output, options } => {
            apply_overrides(&mut config, &options);
            let output = output.unwrap_or_else(|| {
                FileManager::output_path(&input, None, &config.output.output_suffix, "ass")
            });

            let (workflow, progress) = build_workflow(config)?;
            let cancel = cancel_on_ctrl_c();

            let result = workflow.annotate_file(&input, &output, &cancel).await;
            progress.finish_and_clear();
            let report = result?;

            print_report(&input, &report);
            println!("Wrote {}", output.display());
        }
        Commands::Batch { input_dir, output_dir, options } => {
            apply_overrides(&mut config, &options);

            let (workflow, progress) = build_workflow(config)?;
            let cancel = cancel_on_ctrl_c();

            let result = workflow
                .process_directory(&input_dir, output_dir.as_deref(), &cancel)
                .await;
            progress.finish_and_clear();
            let summary = result?;

            for (input, report) in &summary.annotated {
                print_report(input, report);
            }
            if !summary.failed.is_empty() {
                println!("\nFailed files:");
                for (input, error) in &summary.failed {
                    println!("  {}: {}", input.display(), error);
                }
            }
            println!(
                "\nAnnotated {} files, {} failed",
                summary.annotated.len(),
                summary.failed.len()
            );
        }
    }

    info!("Rubigene completed successfully");
    Ok(())
}

fn apply_overrides(config: &mut Config, options: &AnnotateOptions) {
    if let Some(target_lang) = &options.target_lang {
        config.translate.target_language = target_lang.clone();
    }
    if let Some(api_key) = &options.api_key {
        config.translate.api_key = api_key.clone();
    }
    if let Some(layout) = options.layout {
        config.output.layout = layout.into();
    }
    if options.report {
        config.output.write_report = true;
    }
    if options.strict {
        config.input.on_malformed_block = MalformedBlockPolicy::Abort;
    }
}

/// Load the tables, open the cache and wire the translation service.
fn build_workflow(config: Config) -> Result<(Workflow, ProgressBar)> {
    let setup_manager = SetupManager::new()?;
    let tables = setup_manager.initialize(&config)?;
    let cache = Arc::new(TranslationCache::open(&config.translate.cache_dir)?);
    let translator = Arc::new(DeepLTranslator::new(&config.translate)?);

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} words")?
            .progress_chars("#>-"),
    );

    let bar = progress.clone();
    let workflow = Workflow::new(config, tables, Arc::new(RuleBasedModel::new()), translator, cache)?
        .with_progress(Arc::new(move |resolved, total| {
            bar.set_length(total as u64);
            bar.set_position(resolved as u64);
        }));

    Ok((workflow, progress))
}

/// A token cancelled by the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}

fn print_report(input: &Path, report: &RunReport) {
    println!("\n{}", input.display());
    println!("  Cues: {}", report.cues_processed);
    println!("  Words glossed: {}", report.tokens_annotated);
    println!(
        "  Lookups: {} from cache, {} from the service",
        report.cache_hits, report.external_calls
    );
    if report.skipped_blocks > 0 {
        println!("  Malformed blocks skipped: {}", report.skipped_blocks);
    }
    if report.untokenized_cues > 0 {
        println!("  Cues left plain after analysis errors: {}", report.untokenized_cues);
    }
    if report.discarded_spans > 0 {
        println!("  Overlapping spans discarded: {}", report.discarded_spans);
    }
    if !report.unresolved_lemmas.is_empty() {
        println!(
            "  Unresolved ({} words left plain): {}",
            report.skipped_tokens,
            report.unresolved_lemmas.join(", ")
        );
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".rubigene").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "rubigene.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("rubigene.log").display()
    );

    Ok(())
}

/// Format duration in seconds to human readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86_400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86_400, (seconds % 86_400) / 3600)
    }
}
