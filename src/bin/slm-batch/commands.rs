//! Command implementations.

use anyhow::{Context, Result};
use slm_batch::mail::parse_address_list;
use slm_batch::{
    BatchGenerator, Config, DispatchOptions, Dispatcher, Event, Record, SequencePrefix, Session,
    Workbook, run_until_interrupted,
};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::cli::{CheckPrefixArgs, GenerateArgs, SendArgs};

/// Execute the `generate` command
pub async fn run_generate(config_path: Option<&Path>, args: &GenerateArgs) -> Result<()> {
    // Fail on a bad prefix before reading any input
    let prefix: SequencePrefix = args.prefix.parse()?;
    let config = load_config(config_path)?;

    let raw = std::fs::read_to_string(&args.records)
        .with_context(|| format!("Failed to read records from {}", args.records.display()))?;
    let records: Vec<Record> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse records in {}", args.records.display()))?;
    info!(records = records.len(), prefix = %prefix, "Records loaded");

    let generator = BatchGenerator::new(config);
    let printer = tokio::spawn(print_events(generator.subscribe()));

    let run = generator.run_batch(&records, &args.template, &args.prefix);
    let outcome = run_until_interrupted(run).await;
    drop(generator);
    printer.await.ok();

    let Some(result) = outcome else {
        anyhow::bail!("Interrupted before the batch finished");
    };
    let result = result?;

    if !result.all_succeeded() {
        warn!("Some documents could not be converted and are included in source format");
    }
    let count = result.count();
    let archive = result.write_archive(&args.output)?;
    println!("Wrote {count} document(s) to {}", archive.display());
    Ok(())
}

/// Execute the `send` command
pub async fn run_send(config_path: Option<&Path>, args: &SendArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(sender) = &args.sender {
        config.smtp.sender = sender.clone();
    }
    if let Some(secret) = &args.secret {
        config.smtp.secret = secret.clone();
    }

    let raw = std::fs::read_to_string(&args.workbook)
        .with_context(|| format!("Failed to read workbook {}", args.workbook.display()))?;
    let workbook: Workbook = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse workbook {}", args.workbook.display()))?;
    let session = Session::from_workbook(config.smtp.sender.clone(), &workbook);
    info!(
        recipients = session.recipients().len(),
        templates = ?session.template_names(),
        "Workbook loaded"
    );

    let options = DispatchOptions {
        template: args.template.clone(),
        include_attachments: args.attachments,
        cc: parse_address_list(&args.cc),
        bcc: parse_address_list(&args.bcc),
    };

    let dispatcher = Dispatcher::new(config.smtp.clone(), config.dispatch.clone());
    let printer = tokio::spawn(print_events(dispatcher.subscribe()));

    let outcome = run_until_interrupted(dispatcher.send_all(&session, &options)).await;
    drop(dispatcher);
    printer.await.ok();

    let Some(summary) = outcome else {
        anyhow::bail!("Interrupted before every recipient was served");
    };
    let summary = summary?;

    println!(
        "Sent {} of {} message(s), {} failed",
        summary.sent_count, summary.total, summary.failed_count
    );
    for entry in summary.log.failures() {
        println!(
            "  {}: {}",
            entry.recipient,
            entry.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// Execute the `check-prefix` command
pub fn run_check_prefix(args: &CheckPrefixArgs) -> Result<()> {
    let prefix: SequencePrefix = args.prefix.parse()?;
    println!(
        "{prefix} is valid; archive will be named after {}",
        prefix.archive_stem()
    );
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

/// Print progress lines until the publishing side is dropped
async fn print_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = describe(&event) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress output fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &Event) -> Option<String> {
    let line = match event {
        Event::ItemStarted { status, .. } => status.clone(),
        Event::ConversionWarning {
            index,
            strategy,
            reason,
        } => format!("  [{index}] {strategy} failed: {reason}"),
        Event::ItemCompleted {
            file_name,
            converted,
            ..
        } => {
            if *converted {
                format!("  -> {file_name}")
            } else {
                format!("  -> {file_name} (not converted)")
            }
        }
        Event::BatchFailed { index, error } => format!("Batch halted at item {index}: {error}"),
        Event::Sending {
            index,
            total,
            recipient,
        } => format!("Sending {index} of {total} to {recipient}"),
        Event::SendFailed {
            recipient, error, ..
        } => format!("  failed for {recipient}: {error}"),
        _ => return None,
    };
    Some(line)
}
