//! Import command.

use anyhow::bail;
use console::style;

use crate::cli::helpers::{
    load_record_args, open_cache, source_client, spawn_progress, target_store, truncate,
};
use crate::cli::RecordArgs;
use crate::config::{Settings, SyncConfig};
use crate::sync::{ImportOrchestrator, ImportSummary, VersionStatus};

/// Import transcription versions for the given records.
pub async fn cmd_import(
    settings: &Settings,
    record_args: &RecordArgs,
    type_filter: &[String],
) -> anyhow::Result<()> {
    let mut config = settings.sync_config()?;
    restrict_types(&mut config, type_filter)?;

    let source = source_client(settings)?;
    let target = target_store(settings)?;
    let cache = open_cache(settings)?;
    let records = load_record_args(record_args)?;

    if records.is_empty() {
        println!("{} No identifier records to import", style("!").yellow());
        return Ok(());
    }

    let type_names: Vec<&str> = config.output_types.iter().map(|t| t.name.as_str()).collect();
    println!(
        "{} Importing {} records ({})",
        style("→").cyan(),
        records.len(),
        type_names.join(", ")
    );

    let (tx, progress) = spawn_progress(records.len());
    let orchestrator = ImportOrchestrator::new(config, source, target, cache).with_events(tx);
    let result = orchestrator.run(&records).await;
    drop(orchestrator);
    progress.await.ok();

    let summary = result?;
    print_summary(&summary);
    Ok(())
}

/// Keep only the output types named on the command line.
fn restrict_types(config: &mut SyncConfig, names: &[String]) -> anyhow::Result<()> {
    if names.is_empty() {
        return Ok(());
    }
    if let Some(unknown) = names
        .iter()
        .find(|name| !config.output_types.iter().any(|t| &t.name == *name))
    {
        bail!("Output type '{}' is not configured", unknown);
    }
    config.output_types.retain(|t| names.contains(&t.name));
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("\n{}", style("Import Summary").bold());
    println!("{}", "-".repeat(40));
    println!("{:<22} {}", "Records processed:", summary.records_processed);
    println!("{:<22} {}", "Versions created:", summary.versions_created);
    println!("{:<22} {}", "Versions unchanged:", summary.unchanged_count());
    println!(
        "{:<22} {}",
        "Failures:",
        summary.failures.len() + summary.failed_versions().count()
    );

    if summary.is_clean() {
        println!("\n{} All records imported", style("✓").green());
        return;
    }

    println!();
    for failure in &summary.failures {
        let unit = match failure.image_uuid {
            Some(image) => format!("{} image {}", failure.identifier, image),
            None => failure.identifier.clone(),
        };
        println!("{} {}: {}", style("✗").red(), unit, truncate(&failure.reason, 80));
    }
    for outcome in summary.failed_versions() {
        if let VersionStatus::Failed(reason) = &outcome.status {
            println!(
                "{} {} {} version {}: {}",
                style("✗").red(),
                outcome.external_id,
                outcome.type_name,
                outcome.version_uuid,
                truncate(reason, 80)
            );
        }
    }
}
