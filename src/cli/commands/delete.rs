//! Delete command.

use console::style;

use crate::cli::helpers::{confirm, load_record_args, source_client, spawn_progress, target_store};
use crate::cli::RecordArgs;
use crate::config::Settings;
use crate::sync::{DeletionOrchestrator, DeletionStatus};

/// Delete the documents of the given records from the text repository.
pub async fn cmd_delete(
    settings: &Settings,
    record_args: &RecordArgs,
    yes: bool,
) -> anyhow::Result<()> {
    let source = source_client(settings)?;
    let target = target_store(settings)?;
    let records = load_record_args(record_args)?;

    if records.is_empty() {
        println!("{} No identifier records to delete", style("!").yellow());
        return Ok(());
    }

    println!(
        "\n{} Delete all documents of {} records",
        style("→").cyan(),
        style(records.len()).yellow()
    );
    if !yes && !confirm("\nProceed?")? {
        println!("{} Cancelled", style("!").yellow());
        return Ok(());
    }

    let (tx, progress) = spawn_progress(records.len());
    let orchestrator = DeletionOrchestrator::new(source, target).with_events(tx);
    let summary = orchestrator.run(&records).await;
    drop(orchestrator);
    progress.await.ok();

    println!("\n{}", style("Deletion Summary").bold());
    println!("{}", "-".repeat(40));
    println!("{:<22} {}", "External IDs:", summary.processed_external_ids().len());
    println!("{:<22} {}", "Deleted:", summary.count(&DeletionStatus::Deleted));
    println!("{:<22} {}", "Not found:", summary.count(&DeletionStatus::NotFound));
    println!("{:<22} {}", "Failed:", summary.failed_count());

    for failure in &summary.failures {
        println!("{} {}: {}", style("✗").red(), failure.identifier, failure.reason);
    }
    for outcome in &summary.outcomes {
        if let DeletionStatus::Failed(reason) = &outcome.status {
            println!("{} {}: {}", style("✗").red(), outcome.external_id, reason);
        }
    }

    if summary.all_succeeded {
        println!("\n{} All deletions succeeded", style("✓").green());
    } else {
        println!("\n{} Some deletions failed", style("!").yellow());
    }
    Ok(())
}
