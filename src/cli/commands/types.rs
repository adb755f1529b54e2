//! Output type listing.

use console::style;

use crate::cli::helpers::{target_store, truncate};
use crate::config::Settings;

/// Create the configured output types, then list every type in the repository.
pub async fn cmd_types(settings: &Settings) -> anyhow::Result<()> {
    let target = target_store(settings)?;

    for configured in &settings.output_types {
        let created = target
            .create_type(&configured.name, &configured.mimetype)
            .await?;
        println!(
            "{} {} (id {})",
            style("✓").green(),
            created.name,
            created.id
        );
    }

    let types = target.list_types().await?;
    println!("\n{}", style("Output Types").bold());
    println!("{}", "-".repeat(60));
    println!("{:<8} {:<20} Mimetype", "ID", "Name");
    println!("{}", "-".repeat(60));
    for output_type in types {
        println!(
            "{:<8} {:<20} {}",
            output_type.id,
            truncate(&output_type.name, 19),
            output_type.mimetype
        );
    }

    Ok(())
}
