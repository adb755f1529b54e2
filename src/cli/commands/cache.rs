//! Transcription cache maintenance.

use console::style;

use crate::cli::helpers::open_cache;
use crate::config::Settings;

pub fn cmd_cache_stats(settings: &Settings) -> anyhow::Result<()> {
    let path = settings.cache_path();
    if !path.exists() {
        println!("{} No cache at {}", style("!").yellow(), path.display());
        return Ok(());
    }

    let cache = open_cache(settings)?;
    println!("\n{}", style("Transcription Cache").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Location:", path.display());
    println!("{:<20} {}", "Entries:", cache.len()?);
    println!("{:<20} {}", "Purge threshold:", settings.cache_threshold);
    Ok(())
}

pub fn cmd_cache_purge(settings: &Settings) -> anyhow::Result<()> {
    let cache = open_cache(settings)?;
    let removed = cache.len()?;
    cache.purge_all()?;
    println!(
        "{} Removed {} cached entries",
        style("✓").green(),
        removed
    );
    Ok(())
}
