//! The `mathdrill rankings` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

pub async fn execute(window: String, limit: usize, config_path: Option<PathBuf>) -> Result<()> {
    let (_config, service) = super::build_service(config_path)?;

    // Scores live in memory for the life of the process, so derive them from
    // the recorded history first.
    let summary = service
        .ledger()
        .rebuild_from_history()
        .await
        .context("failed to rebuild leaderboards")?;

    let rankings = service.get_rankings(&window, limit).await?;
    if rankings.is_empty() {
        println!(
            "No scores yet in the {window} window ({} attempts recorded).",
            summary.attempts_scanned
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Rank", "User", "Score"]);
    for entry in &rankings {
        table.add_row(vec![
            Cell::new(entry.rank),
            Cell::new(&entry.display_name),
            Cell::new(format!("{:.2}", entry.score)),
        ]);
    }

    println!("Leaderboard ({window})");
    println!("{table}");
    Ok(())
}
