//! The `mathdrill validate` command.

use std::path::PathBuf;

use anyhow::Result;

use mathdrill_core::config::{load_config_from, HistoryConfig};
use mathdrill_core::model::Tier;

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    for tier in Tier::ALL {
        let profile = config.generator.profile(tier);
        let shape = if profile.compound.is_some() {
            "one or two operators"
        } else {
            "one operator"
        };
        println!(
            "Tier {tier}: {shape}, {}s limit, {:?} division",
            profile.time_limit_secs, profile.division
        );
    }

    let operators = config.generator.enabled_operators();
    let symbols: Vec<&str> = operators.iter().map(|op| op.symbol()).collect();
    println!("Operators: {}", symbols.join(" "));
    for op in &operators {
        println!("  {} {}", op.symbol(), op.label());
    }

    let windows: Vec<String> = config.ledger.windows.iter().map(|w| w.to_string()).collect();
    println!(
        "Leaderboards: {} (rebuilt every {}s)",
        windows.join(", "),
        config.ledger.rebuild_interval_secs
    );

    match &config.history {
        HistoryConfig::Memory => println!("History: in memory"),
        HistoryConfig::Sqlite { path } => println!("History: sqlite at {}", path.display()),
    }

    println!("Configuration valid.");
    Ok(())
}
