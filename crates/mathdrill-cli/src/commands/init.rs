//! The `mathdrill init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("mathdrill.toml").exists() {
        println!("mathdrill.toml already exists, skipping.");
    } else {
        std::fs::write("mathdrill.toml", SAMPLE_CONFIG)?;
        println!("Created mathdrill.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit mathdrill.toml to adjust ranges and leaderboard windows");
    println!("  2. Run: mathdrill validate");
    println!("  3. Run: mathdrill practice --tier easy");

    Ok(())
}

pub(crate) const SAMPLE_CONFIG: &str = r#"# mathdrill configuration

[generator]
# Operators left out of the default set and refused on request.
disabled_operators = []

[generator.easy]
additive = { left = { min = 1, max = 9 }, right = { min = 1, max = 9 } }
multiplicative = { left = { min = 1, max = 9 }, right = { min = 1, max = 9 } }
divisor = { min = 1, max = 9 }
quotient = { min = 1, max = 9 }
division = "exact"
time_limit_secs = 10

[generator.hard]
additive = { left = { min = 100, max = 999 }, right = { min = 10, max = 99 } }
multiplicative = { left = { min = 100, max = 999 }, right = { min = 10, max = 99 } }
divisor = { min = 10, max = 99 }
quotient = { min = 1, max = 9 }
division = "exact"
compound = { operand = { min = 1, max = 9 }, chance = 0.5 }
time_limit_secs = 30

[service]
question_ttl_secs = 1800
store_timeout_ms = 2000
rest_reminder_secs = 600

[ledger]
windows = ["hourly", "daily"]
base_increment = 50.0
correct_bonus = 100.0
decay_secs = 86400.0
rebuild_interval_secs = 18000
rebuild_on_start = false

[history]
backend = "sqlite"
path = "${HOME}/.local/share/mathdrill/history.db"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses_and_validates() {
        let config = mathdrill_core::config::parse_config(SAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.generator.hard.time_limit_secs, 30);
        assert!(config.generator.hard.compound.is_some());
    }
}
