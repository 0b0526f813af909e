//! The `mathdrill stats` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, Table};

use mathdrill_core::model::Tier;
use mathdrill_core::service::format_answer;
use mathdrill_core::traits::HistoryFilter;

pub async fn execute(
    user: String,
    tier: Option<String>,
    date: Option<String>,
    limit: usize,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let filter = build_filter(tier.as_deref(), date.as_deref())?;
    let (_config, service) = super::build_service(config_path)?;

    let stats = service.statistics(&user).await?;
    println!("Statistics for {user}");
    println!(
        "  Questions: {} (easy {}, medium {}, hard {})",
        stats.total_questions, stats.easy_questions, stats.medium_questions, stats.hard_questions
    );
    println!(
        "  Attempts:  {} ({} correct, {:.1}% accuracy)",
        stats.total_attempts, stats.correct_answers, stats.accuracy
    );

    let attempts = service.history(&user, &filter).await?;
    if attempts.is_empty() {
        println!("\nNo matching attempts.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["When (UTC)", "Tier", "Question", "Answer", "Result"]);
    for attempt in attempts.iter().take(limit) {
        table.add_row(vec![
            Cell::new(attempt.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(attempt.tier),
            Cell::new(&attempt.expression),
            Cell::new(format_answer(attempt.submitted_answer)),
            Cell::new(if attempt.correct {
                "correct".to_string()
            } else {
                format!("wrong ({})", format_answer(attempt.correct_answer))
            }),
        ]);
    }
    println!("\n{table}");
    if attempts.len() > limit {
        println!("{} more not shown.", attempts.len() - limit);
    }

    Ok(())
}

fn build_filter(tier: Option<&str>, date: Option<&str>) -> Result<HistoryFilter> {
    let mut filter = match date {
        Some(date) => {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("invalid date {date:?}, expected YYYY-MM-DD"))?;
            HistoryFilter::on_date(day)
        }
        None => HistoryFilter::default(),
    };
    if let Some(tier) = tier {
        filter = filter.with_tier(tier.parse::<Tier>()?);
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_from_date_and_tier() {
        let filter = build_filter(Some("hard"), Some("2024-02-29")).unwrap();
        assert_eq!(filter.tier, Some(Tier::Hard));
        assert!(filter.since.is_some());
        assert!(filter.until.is_some());
    }

    #[test]
    fn bad_date_is_rejected() {
        assert!(build_filter(None, Some("29/02/2024")).is_err());
    }
}
