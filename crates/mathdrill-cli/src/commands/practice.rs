//! The `mathdrill practice` command.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use mathdrill_core::scheduler::RebuildScheduler;
use mathdrill_core::service::{DrillService, SubmitOutcome};

pub async fn execute(
    tier: Option<String>,
    ops: Vec<String>,
    count: usize,
    user: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(count >= 1, "count must be at least 1");
    let (config, service) = super::build_service(config_path)?;
    let scheduler = RebuildScheduler::spawn(
        service.ledger().clone(),
        config.ledger.rebuild_interval(),
        config.ledger.rebuild_on_start,
    );

    let result = run_session(&service, tier.as_deref(), &ops, count, &user).await;
    scheduler.shutdown().await;
    let (correct, answered) = result?;

    println!("Session complete: {correct}/{answered} correct");
    if let Some(&window) = config.ledger.windows.first() {
        if let Some(score) = service.ledger().score(window, &user).await? {
            println!("{window} score: {score:.2}");
        }
    }
    Ok(())
}

/// Ask up to `count` questions. Returns `(correct, answered)`.
async fn run_session(
    service: &DrillService,
    tier: Option<&str>,
    ops: &[String],
    count: usize,
    user: &str,
) -> Result<(usize, usize)> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut answered = 0usize;
    let mut correct = 0usize;

    println!("Answer each question, or type q to stop.");

    'session: for n in 1..=count {
        let view = service
            .get_question(user, tier, ops, 0)
            .await?;
        let started = Instant::now();

        let value = loop {
            print!("{n:>3}. {} = ", view.expression);
            io::stdout().flush()?;

            let Some(line) = lines.next() else {
                println!();
                break 'session;
            };
            let line = line.context("failed to read answer")?;
            let input = line.trim();
            if input.eq_ignore_ascii_case("q") {
                break 'session;
            }
            match input.parse::<f64>() {
                Ok(value) if value.is_finite() => break value,
                _ => println!("     Please enter a number."),
            }
        };

        let spent = started.elapsed().as_secs_f64();
        let outcome = service
            .submit_answer(user, &view.id, value, Some(spent))
            .await?;

        println!("     {}", outcome.message());
        if let SubmitOutcome::Graded(graded) = &outcome {
            answered += 1;
            if graded.correct {
                correct += 1;
            }
            if spent > f64::from(view.time_limit_secs) {
                println!("     (over the {}s time limit)", view.time_limit_secs);
            }
            if graded.need_rest {
                println!("     You have been at this one a while. Time for a break?");
            }
        }
    }

    Ok((correct, answered))
}
