//! The `mathdrill generate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use mathdrill_core::config::load_config_from;
use mathdrill_core::generator::{GenerateRequest, ProblemGenerator};
use mathdrill_core::service::format_answer;

#[allow(clippy::too_many_arguments)]
pub fn execute(
    tier: Option<String>,
    ops: Vec<String>,
    count: usize,
    seed: Option<u64>,
    show_answers: bool,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(count >= 1, "count must be at least 1");
    anyhow::ensure!(
        matches!(format.as_str(), "text" | "json"),
        "unknown format: {format} (expected text or json)"
    );

    let config = load_config_from(config_path.as_deref())?;
    let generator =
        ProblemGenerator::new(config.generator).context("invalid generator configuration")?;
    let request = GenerateRequest::parse(tier.as_deref(), &ops, 0)?.with_scope("cli");

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for n in 1..=count {
        let question = generator.generate(&request, &mut rng)?;
        match format.as_str() {
            "json" => {
                let mut value = serde_json::to_value(question.view())?;
                if show_answers {
                    value["answer"] = serde_json::json!(question.answer);
                }
                println!("{}", serde_json::to_string(&value)?);
            }
            _ => {
                if show_answers {
                    println!(
                        "{n:>3}. {} = {}   [{}, {}s]",
                        question.expression,
                        format_answer(question.answer),
                        question.tier,
                        question.time_limit_secs
                    );
                } else {
                    println!(
                        "{n:>3}. {} =   [{}, {}s]",
                        question.expression, question.tier, question.time_limit_secs
                    );
                }
            }
        }
    }

    Ok(())
}
