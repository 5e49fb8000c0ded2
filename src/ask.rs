use anyhow::{anyhow, Result};

use crate::config::Config;
use crate::runtime::assistant_from_config;

/// `opsdesk ask`: answer one question and print the source previews.
pub async fn run_ask(config: &Config, question: &str, json: bool) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let assistant = assistant_from_config(config).await?;
    let answer = assistant
        .ask(question)
        .await
        .map_err(|e| anyhow!("Failed to generate an answer: {}", e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("sources:");
        for source in &answer.sources {
            println!("  - {}", source);
        }
    }
    Ok(())
}
