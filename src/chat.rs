//! Interactive terminal chat.
//!
//! Gated by the configured passphrase, then loops over questions. A number
//! picks one of the suggested starter questions. Commands: `/history`,
//! `/retry` (re-answer a question whose generation failed), `/quit`.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};

use opsdesk_core::assistant::Assistant;
use opsdesk_core::auth::AccessGate;
use opsdesk_core::session::{ChatSession, Role};

use crate::auth::build_gate;
use crate::config::{AssistantConfig, Config};
use crate::runtime::assistant_from_config;

pub async fn run_chat(config: &Config) -> Result<()> {
    let assistant = assistant_from_config(config).await?;
    let gate = build_gate(&config.access)?;
    chat_loop(
        &assistant,
        gate.as_ref(),
        &config.assistant,
        BufReader::new(std::io::stdin()),
        std::io::stdout(),
    )
    .await?;
    Ok(())
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Read one line on the blocking pool, handing the reader back.
async fn next_line<R>(mut input: R) -> Result<(R, Option<String>)>
where
    R: BufRead + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<(R, Option<String>)> {
        let line = read_line(&mut input)?;
        Ok((input, line))
    })
    .await
    .context("stdin reader task panicked")?
}

/// Run the chat until `/quit` or end of input; returns the session.
pub async fn chat_loop<R: BufRead + Send + 'static, W: Write>(
    assistant: &Assistant,
    gate: &dyn AccessGate,
    settings: &AssistantConfig,
    mut input: R,
    mut out: W,
) -> Result<ChatSession> {
    let mut session = ChatSession::new();

    if !gate.is_open() {
        loop {
            write!(out, "Passphrase: ")?;
            out.flush()?;
            let (rest, attempt) = next_line(input).await?;
            input = rest;
            let Some(attempt) = attempt else {
                return Ok(session);
            };
            if session.authenticate(gate, &attempt) {
                break;
            }
            writeln!(out, "Incorrect passphrase.")?;
        }
    }

    writeln!(out, "{}", settings.name)?;
    writeln!(
        out,
        "Ask a question, or pick a suggestion by number. /history shows the conversation, /quit exits."
    )?;
    for (i, suggestion) in settings.suggestions.iter().enumerate() {
        writeln!(out, "  [{}] {}", i + 1, suggestion)?;
    }

    loop {
        write!(out, "> ")?;
        out.flush()?;
        let (rest, line) = next_line(input).await?;
        input = rest;
        let Some(line) = line else {
            break;
        };

        match line.as_str() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                for turn in session.turns() {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    writeln!(out, "[{}] {}: {}", turn.at.format("%H:%M:%S"), who, turn.content)?;
                }
                continue;
            }
            "/retry" => {
                if session.pending_question().is_none() {
                    writeln!(out, "Nothing to retry.")?;
                    continue;
                }
            }
            _ => {
                let question = match line.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= settings.suggestions.len() => {
                        settings.suggestions[n - 1].clone()
                    }
                    _ => line,
                };
                session.push_user(question);
            }
        }

        match assistant.respond(&mut session).await {
            Ok(Some(answer)) => {
                writeln!(out, "{}", answer.answer)?;
                if !answer.sources.is_empty() {
                    writeln!(out, "Sources:")?;
                    for source in &answer.sources {
                        writeln!(out, "  - {}", source)?;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                writeln!(
                    out,
                    "Could not generate an answer ({}). Type /retry to try again.",
                    e
                )?;
            }
        }
    }

    Ok(session)
}
