//! Interactive search-chat session.
//!
//! Reads prompts from stdin and streams answers to stdout. Typing a new prompt
//! while an answer is still streaming cancels that answer. Configuration comes
//! from the environment (`SEARCH_CHAT_ENDPOINT`, `SEARCH_CHAT_PROVIDER`,
//! `SEARCH_CHAT_API_KEY`, `SEARCH_CHAT_MODEL`, `SEARCH_CHAT_TEMPERATURE`);
//! logging is controlled with `RUST_LOG`.

use anyhow::Context;
use futures::StreamExt;
use search_chat::{ApiConfig, CancellationToken, Session, WebSearch};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = ApiConfig::from_env().context("failed to load configuration")?;
    let search = WebSearch::new().context("failed to set up web search")?;
    let session = Arc::new(
        Session::new(&config, Arc::new(search)).context("failed to set up chat session")?,
    );

    println!("\n=== Welcome to the AI Assistant ===");
    println!("Settings:\n");
    println!("endpoint: {}", config.endpoint);
    println!("{:#?}", config.request);
    println!("\nType your questions and press Enter. Type 'exit' to quit.\n");

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut in_flight: Option<JoinHandle<()>> = None;
    show_prompt()?;

    loop {
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else { break };
                let prompt = line.context("failed to read input")?;
                let prompt = prompt.trim();

                if prompt.eq_ignore_ascii_case("exit") {
                    println!("\nGoodbye!\n");
                    break;
                }
                if prompt.is_empty() {
                    if in_flight.is_none() {
                        show_prompt()?;
                    }
                    continue;
                }

                // Signals the running turn, then waits for it to unwind so its
                // last words don't interleave with the new answer.
                let token = session.begin_turn();
                if let Some(mut previous) = in_flight.take() {
                    settle(&mut previous).await;
                }

                println!("\nAI Response:\n");
                in_flight = Some(tokio::spawn(answer(
                    Arc::clone(&session),
                    prompt.to_string(),
                    token,
                )));
            }
            _ = finished(&mut in_flight) => {
                in_flight = None;
                show_prompt()?;
            }
        }
    }

    session.shutdown();
    if let Some(mut turn) = in_flight {
        settle(&mut turn).await;
    }
    Ok(())
}

async fn answer(session: Arc<Session>, prompt: String, token: CancellationToken) {
    let mut out = std::io::stdout();
    match session.ask(&prompt, &token, &mut out).await {
        Ok(_) => println!("\n{}\n", "─".repeat(80)),
        Err(e) if e.is_cancelled() => println!("\nPrevious request cancelled."),
        Err(e) => eprintln!("\nError: {}", e),
    }
}

/// Completes when the turn in flight ends; never completes when idle.
async fn finished(turn: &mut Option<JoinHandle<()>>) {
    match turn {
        Some(handle) => settle(handle).await,
        None => std::future::pending().await,
    }
}

/// Waits for a turn task, logging it if the task panicked.
async fn settle(handle: &mut JoinHandle<()>) {
    if let Err(e) = handle.await {
        log::error!("turn task failed: {}", e);
    }
}

fn show_prompt() -> anyhow::Result<()> {
    print!("\nAsk anything: ");
    std::io::stdout().flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settle_survives_panicked_turn() {
        let mut turn: JoinHandle<()> = tokio::spawn(async { panic!("turn blew up") });
        settle(&mut turn).await;
        assert!(turn.is_finished());
    }

    #[tokio::test]
    async fn test_finished_returns_once_turn_ends() {
        let mut in_flight = Some(tokio::spawn(async {}));
        finished(&mut in_flight).await;
        assert!(in_flight.as_ref().is_some_and(|turn| turn.is_finished()));
    }
}
