use anyhow::{Result, anyhow};
use beacon_svc::app::{build_state, init_tracing};
use beacon_svc::config::Config;
use beacon_svc::session::DEFAULT_SESSION_ID;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let state = build_state(Config::from_env())?;
    let assistant = state
        .assistant
        .clone()
        .ok_or_else(|| anyhow!("OPENROUTER_API_KEY not set, cannot start the assistant"))?;

    println!("Welcome to the Beacon CLI!");
    println!(
        "Type 'exit' or 'quit' to stop, ':stats' for cache stats, ':clear' to clear the cache."
    );
    println!("{}", "-".repeat(50));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!("\nGoodbye!");
            break;
        };
        let input = line.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => {
                println!("Goodbye!");
                break;
            }
            ":stats" => {
                println!("{}", serde_json::to_string_pretty(&state.cache.stats())?);
                continue;
            }
            ":clear" => {
                state.cache.clear();
                assistant.clear_sources();
                println!("Cache cleared");
                continue;
            }
            _ => {}
        }

        println!("\nAssistant: Thinking...");
        match assistant.ask(DEFAULT_SESSION_ID, input).await {
            Ok(answer) => {
                let marker = if answer.cached { " (cached)" } else { "" };
                println!("Assistant{}: {}", marker, answer.text);
                for (i, source) in answer.sources.iter().enumerate() {
                    println!("  [{}] {} - {}", i + 1, source.title, source.url);
                }
            }
            Err(e) => println!("\nError: {:#}", e),
        }
    }

    Ok(())
}
