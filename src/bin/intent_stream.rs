//! Streams a chat reply from the configured provider and prints the
//! animation triggers detected along the way.
//!
//! Usage: `intent_stream <prompt...>`. Config files are read from
//! `$KOKORO_CONFIG_DIR` (default: current directory).

use anyhow::{Context, Result};
use futures::StreamExt;
use kokoro_intent::ai::classifier::{dominant_intent, DEFAULT_MIN_SCORE};
use kokoro_intent::ai::{intent_config, AnimationTrigger, IntentStream};
use kokoro_intent::llm::{llm_config, Message};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    anyhow::ensure!(!prompt.trim().is_empty(), "usage: intent_stream <prompt...>");

    let config_dir = std::env::var("KOKORO_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let llm = llm_config::load_config(&config_dir.join("llm_config.json"));
    let mut intent = intent_config::load_config(&config_dir.join("intent_config.json"));
    if intent.model.is_none() {
        intent.model = llm.system_model.clone();
    }

    let provider = llm_config::build_provider(&llm);

    let (tx, mut rx) = mpsc::unbounded_channel::<AnimationTrigger>();
    let printer = tokio::spawn(async move {
        while let Some(trigger) = rx.recv().await {
            eprintln!("\n  >> {:?}: {}", trigger.channel(), trigger.label());
        }
    });

    let stream = IntentStream::new(intent, provider.clone(), Arc::new(tx));

    let mut deltas = provider
        .chat_stream(vec![Message::user(prompt)], None)
        .await
        .map_err(anyhow::Error::msg)
        .context("failed to start chat stream")?;

    let mut full = String::new();
    let mut stdout = std::io::stdout();
    while let Some(delta) = deltas.next().await {
        match delta {
            Ok(text) => {
                print!("{}", text);
                stdout.flush().ok();
                full.push_str(&text);
                stream.feed(&text);
            }
            Err(e) => {
                tracing::error!("[Demo] Stream error: {}", e);
                break;
            }
        }
    }
    println!();

    stream.flush().await;
    match dominant_intent(&full, DEFAULT_MIN_SCORE) {
        Some(trigger) => tracing::info!("[Demo] Dominant intent: {}", trigger.label()),
        None => tracing::info!("[Demo] No dominant intent"),
    }

    // Dropping the stream drops the sender, which ends the printer.
    drop(stream);
    printer.await?;
    Ok(())
}
