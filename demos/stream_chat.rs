//! Streaming chat example.
//!
//! Submits one message to a research backend and renders the agent
//! timeline and the answer as they stream in. Ctrl-C cancels the session.
//!
//! Run with:
//! ```bash
//! AGENTFEED_BASE_URL=http://localhost:8000 RUST_LOG=agentfeed_session=debug \
//!     cargo run --example stream_chat -- "How did Q3 sales compare to Q2?"
//! ```

use agentfeed::prelude::*;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let message = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let message = if message.is_empty() {
        "Give me an overview of this quarter's market trends.".to_string()
    } else {
        message
    };

    let config = ClientConfig::from_env()?;
    println!("🔌 Backend: {}\n", config.stream_url()?);

    let store = InMemoryConversationStore::new();
    let client = ChatClient::from_config(&config, Arc::new(store.clone()))?;
    let handle = client.submit(ChatRequest::new(message)).await?;

    let cancel_client = client.clone();
    let conversation_id = handle.conversation_id().to_string();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_client.cancel(&conversation_id);
        }
    });

    let mut snapshots = handle.snapshots();
    let mut printed = 0;
    let mut agents = AgentTimeline::new();
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();

        for (agent, entry) in snapshot.agent_timeline.iter() {
            if agents.get(agent) != Some(entry) {
                eprintln!("  🤖 {agent}: {:?}", entry.status);
            }
        }
        agents = snapshot.agent_timeline.clone();

        if snapshot.accumulated_text.len() > printed {
            print!("{}", &snapshot.accumulated_text[printed..]);
            io::stdout().flush()?;
            printed = snapshot.accumulated_text.len();
        }

        if snapshot.phase.is_terminal() {
            break;
        }
    }
    let outcome = handle.outcome().await;
    // The last deltas may land in the same update that finalizes.
    if let Some(message) = outcome.message() {
        if message.text.len() > printed {
            print!("{}", &message.text[printed..]);
        }
    }
    println!("\n");

    match outcome {
        SessionOutcome::Finalized(message) => {
            println!("✅ Committed message {} ({} chars)", message.message_id, message.text.len());
            if message.report.is_some() {
                println!("📄 A report is available for this answer");
            }
        }
        SessionOutcome::Cancelled => println!("⏹️  Cancelled"),
        SessionOutcome::Failed(e) => println!("❌ {e}"),
    }
    println!("💾 Stored messages: {}", store.commit_count().await);

    Ok(())
}
