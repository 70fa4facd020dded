use anyhow::Result;
use clap::Parser;
use colored::*;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ragkit_core::{AppConfig, QdrantConfig, VectorStore};
use ragkit_generation::GenerationOrchestrator;
use ragkit_pipeline::{ChatOptions, PipelineCoordinator};
use ragkit_providers::{AnthropicProvider, GeminiProvider, OpenAiEmbedder, OpenAiProvider};
use ragkit_retrieval::{MemoryVectorStore, QdrantStore, RetrievalEngine, reranker_from_env};
use ragkit_session::SessionStore;

#[derive(Parser)]
#[command(name = "ragkit")]
#[command(about = "Korean RAG chatbot backend with hybrid retrieval and multi-LLM fallback", long_about = None)]
struct Cli {
    /// Send one message and exit instead of starting the chat loop
    #[arg(short, long)]
    message: Option<String>,

    /// Use the in-memory vector store instead of Qdrant
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::default();

    let store: Arc<dyn VectorStore> = if cli.in_memory {
        println!("{}", "Using in-memory vector store".yellow());
        Arc::new(MemoryVectorStore::new())
    } else {
        let qdrant_config = QdrantConfig::from_env()?;
        match QdrantStore::connect(&qdrant_config) {
            Ok(store) => {
                println!("{} {}", "Connected to Qdrant at".green(), qdrant_config.url);
                Arc::new(store)
            }
            Err(e) => {
                println!(
                    "{} {}. Falling back to the in-memory store.",
                    "Qdrant unavailable:".yellow(),
                    e
                );
                Arc::new(MemoryVectorStore::new())
            }
        }
    };

    let embedder = Arc::new(OpenAiEmbedder::from_env()?);

    let reranker = if config.retrieval.rerank.enabled {
        match reranker_from_env(&config.retrieval.rerank.provider) {
            Ok(reranker) => Some(reranker),
            Err(e) => {
                println!("{} {}", "Reranker unavailable:".yellow(), e);
                None
            }
        }
    } else {
        None
    };

    let retrieval = Arc::new(RetrievalEngine::new(
        embedder,
        None,
        store,
        reranker,
        config.retrieval.clone(),
    ));

    let mut generation = GenerationOrchestrator::new(config.llm.clone());
    match GeminiProvider::from_env() {
        Ok(provider) => generation.register(Arc::new(provider)),
        Err(e) => println!("{} {}", "Gemini not configured:".yellow(), e),
    }
    match OpenAiProvider::from_env() {
        Ok(provider) => generation.register(Arc::new(provider)),
        Err(e) => println!("{} {}", "OpenAI not configured:".yellow(), e),
    }
    match AnthropicProvider::from_env() {
        Ok(provider) => generation.register(Arc::new(provider)),
        Err(e) => println!("{} {}", "Anthropic not configured:".yellow(), e),
    }
    if generation.available_providers().is_empty() {
        anyhow::bail!("No LLM providers configured; set at least one API key");
    }
    println!(
        "{} {}",
        "Providers:".green(),
        generation.available_providers().join(", ")
    );

    let sessions = Arc::new(SessionStore::new(config.session.clone()));
    sessions.start_sweeper();

    let coordinator = PipelineCoordinator::new(
        sessions.clone(),
        retrieval,
        Arc::new(generation),
        config.pipeline.clone(),
    );

    if let Some(message) = cli.message {
        let outcome = coordinator
            .handle_chat(&message, None, &ChatOptions::default())
            .await?;
        print_outcome(&outcome);
        sessions.shutdown();
        return Ok(());
    }

    chat_loop(&coordinator).await?;
    sessions.shutdown();
    Ok(())
}

async fn chat_loop(coordinator: &PipelineCoordinator) -> Result<()> {
    println!();
    println!("{}", "ragkit chat: type /quit to exit, /stats for counters".cyan());

    let mut session_id: Option<String> = None;

    loop {
        print!("{} ", ">".cyan());
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/stats" => {
                let stats = coordinator.stats().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                continue;
            }
            "/history" => {
                if let Some(id) = &session_id {
                    let history = coordinator.get_history(id, None);
                    for message in &history.messages {
                        println!("{}: {}", message.role.bold(), message.content);
                    }
                } else {
                    println!("{}", "No session yet".yellow());
                }
                continue;
            }
            _ => {}
        }

        match coordinator
            .handle_chat(input, session_id.as_deref(), &ChatOptions::default())
            .await
        {
            Ok(outcome) => {
                session_id = Some(outcome.session_id.clone());
                print_outcome(&outcome);
            }
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    Ok(())
}

fn print_outcome(outcome: &ragkit_core::PipelineOutcome) {
    if outcome.error {
        println!("{}", outcome.answer.red());
        return;
    }

    println!("{}", outcome.answer);
    if !outcome.sources.is_empty() {
        println!();
        for source in &outcome.sources {
            let mut label = format!("[{}] {}", source.id, source.document);
            if let Some(page) = source.page {
                label.push_str(&format!(" p.{}", page));
            }
            println!(
                "{} {}",
                label.dimmed(),
                format!("({:.2})", source.relevance).dimmed()
            );
        }
    }
    if let Some(model_info) = &outcome.model_info {
        println!(
            "{}",
            format!(
                "{}/{} · {} tokens · {:.2}s",
                model_info.provider,
                model_info.model,
                outcome.tokens_used,
                outcome.processing_time
            )
            .dimmed()
        );
    }
}
