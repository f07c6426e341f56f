mod cli;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Serialize;
use tracing::warn;

use cli::{ChatArgs, Cli, Commands, OutputFormat};
use recall::memory::{estimate_tokens, render_system_prompt};
use recall::{
    ChatMessage, ConversationSnapshot, ConversationStore, LLMProvider, MemoryConfig, ProviderType,
    Role, SnapshotStorage, UnifiedLLMProvider, create_storage,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "recall=info".to_string()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Chat(ref args) => chat(args, config).await,
        Commands::Show { ref id } => show(id, &config, cli.format).await,
        Commands::Stats { ref id } => stats(id, &config, cli.format).await,
        Commands::Forget { ref id } => forget(id, &config).await,
        Commands::Sessions => sessions(&config, cli.format).await,
    }
}

fn load_config(cli: &Cli) -> Result<MemoryConfig> {
    let config = match &cli.config {
        Some(path) => MemoryConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => MemoryConfig::default(),
    };
    Ok(config.with_env_overrides())
}

async fn chat(args: &ChatArgs, config: MemoryConfig) -> Result<()> {
    let provider: ProviderType = args
        .provider
        .parse()
        .map_err(|e| anyhow!("{}: {}", e, args.provider))?;
    let llm: Arc<dyn LLMProvider> = Arc::new(UnifiedLLMProvider::new(
        provider,
        args.model.clone(),
        None,
        args.base_url.clone(),
    )?);

    let store = ConversationStore::from_config(llm.clone(), config).await?;
    let session = store.get(args.session.as_deref()).await;

    println!("=== Recall ({} / {}) ===", provider.as_str(), args.model);
    println!("Conversation: {}", session.id());
    println!("Commands: /stats, /profile, /quit\n");

    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            "/quit" | "/exit" => break,
            "/stats" => {
                println!("{}\n", serde_json::to_string_pretty(&session.get_stats())?);
                continue;
            }
            "/profile" => {
                println!("{}\n", serde_json::to_string_pretty(&session.user_profile())?);
                continue;
            }
            _ => {}
        }

        if let Err(e) = session.add_message(Role::User, trimmed).await {
            warn!(error = %e, "Conversation state could not be saved");
        }

        let reply = match llm.complete(&session.get_optimized_messages(), None).await {
            Ok(response) => response.content,
            Err(e) => {
                eprintln!("Error: {}\n", e);
                continue;
            }
        };
        println!("\nAssistant: {}\n", reply.trim());

        if let Err(e) = session.add_message(Role::Assistant, reply).await {
            warn!(error = %e, "Conversation state could not be saved");
        }
    }

    println!("Goodbye! Resume with: recall chat --session {}", session.id());
    Ok(())
}

async fn load_snapshot(
    storage: &Arc<dyn SnapshotStorage>,
    id: &str,
) -> Result<ConversationSnapshot> {
    let snapshot = storage
        .load(id)
        .await?
        .ok_or_else(|| anyhow!("no stored conversation with id {}", id))?;
    if snapshot.conversation_id != id {
        return Err(anyhow!(
            "stored snapshot for {} belongs to conversation {}",
            id,
            snapshot.conversation_id
        ));
    }
    Ok(snapshot)
}

async fn show(id: &str, config: &MemoryConfig, format: OutputFormat) -> Result<()> {
    let storage = create_storage(&config.storage).await;
    let snapshot = load_snapshot(&storage, id).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let system = render_system_prompt(
        &config.system_prompt,
        &snapshot.user_profile,
        &snapshot.compression_history,
        config.prompt_personal_details,
    );
    println!("Conversation {} (updated {})\n", id, snapshot.last_updated);
    println!("{}", system);
    Ok(())
}

/// Statistics of a stored conversation. The active buffer is never
/// persisted, so only compressed state is reported.
#[derive(Debug, Serialize)]
struct StoredStats {
    conversation_id: String,
    compression_chunks: usize,
    fallback_chunks: usize,
    total_processed_messages: usize,
    user_profile_field_count: usize,
    estimated_prompt_tokens: usize,
}

async fn stats(id: &str, config: &MemoryConfig, format: OutputFormat) -> Result<()> {
    let storage = create_storage(&config.storage).await;
    let snapshot = load_snapshot(&storage, id).await?;

    let system = render_system_prompt(
        &config.system_prompt,
        &snapshot.user_profile,
        &snapshot.compression_history,
        config.prompt_personal_details,
    );
    let stats = StoredStats {
        conversation_id: snapshot.conversation_id.clone(),
        compression_chunks: snapshot.compression_history.len(),
        fallback_chunks: snapshot
            .compression_history
            .iter()
            .filter(|c| c.is_fallback())
            .count(),
        total_processed_messages: snapshot.total_processed_count,
        user_profile_field_count: snapshot.user_profile.populated_field_count(),
        estimated_prompt_tokens: estimate_tokens(&[ChatMessage::system(system)]),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("Conversation:        {}", stats.conversation_id);
            println!(
                "Chunks:              {} ({} fallback)",
                stats.compression_chunks, stats.fallback_chunks
            );
            println!("Messages processed:  {}", stats.total_processed_messages);
            println!("Profile fields:      {}/7", stats.user_profile_field_count);
            println!("Prompt tokens (est): {}", stats.estimated_prompt_tokens);
        }
    }
    Ok(())
}

async fn forget(id: &str, config: &MemoryConfig) -> Result<()> {
    let storage = create_storage(&config.storage).await;
    storage.delete(id).await?;
    println!("Forgot conversation {}", id);
    Ok(())
}

async fn sessions(config: &MemoryConfig, format: OutputFormat) -> Result<()> {
    let storage = create_storage(&config.storage).await;
    let ids = storage.list_sessions().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ids)?),
        OutputFormat::Text if ids.is_empty() => println!("No stored conversations"),
        OutputFormat::Text => {
            for id in ids {
                println!("{}", id);
            }
        }
    }
    Ok(())
}
