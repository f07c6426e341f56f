use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for inspection commands
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "recall")]
#[command(version, about = "Chat with an assistant that remembers, and inspect what it remembered")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Memory config file (YAML). Defaults apply when omitted.
    #[arg(long, global = true, env = "RECALL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start or resume an interactive conversation
    Chat(ChatArgs),

    /// Print the stored profile and compression history of a conversation
    Show {
        /// Conversation id
        id: String,
    },

    /// Print statistics for a stored conversation
    Stats {
        /// Conversation id
        id: String,
    },

    /// Delete a stored conversation
    Forget {
        /// Conversation id
        id: String,
    },

    /// List stored conversations
    Sessions,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Resume this conversation instead of starting a new one
    #[arg(long, short)]
    pub session: Option<String>,

    /// LLM provider (openai, anthropic, ollama, deepseek, groq, google, mistral)
    #[arg(long, env = "RECALL_PROVIDER", default_value = "openai")]
    pub provider: String,

    /// Model name
    #[arg(long, env = "RECALL_MODEL", default_value = "gpt-4.1-nano")]
    pub model: String,

    /// Override the provider's base URL
    #[arg(long)]
    pub base_url: Option<String>,
}
