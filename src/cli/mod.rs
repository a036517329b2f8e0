//! Command-line interface for turnloop.

use clap::{Parser, Subcommand};

/// turnloop CLI
#[derive(Parser, Debug)]
#[command(name = "turnloop", version, about = "Streaming tool-call orchestration from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one chat turn, executing tool calls until the model answers
    Chat(ChatArgs),
    /// Show the resolved configuration
    Config,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model to use (format: provider:model, e.g., openai:gpt-4o-mini)
    #[arg(short, long, default_value = "openai:gpt-4o-mini")]
    pub model: String,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Do not offer tools to the model
    #[arg(long)]
    pub no_tools: bool,

    /// Print tool-result blocks as they are streamed
    #[arg(long)]
    pub show_tools: bool,

    /// User prompt (positional)
    pub prompt: Option<String>,
}

impl ChatArgs {
    /// Split `provider:model`. A bare model id is served by `openai`.
    pub fn model_ref(&self) -> crate::types::ModelRef {
        match self.model.split_once(':') {
            Some((provider, _)) if !provider.is_empty() => {
                crate::types::ModelRef::new(provider, self.model.clone())
            }
            _ => crate::types::ModelRef::new("openai", self.model.clone()),
        }
    }
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_with_defaults() {
        let cli = Cli::try_parse_from(["turnloop", "chat"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.model, "openai:gpt-4o-mini");
                assert!(args.system.is_none());
                assert!(args.temperature.is_none());
                assert!(!args.no_tools);
                assert!(args.prompt.is_none());
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_chat_with_all_options() {
        let cli = Cli::try_parse_from([
            "turnloop",
            "chat",
            "-m",
            "deepseek:deepseek-chat",
            "-s",
            "You are helpful",
            "-t",
            "0.7",
            "--no-tools",
            "Hello world",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat(args) => {
                let model = args.model_ref();
                assert_eq!(model.provider, "deepseek");
                assert_eq!(model.backend_id(), "deepseek-chat");
                assert_eq!(args.system.as_deref(), Some("You are helpful"));
                assert!((args.temperature.unwrap() - 0.7).abs() < f64::EPSILON);
                assert!(args.no_tools);
                assert_eq!(args.prompt.as_deref(), Some("Hello world"));
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn bare_model_defaults_to_openai() {
        let cli = Cli::try_parse_from(["turnloop", "chat", "-m", "gpt-4o"]).unwrap();
        let Commands::Chat(args) = cli.command else {
            panic!("expected Chat");
        };
        assert_eq!(args.model_ref().provider, "openai");
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["turnloop"]).is_err());
    }
}
