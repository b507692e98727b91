//! CLI entry point for toolcode.

use clap::{Parser, Subcommand};

use crate::capability::{CallArguments, CapabilityRegistry, Value};
use crate::config::ProviderKind;
use crate::error::ToolcodeError;

/// Toolcode CLI
#[derive(Parser, Debug)]
#[command(name = "toolcode", version, about = "Streaming ReAct agent with a tool-code sandbox")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with a model that can call the demo capabilities
    Chat(ChatArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Transport to use (openai-compatible, gemini); defaults to TOOLCODE_PROVIDER
    #[arg(short, long)]
    pub provider: Option<ProviderKind>,

    /// Model identifier, e.g. gemini-2.5-flash
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Cycles each turn may use
    #[arg(long)]
    pub max_cycles: Option<u32>,

    /// Wall-clock budget for each tool-code run, in milliseconds
    #[arg(long)]
    pub sandbox_timeout_ms: Option<u64>,

    /// First prompt; without it the session starts interactively
    pub prompt: Option<String>,
}

/// Slash commands understood by the interactive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    History,
    Clear,
    Quit,
    Prompt(String),
    Empty,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/history" => Self::History,
            "/clear" => Self::Clear,
            "/quit" | "/exit" => Self::Quit,
            other => Self::Prompt(other.to_string()),
        }
    }
}

/// Registry with the `add`, `echo` and `now` demo capabilities.
pub fn demo_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry
        .register_fn("add", |args: CallArguments| async move {
            let a = number_arg(&args, "a", 0)?;
            let b = number_arg(&args, "b", 1)?;
            Ok(match (a, b) {
                (Value::Int(a), Value::Int(b)) => Value::Int(a.saturating_add(b)),
                (a, b) => Value::Float(as_f64(&a) + as_f64(&b)),
            })
        })
        .register_fn("echo", |args: CallArguments| async move {
            let text = args
                .get("text")
                .or_else(|| args.positional(0))
                .map(ToString::to_string)
                .unwrap_or_default();
            Ok(Value::Str(text))
        })
        .register_fn("now", |_args: CallArguments| async move {
            Ok(Value::Str(chrono::Utc::now().to_rfc3339()))
        });
    registry
}

fn number_arg(args: &CallArguments, name: &str, index: usize) -> Result<Value, ToolcodeError> {
    match args.get(name).or_else(|| args.positional(index)) {
        Some(v @ (Value::Int(_) | Value::Float(_))) => Ok(v.clone()),
        Some(other) => Err(ToolcodeError::InvalidArgument(format!(
            "{name} must be a number, got {}",
            other.type_name()
        ))),
        None => Err(ToolcodeError::InvalidArgument(format!("missing argument '{name}'"))),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

/// Keep at most `max` bytes of `text` for terminal display.
pub fn truncate_for_display(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repl_commands() {
        assert_eq!(ReplCommand::parse(" /history "), ReplCommand::History);
        assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
        assert_eq!(
            ReplCommand::parse("hello"),
            ReplCommand::Prompt("hello".into())
        );
    }

    #[test]
    fn chat_args_parse() {
        let cli = Cli::parse_from([
            "toolcode",
            "chat",
            "--provider",
            "openai",
            "--max-cycles",
            "5",
            "hi",
        ]);
        let Commands::Chat(args) = cli.command;
        assert_eq!(args.provider, Some(ProviderKind::OpenAiCompatible));
        assert_eq!(args.max_cycles, Some(5));
        assert_eq!(args.prompt.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn demo_add_handles_ints_and_floats() {
        let registry = demo_registry();
        let sum = registry
            .dispatch(
                "add",
                CallArguments::named([("a", Value::Int(1)), ("b", Value::Int(2))]),
            )
            .await
            .unwrap();
        assert_eq!(sum, Value::Int(3));
        let sum = registry
            .dispatch(
                "add",
                CallArguments::new(vec![Value::Int(1), Value::Float(0.5)], Vec::new()),
            )
            .await
            .unwrap();
        assert_eq!(sum, Value::Float(1.5));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_display("héllo", 2), "h...");
        assert_eq!(truncate_for_display("short", 10), "short");
    }
}
