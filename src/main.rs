//! Toolcode CLI binary entry point.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use toolcode::agent_loop::{AgentEvent, CycleBudget, EventSink, TurnProcessor};
use toolcode::cli::{demo_registry, truncate_for_display, ChatArgs, Cli, Commands, ReplCommand};
use toolcode::config::{AgentConfig, TransportConfig};
use toolcode::error::ToolcodeError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(chat_args) => handle_chat(chat_args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AgentConfig::from_env()?;
    if let Some(model) = args.model {
        config.settings.model = model;
    }
    if let Some(max) = args.max_cycles {
        config.max_cycles = max;
    }
    if let Some(ms) = args.sandbox_timeout_ms {
        config.sandbox_timeout = Duration::from_millis(ms);
    }
    if let Some(system) = args.system {
        config.system_prompt = Some(system);
    }

    let mut transport_config = TransportConfig::from_env()?;
    if let Some(provider) = args.provider {
        transport_config.provider = provider;
    }
    let transport = toolcode::transport::from_config(&transport_config, &config.settings.model)?;
    let mut processor = TurnProcessor::new(transport, Arc::new(demo_registry()), config)?;

    // Stream events to terminal
    let sink: EventSink = Arc::new(|event: AgentEvent| match event {
        AgentEvent::TextChunk(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        AgentEvent::ToolCallStarted(code) => {
            eprintln!("\n⚡ {}", truncate_for_display(&code, 200));
        }
        AgentEvent::ToolResult(text) => eprintln!("  ✅ {}", truncate_for_display(&text, 200)),
        AgentEvent::ToolError(text) => eprintln!("  ❌ {}", truncate_for_display(&text, 200)),
        AgentEvent::Info(text) => eprintln!("  ℹ {text}"),
    });

    if let Some(prompt) = args.prompt {
        run_turn(&mut processor, prompt, &sink).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Clear => {
                processor.clear_history();
                eprintln!("history cleared");
            }
            ReplCommand::History => {
                for turn in processor.get_history() {
                    eprintln!("[{}] {}", turn.role, truncate_for_display(&turn.text, 400));
                }
            }
            ReplCommand::Prompt(prompt) => run_turn(&mut processor, prompt, &sink).await?,
        }
    }

    Ok(())
}

async fn run_turn(
    processor: &mut TurnProcessor,
    prompt: String,
    sink: &EventSink,
) -> Result<(), ToolcodeError> {
    let budget = CycleBudget::new(processor.config().max_cycles)?;
    let timeout = processor.config().sandbox_timeout;
    match processor
        .process_turn(prompt, Some(Arc::clone(sink)), budget, timeout)
        .await
    {
        Ok(_) => {
            println!(); // newline after streaming
            Ok(())
        }
        // the turn is lost but the session can continue
        Err(err @ ToolcodeError::CycleBudgetExceeded { .. }) => {
            println!();
            eprintln!("❌ {err}");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
