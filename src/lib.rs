//! Toolcode: a streaming ReAct agent loop with an embedded tool-code sandbox.
//!
//! The model writes short `tool_code` blocks while it reasons. The loop
//! watches the stream, cuts generation at the first complete block, runs it
//! in a restricted interpreter against a registry of capabilities, and feeds
//! the printed result back until the model sends its final response.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolcode::prelude::*;
//!
//! # async fn example() -> toolcode::error::Result<()> {
//! let mut registry = CapabilityRegistry::new();
//! registry.register_fn("add", |args: CallArguments| async move {
//!     let a = args.get_i64("a")?;
//!     let b = args.get_i64("b")?;
//!     Ok(Value::Int(a + b))
//! });
//!
//! let transport = toolcode::transport::from_config(&TransportConfig::from_env()?, "gemini-2.5-flash")?;
//! let mut processor = TurnProcessor::new(transport, Arc::new(registry), AgentConfig::from_env()?)?;
//! let trajectory = processor.process("What is 1 + 2?", None).await?;
//! println!("{trajectory}");
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod capability;
pub mod config;
pub mod detector;
pub mod error;
pub mod prelude;
pub mod sandbox;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
