//! Restricted evaluator for model-authored tool code.
//!
//! Tool code is parsed into a small expression grammar, checked against a
//! static policy, then evaluated by a tree-walking interpreter whose only
//! side effects are `print` capture and calls into the
//! [`CapabilityRegistry`]. There is no path to the filesystem, the network,
//! or the host process other than through registered capabilities.
//!
//! ```no_run
//! use std::time::Duration;
//! use toolcode::capability::{CapabilityRegistry, Value};
//!
//! # async fn example() -> toolcode::error::Result<()> {
//! let mut registry = CapabilityRegistry::new();
//! registry.register_fn("add", |args| async move {
//!     Ok(Value::Int(args.get_i64("a")? + args.get_i64("b")?))
//! });
//! let outcome = toolcode::sandbox::evaluate(
//!     "print(capability.add(a=1, b=2))",
//!     &registry,
//!     Duration::from_secs(10),
//!     65_536,
//! )
//! .await?;
//! assert_eq!(outcome.to_feedback(), "3");
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod builtins;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod policy;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::{CapabilityRegistry, Value};
use crate::error::ToolcodeError;
use crate::util::with_timeout;
use interpreter::Interpreter;

/// Default wall-clock budget for one sandbox run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on captured output, in bytes.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 65_536;

/// Feedback text when a run printed nothing.
pub const NO_RESULT_TEXT: &str = "[no execution result]";

/// Feedback text when every print call was empty.
pub const INVALID_RESULT_TEXT: &str = "[invalid result]";

/// One captured `print(...)` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintRecord {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

/// Everything a sandbox run printed, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    pub records: Vec<PrintRecord>,
}

impl ExecutionOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PrintRecord> {
        self.records.iter()
    }

    /// Render the outcome as the text fed back to the model: every
    /// positional value of every record, one per line.
    pub fn to_feedback(&self) -> String {
        if self.records.is_empty() {
            return NO_RESULT_TEXT.to_string();
        }
        let lines: Vec<String> = self
            .records
            .iter()
            .flat_map(|record| record.positional.iter().map(Value::to_string))
            .collect();
        if lines.is_empty() {
            INVALID_RESULT_TEXT.to_string()
        } else {
            lines.join("\n")
        }
    }
}

impl<'a> IntoIterator for &'a ExecutionOutcome {
    type Item = &'a PrintRecord;
    type IntoIter = std::slice::Iter<'a, PrintRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Resource limits for a sandbox run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    #[serde(with = "crate::config::duration_ms")]
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Parse, check and run `call_text` against `registry`.
///
/// Fails with [`ToolcodeError::UnsafeInput`] before anything runs when the
/// code falls outside the accepted grammar or policy. Once running, a run
/// that exceeds `timeout` is abandoned with [`ToolcodeError::Timeout`] and
/// one that prints more than `max_output_bytes` stops with
/// [`ToolcodeError::OutputTooLarge`].
pub async fn evaluate(
    call_text: &str,
    registry: &CapabilityRegistry,
    timeout: Duration,
    max_output_bytes: usize,
) -> Result<ExecutionOutcome, ToolcodeError> {
    let program = parser::parse(call_text)?;
    policy::check(&program)?;
    tracing::debug!(
        statements = program.statements.len(),
        timeout_ms = timeout.as_millis() as u64,
        "evaluating tool code"
    );
    let outcome = with_timeout(
        timeout,
        Interpreter::new(registry, max_output_bytes).run(&program),
    )
    .await;
    match &outcome {
        Ok(outcome) => tracing::debug!(records = outcome.len(), "tool code finished"),
        Err(err) => tracing::debug!(error = %err, "tool code failed"),
    }
    outcome
}

/// A registry bundled with limits, shared across cycles.
#[derive(Debug, Clone)]
pub struct Sandbox {
    registry: Arc<CapabilityRegistry>,
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            limits: SandboxLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// Run `call_text` under this sandbox's limits, overriding the timeout.
    pub async fn evaluate_with_timeout(
        &self,
        call_text: &str,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, ToolcodeError> {
        evaluate(call_text, &self.registry, timeout, self.limits.max_output_bytes).await
    }

    pub async fn evaluate(&self, call_text: &str) -> Result<ExecutionOutcome, ToolcodeError> {
        self.evaluate_with_timeout(call_text, self.limits.timeout).await
    }
}
