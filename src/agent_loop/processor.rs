//! The ReAct turn processor.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::capability::CapabilityRegistry;
use crate::config::AgentConfig;
use crate::detector::{CallSpan, SegmentDetector};
use crate::error::ToolcodeError;
use crate::sandbox::Sandbox;
use crate::transport::{ChatTransport, GenerationRequest};
use crate::types::Turn;

use super::budget::CycleBudget;
use super::cancellation::CancellationSignal;
use super::conversation::{Conversation, ConversationReader};
use super::events::{AgentEvent, EventEmitter, EventSink};
use super::feedback;

/// Drives one conversation: streams generations, runs detected tool code,
/// and feeds results back until the model answers.
///
/// A processor owns its conversation. Turns on one processor run one at a
/// time (`process_turn` takes `&mut self`); use a [`ConversationReader`] to
/// watch history from elsewhere while a turn is in flight.
pub struct TurnProcessor {
    transport: Arc<dyn ChatTransport>,
    sandbox: Sandbox,
    detector: SegmentDetector,
    config: AgentConfig,
    conversation: Conversation,
    session_id: Uuid,
    turn_index: u64,
}

impl TurnProcessor {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        registry: Arc<CapabilityRegistry>,
        config: AgentConfig,
    ) -> Result<Self, ToolcodeError> {
        config.validate()?;
        let detector = SegmentDetector::from_markers(&config.markers)?;
        let sandbox = Sandbox::new(registry).with_limits(config.sandbox_limits());
        Ok(Self {
            transport,
            sandbox,
            detector,
            config,
            conversation: Conversation::new(),
            session_id: Uuid::new_v4(),
            turn_index: 0,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        self.sandbox.registry()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.config.system_prompt.as_deref()
    }

    /// Replace the system prompt sent with every later request.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.config.system_prompt = Some(prompt.into());
    }

    pub fn get_history(&self) -> Vec<Turn> {
        self.conversation.snapshot()
    }

    pub fn load_history(&mut self, turns: Vec<Turn>) {
        self.conversation.replace(turns);
    }

    pub fn clear_history(&mut self) {
        self.conversation.clear();
    }

    pub fn history_reader(&self) -> ConversationReader {
        self.conversation.reader()
    }

    /// Run a turn with the configured budget and sandbox timeout.
    pub async fn process(
        &mut self,
        input: impl Into<Turn>,
        on_event: Option<EventSink>,
    ) -> Result<String, ToolcodeError> {
        let budget = CycleBudget::new(self.config.max_cycles)?;
        let timeout = self.config.sandbox_timeout;
        self.process_turn(input, on_event, budget, timeout).await
    }

    /// Run one user turn to completion and return its trajectory text.
    ///
    /// The trajectory holds every generation up to its cut point plus the
    /// feedback written after each tool run. Sandbox failures are fed back to
    /// the model; transport failures and an exhausted `budget` end the turn.
    pub async fn process_turn(
        &mut self,
        input: impl Into<Turn>,
        on_event: Option<EventSink>,
        budget: CycleBudget,
        sandbox_timeout: Duration,
    ) -> Result<String, ToolcodeError> {
        let turn = feedback::prepare_user_turn(&self.config.markers, input.into())?;
        self.turn_index += 1;
        let span = tracing::info_span!(
            "process_turn",
            session_id = %self.session_id,
            turn = self.turn_index,
            max_cycles = budget.max(),
        );
        let emitter = EventEmitter::new(on_event);
        self.run_turn(turn, &emitter, budget, sandbox_timeout)
            .instrument(span)
            .await
    }

    async fn run_turn(
        &mut self,
        turn: Turn,
        emitter: &EventEmitter,
        mut budget: CycleBudget,
        sandbox_timeout: Duration,
    ) -> Result<String, ToolcodeError> {
        self.conversation.push(turn);
        let markers = self.config.markers.clone();
        let mut trajectory = String::new();
        let mut empty_streak = 0u32;

        loop {
            budget.ensure_remaining()?;
            debug!(cost = budget.cost(), "requesting generation");
            let (buffer, call) = self.generate(emitter).await?;

            if !self.config.generation_delay.is_zero() {
                tokio::time::sleep(self.config.generation_delay).await;
            }

            if buffer.is_empty() {
                empty_streak += 1;
                warn!(streak = empty_streak, "empty generation");
                if empty_streak >= self.config.max_empty_generations {
                    return Err(ToolcodeError::generation(format!(
                        "model returned {empty_streak} empty generations in a row"
                    )));
                }
                continue;
            }
            empty_streak = 0;
            budget.charge();

            match call {
                Some(span) => {
                    let feedback_text = self.run_call(&span, emitter, &budget, sandbox_timeout).await;
                    let assistant_text = format!("{}\n{feedback_text}", &buffer[..span.end]);
                    trajectory.push_str(&assistant_text);
                    self.conversation.extend([
                        Turn::assistant(assistant_text),
                        Turn::user(feedback::continue_instruction(&markers)),
                    ]);
                }
                None => {
                    trajectory.push_str(&buffer);
                    // the marker may have been written in an earlier cycle
                    if trajectory.contains(markers.response_header.as_str()) {
                        self.conversation.push(Turn::assistant(buffer));
                        info!(
                            cycles = budget.cost(),
                            chars = trajectory.len(),
                            "turn complete"
                        );
                        return Ok(trajectory);
                    }
                    warn!(cost = budget.cost(), "generation ended without a response marker");
                    self.conversation.extend([
                        Turn::assistant(buffer),
                        Turn::user(feedback::corrective_alert(&markers)),
                    ]);
                    emitter.emit(AgentEvent::Info(feedback::NO_RESPONSE_INFO.to_string()));
                }
            }
        }
    }

    /// Stream one generation, stopping at the first complete call block.
    async fn generate(
        &self,
        emitter: &EventEmitter,
    ) -> Result<(String, Option<CallSpan>), ToolcodeError> {
        let mut request =
            GenerationRequest::new(self.conversation.snapshot(), self.config.settings.clone());
        request.system_prompt = self.config.system_prompt.clone();

        let cancel = CancellationSignal::new();
        let mut stream = self.transport.stream_text(&request, cancel.clone()).await?;
        let mut buffer = String::new();

        while let Some(delta) = stream.next().await {
            let delta = delta?;
            if delta.text.is_empty() {
                continue;
            }
            buffer.push_str(&delta.text);
            emitter.emit(AgentEvent::TextChunk(delta.text));
            if let Some(span) = self.detector.detect(&buffer) {
                cancel.cancel();
                debug!(start = span.start, end = span.end, "call detected, cancelling stream");
                return Ok((buffer, Some(span)));
            }
        }
        Ok((buffer, None))
    }

    /// Run detected tool code and return the feedback text for it.
    async fn run_call(
        &self,
        span: &CallSpan,
        emitter: &EventEmitter,
        budget: &CycleBudget,
        sandbox_timeout: Duration,
    ) -> String {
        emitter.emit(AgentEvent::ToolCallStarted(span.call_text.clone()));
        let result = self
            .sandbox
            .evaluate_with_timeout(&span.call_text, sandbox_timeout)
            .await
            .map(|outcome| outcome.to_feedback());
        match &result {
            Ok(body) => emitter.emit(AgentEvent::ToolResult(body.clone())),
            Err(err) => {
                warn!(error = %err, "tool code failed");
                emitter.emit(AgentEvent::ToolError(err.to_string()));
            }
        }
        feedback::tool_feedback(&self.config.markers, &result, budget.is_final_cycle())
    }
}

impl std::fmt::Debug for TurnProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnProcessor")
            .field("transport", &self.transport.name())
            .field("session_id", &self.session_id)
            .field("turn_index", &self.turn_index)
            .field("history_len", &self.conversation.len())
            .finish()
    }
}
