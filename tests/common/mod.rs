//! Shared test helpers and a scripted transport.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use toolcode::agent_loop::{AgentEvent, CancellationSignal, EventSink};
use toolcode::capability::{CallArguments, CapabilityRegistry, Value};
use toolcode::config::SegmentMarkers;
use toolcode::error::ToolcodeError;
use toolcode::transport::{ChatTransport, GenerationRequest, TextStream};
use toolcode::types::TextStreamDelta;

/// What one generation request produces.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these chunks in order, ignoring cancellation.
    Chunks(Vec<String>),
    /// Stream these chunks, then fail mid-stream.
    ChunksThenError(Vec<String>, String),
    /// Refuse the request outright.
    Fail(String),
}

impl Script {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }
}

/// A transport that replays one [`Script`] per request and records what it
/// was asked. Running out of scripts yields empty generations.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerationRequest>>,
    signals: Mutex<Vec<CancellationSignal>>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn signals(&self) -> Vec<CancellationSignal> {
        self.signals.lock().unwrap().clone()
    }

    /// Chunks consumers have pulled from the streams so far.
    pub fn chunks_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_text(
        &self,
        request: &GenerationRequest,
        cancel: CancellationSignal,
    ) -> Result<TextStream, ToolcodeError> {
        self.requests.lock().unwrap().push(request.clone());
        self.signals.lock().unwrap().push(cancel);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Chunks(Vec::new()));

        let (chunks, failure) = match script {
            Script::Fail(message) => return Err(ToolcodeError::generation(message)),
            Script::Chunks(chunks) => (chunks, None),
            Script::ChunksThenError(chunks, message) => (chunks, Some(message)),
        };
        let pulled = Arc::clone(&self.pulled);
        let stream = async_stream::stream! {
            for chunk in chunks {
                pulled.fetch_add(1, Ordering::SeqCst);
                yield Ok(TextStreamDelta::text(chunk));
            }
            if let Some(message) = failure {
                yield Err(ToolcodeError::generation(message));
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Event sink that records everything it receives.
pub fn recording_sink() -> (EventSink, Arc<Mutex<Vec<AgentEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&events);
    let sink: EventSink = Arc::new(move |event| captured.lock().unwrap().push(event));
    (sink, events)
}

/// A complete call block in the default ReAct format.
pub fn call_block(code: &str) -> String {
    let markers = SegmentMarkers::default();
    format!(
        "{}\n{}{}{}",
        markers.call_header, markers.call_open, code, markers.call_close
    )
}

/// A final answer in the default ReAct format.
pub fn response(text: &str) -> String {
    format!("{}\n{text}", SegmentMarkers::default().response_header)
}

/// Registry with `add(a, b)` and a `slow(ms)` capability that sleeps.
pub fn test_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry
        .register_fn("add", |args: CallArguments| async move {
            Ok(Value::Int(args.get_i64("a")? + args.get_i64("b")?))
        })
        .register_fn("slow", |args: CallArguments| async move {
            let ms = args.get_i64("ms")?;
            tokio::time::sleep(std::time::Duration::from_millis(ms as u64)).await;
            Ok(Value::Str("done".into()))
        })
        .register_fn("fail", |_args: CallArguments| async move {
            Err::<Value, _>(ToolcodeError::Runtime("backend unavailable".into()))
        });
    registry
}
