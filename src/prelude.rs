//! Convenience re-exports for common use.

pub use crate::agent_loop::{
    AgentEvent, CancellationSignal, CycleBudget, ConversationReader, EventSink, TurnProcessor,
};
pub use crate::capability::{CallArguments, Capability, CapabilityRegistry, FnCapability, Value};
pub use crate::config::{AgentConfig, ProviderKind, SegmentMarkers, TransportConfig};
pub use crate::detector::{CallSpan, SegmentDetector};
pub use crate::error::{Result, ToolcodeError};
pub use crate::sandbox::{ExecutionOutcome, PrintRecord, Sandbox};
pub use crate::transport::{ChatTransport, GenerationRequest, TextStream};
pub use crate::types::{
    Attachment, AttachmentKind, FinishReason, GenerationSettings, Role, TextStreamDelta, Turn,
};
