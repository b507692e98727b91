//! The agent loop: budgets, cancellation, events, conversation state, and
//! the turn processor that ties them to a transport and the sandbox.

pub mod budget;
pub mod cancellation;
pub mod conversation;
pub mod events;
pub mod feedback;
pub mod processor;

pub use budget::CycleBudget;
pub use cancellation::CancellationSignal;
pub use conversation::{Conversation, ConversationReader};
pub use events::{AgentEvent, EventSink};
pub use processor::TurnProcessor;
