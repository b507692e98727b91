//! Capabilities the model may invoke from tool code.

pub mod arguments;
pub mod registry;
pub mod value;

pub use arguments::CallArguments;
pub use registry::{Capability, CapabilityRegistry, DefaultHandler, FnCapability};
pub use value::Value;
