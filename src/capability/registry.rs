//! Capability trait, closure-based capabilities and the dispatch table.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::arguments::CallArguments;
use super::value::Value;
use crate::error::ToolcodeError;

/// Core capability trait. Implement it to expose an operation to tool code.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Name the model calls (`capability.<name>(...)`).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Run the capability. Handlers may be invoked concurrently from
    /// different sandbox runs.
    async fn call(&self, args: CallArguments) -> Result<Value, ToolcodeError>;
}

type CapabilityHandler =
    dyn Fn(CallArguments) -> BoxFuture<'static, Result<Value, ToolcodeError>> + Send + Sync;

/// Handler for names that have no registered capability.
pub type DefaultHandler = dyn Fn(String, CallArguments) -> BoxFuture<'static, Result<Value, ToolcodeError>>
    + Send
    + Sync;

/// Closure-based capability for quick registration.
pub struct FnCapability {
    name: String,
    description: String,
    handler: Arc<CapabilityHandler>,
}

impl FnCapability {
    /// Create a capability from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolcodeError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(
                move |args: CallArguments| -> BoxFuture<'static, Result<Value, ToolcodeError>> {
                    Box::pin(handler(args))
                },
            ),
        }
    }
}

#[async_trait]
impl Capability for FnCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, args: CallArguments) -> Result<Value, ToolcodeError> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for FnCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCapability")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Explicit `name -> handler` dispatch table with one fallback handler.
///
/// The registry is read-only while a sandbox run evaluates; share it behind
/// an `Arc` across conversations.
#[derive(Clone)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    default_handler: Arc<DefaultHandler>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    /// Empty registry whose fallback echoes the call back as text.
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
            default_handler: Arc::new(
                |name: String, args: CallArguments| -> BoxFuture<'static, Result<Value, ToolcodeError>> {
                    Box::pin(async move {
                        Ok(Value::Str(format!(
                            "Default handler called for {name} with args {} and kwargs {}",
                            args.positional_repr(),
                            args.named_repr()
                        )))
                    })
                },
            ),
        }
    }

    /// Replace the fallback handler for unregistered names.
    pub fn with_default_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(String, CallArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolcodeError>> + Send + 'static,
    {
        self.default_handler = Arc::new(
            move |name: String, args: CallArguments| -> BoxFuture<'static, Result<Value, ToolcodeError>> {
                Box::pin(handler(name, args))
            },
        );
        self
    }

    /// Register a capability, replacing any previous one with the same name.
    pub fn register(&mut self, capability: impl Capability + 'static) -> &mut Self {
        self.register_arc(Arc::new(capability))
    }

    /// Register an already shared capability.
    pub fn register_arc(&mut self, capability: Arc<dyn Capability>) -> &mut Self {
        self.capabilities
            .insert(capability.name().to_string(), capability);
        self
    }

    /// Register an async closure under `name`.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(CallArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolcodeError>> + Send + 'static,
    {
        self.register(FnCapability::new(name, "", handler))
    }

    /// Remove a capability. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.capabilities.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve `name` and invoke it; unknown names go to the fallback.
    pub async fn dispatch(&self, name: &str, args: CallArguments) -> Result<Value, ToolcodeError> {
        match self.capabilities.get(name) {
            Some(capability) => capability.call(args).await,
            None => {
                tracing::debug!(capability = name, "dispatching to default handler");
                (self.default_handler)(name.to_string(), args).await
            }
        }
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}
