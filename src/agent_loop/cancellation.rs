//! One-shot cancellation flag shared between the loop and a transport.

use tokio_util::sync::CancellationToken;

/// Flips from "running" to "cancelled" once and never resets.
///
/// Clones observe the same flag. The agent loop owns the writer side for
/// one generation request; transports only read it.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
