//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::ToolcodeError;

/// Wrap a future with a timeout. On expiry the future is dropped and
/// [`ToolcodeError::Timeout`] carries the elapsed budget in milliseconds.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ToolcodeError>>,
) -> Result<T, ToolcodeError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ToolcodeError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_with_duration_in_millis() {
        let err = with_timeout(Duration::from_millis(250), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ToolcodeError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ToolcodeError::Timeout(250)));
    }

    #[tokio::test]
    async fn passes_through_inner_result() {
        let value = with_timeout(Duration::from_secs(1), async { Ok::<_, ToolcodeError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
