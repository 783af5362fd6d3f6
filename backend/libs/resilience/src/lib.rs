/// Resilience patterns for the product-update pipeline
///
/// This library provides a bounded retry executor used on both sides of the
/// pipeline:
/// - **Retry**: Exponential backoff (`base_delay * 2^(n-1)`) with a hard cap on attempts
/// - **Attempt classification**: Each attempt reports success, a retryable failure or a fatal one
/// - **Cancellation**: Every attempt and every backoff wait is raced against a `CancellationToken`
///
/// # Example: Retrying a flaky call
///
/// ```rust,no_run
/// use resilience::{Attempt, RetryPolicy};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let policy = RetryPolicy::new(3, Duration::from_millis(1000));
///     let cancel = CancellationToken::new();
///
///     let result = policy
///         .execute(&cancel, |_attempt| async {
///             // Your fallible call here
///             Attempt::<_, String>::Success(())
///         })
///         .await;
/// }
/// ```

pub mod retry;

// Re-export main types for convenience
pub use retry::{Attempt, RetryError, RetryPolicy};
