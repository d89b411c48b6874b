// Panic isolation for worker safety
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Poll a future with panic isolation
///
/// A panic inside the future is caught and returned as
/// `PanicGuardResult::Panicked`, so the calling worker loop keeps running.
///
/// # Example
/// ```text
/// let result = execute_guarded(async { listener.on_completed(&event).await }).await;
///
/// if let PanicGuardResult::Panicked(msg) = result {
///     println!("Caught panic: {}", msg);
/// }
/// ```
pub async fn execute_guarded<F, T>(future: F) -> PanicGuardResult<T>
where
    F: std::future::Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => PanicGuardResult::Success(result),
        Err(payload) => {
            let panic_msg = panic_message(payload.as_ref());
            error!(panic_msg = %panic_msg, "Guarded task panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        match execute_guarded(async { 42 }).await {
            PanicGuardResult::Success(v) => assert_eq!(v, 42),
            PanicGuardResult::Panicked(msg) => panic!("unexpected panic: {}", msg),
        }
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let result = execute_guarded(async {
            if true {
                panic!("listener exploded");
            }
        })
        .await;

        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "listener exploded"),
            PanicGuardResult::Success(_) => panic!("panic should have been caught"),
        }
    }
}
