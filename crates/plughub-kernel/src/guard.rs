//! Isolation of plugin-authored futures.
//!
//! A panic inside one listener, tap, or lifecycle method is converted into an
//! ordinary error so sibling work in the same dispatch keeps running.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

/// Awaits `fut`, turning a panic into an `anyhow::Error`.
pub(crate) async fn guarded<T, F>(fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

/// Runs `f`, turning a panic into an `anyhow::Error`.
pub(crate) fn guarded_sync<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explode() -> anyhow::Result<()> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let result = guarded(async { explode() }).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_sync_passthrough() {
        let ok = guarded_sync(|| Ok(7)).unwrap();
        assert_eq!(ok, 7);
        let err = guarded_sync::<()>(|| panic!("sync {}", "boom")).unwrap_err();
        assert!(err.to_string().contains("sync boom"));
    }
}
