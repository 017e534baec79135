//! Small async test helpers.

use std::future::Future;
use std::time::Duration;

/// Poll a condition every few milliseconds until it holds or the timeout
/// elapses. Returns whether the condition was ever observed true.
pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
