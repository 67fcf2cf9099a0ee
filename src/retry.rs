use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Runs `operation` up to `retries_left` times, `interval` apart.
///
/// Returns the first success, or `None` once every attempt failed. A budget of
/// zero still makes one attempt. No gateway method retries through this; it is
/// meant for callers wrapping their own flows.
pub async fn retry<T, E, F, Fut>(
    name: &str,
    retries_left: usize,
    interval: Duration,
    mut operation: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = retries_left.max(1);

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Some(value),
            Err(e) if attempt == attempts => {
                tracing::warn!("{} maximum retries exceeded: {}", name, e);
            }
            Err(e) => {
                tracing::debug!(
                    "{} catch error: {}, retrying ({} attempts left)",
                    name,
                    e,
                    attempts - attempt
                );
                tokio::time::sleep(interval).await;
            }
        }
    }

    None
}
