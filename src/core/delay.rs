use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::core::continuation::Next;
use crate::core::handler_registry::Handler;
use crate::core::payload::Payload;

/// Payload key holding the delay in milliseconds.
pub const DURATION_KEY: &str = "duration";

/// Payload for a delay step
pub fn delay_payload(duration: Duration) -> Payload {
    let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    Payload::new().with(DURATION_KEY, ms)
}

/// Read a millisecond duration from a payload field
///
/// Integers and non-negative floats are accepted; anything else is `None`.
/// Floats too large for a [`Duration`] saturate to [`Duration::MAX`].
pub fn duration_from(payload: &Payload) -> Option<Duration> {
    match payload.get(DURATION_KEY)? {
        Value::Number(n) => {
            if let Some(ms) = n.as_u64() {
                Some(Duration::from_millis(ms))
            } else {
                n.as_f64()
                    .filter(|ms| ms.is_finite() && *ms >= 0.0)
                    .map(|ms| Duration::try_from_secs_f64(ms / 1_000.0).unwrap_or(Duration::MAX))
            }
        }
        _ => None,
    }
}

/// The handler the engine registers under its reserved delay event
///
/// Holds the continuation until the duration has elapsed, then resumes with
/// the `prev` it was dispatched with, so the delay is invisible to the
/// carried-forward chain. A missing or malformed duration waits zero time.
pub(crate) fn delay_handler() -> Handler {
    Arc::new(|payload: Payload, next: Next| {
        let duration = duration_from(&payload).unwrap_or_default();
        let prev = payload.prev();
        tracing::trace!(index = next.index(), ?duration, "delay step suspended");
        schedule(duration, move || next.resume(prev));
    })
}

/// Run `f` once `duration` has elapsed
///
/// Uses the ambient tokio runtime when there is one, otherwise a timer thread.
pub(crate) fn schedule<F>(duration: Duration, f: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                tokio::time::sleep(duration).await;
                f();
            });
        }
        Err(_) => {
            std::thread::spawn(move || {
                std::thread::sleep(duration);
                f();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_accept_integers_and_floats() {
        let ms = Payload::new().with(DURATION_KEY, 50);
        let fractional = Payload::new().with(DURATION_KEY, 250.0);
        let negative = Payload::new().with(DURATION_KEY, -3.0);

        assert_eq!(duration_from(&ms), Some(Duration::from_millis(50)));
        assert_eq!(duration_from(&fractional), Some(Duration::from_millis(250)));
        assert_eq!(duration_from(&negative), None);
        assert_eq!(duration_from(&Payload::new()), None);
    }

    #[test]
    fn oversized_durations_saturate() {
        let huge = Payload::new().with(DURATION_KEY, 1e300);
        let text = Payload::new().with(DURATION_KEY, "1e300");

        assert_eq!(duration_from(&huge), Some(Duration::MAX));
        assert_eq!(duration_from(&text), None);
        assert_eq!(duration_from(&Payload::new().with(DURATION_KEY, f64::NAN)), None);
        assert_eq!(
            delay_payload(Duration::MAX).get_u64(DURATION_KEY),
            Some(u64::MAX)
        );
    }
}
