use std::time::Duration;

/// Blocking suspension point used for retry backoff and request throttling.
pub trait Pause: Send + Sync {
    fn pause(&self, duration: Duration);
}

/// Sleeps the current worker thread.
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Returns immediately. For tests and dry runs.
pub struct NoPause;

impl Pause for NoPause {
    fn pause(&self, _duration: Duration) {}
}
