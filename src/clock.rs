use chrono::Utc;

/// A source of wall-clock time in milliseconds since the Unix epoch.
///
/// Abstracting time access lets tests substitute a deterministic clock to
/// drive the clock-backwards and sequence-rollover paths. Production code
/// always runs on [`SystemClock`].
pub trait TimeSource: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn current_millis(&self) -> i64;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_tracks_utc() {
        let clock = SystemClock;
        let before = Utc::now().timestamp_millis();
        let now = clock.current_millis();
        let after = Utc::now().timestamp_millis();

        assert!(now >= before);
        assert!(now <= after);
    }
}
