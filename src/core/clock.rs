use time::OffsetDateTime;

/*
 * Source of wall-clock time for `last played` stamps and thumbnail file names.
 * Abstracted so tests can pin the time.
 */
pub trait ClockOperations: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock {}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {}
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockOperations for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
