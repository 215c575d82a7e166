use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Clock access is routed through this trait everywhere in the core so
/// tests can freeze time (spec §9: "Global mutable state... clock access
/// is through a `TimeProvider` interface so tests can freeze time").
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that can be advanced explicitly, for the CIBA slow_down /
/// expiry / code-TTL tests in spec §8.
#[derive(Clone)]
pub struct FrozenTimeProvider {
    millis: Arc<AtomicI64>,
}

impl FrozenTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        self.millis
            .fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
    }
}

impl TimeProvider for FrozenTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_else(Utc::now)
    }
}

pub type SharedTimeProvider = Arc<dyn TimeProvider>;

pub fn system_time_provider() -> SharedTimeProvider {
    Arc::new(SystemTimeProvider)
}
