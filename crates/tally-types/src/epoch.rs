//! Epoch arithmetic and time sources.
//!
//! A subscriber owes one fee per provider for every *whole* epoch that has
//! elapsed since its last settlement. Partial epochs are never charged.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Number of whole epochs between `last` and `now`.
///
/// Returns 0 when `now` is not after `last`, or when `epoch_length` is zero.
#[must_use]
pub fn unsettled_epochs(last: DateTime<Utc>, now: DateTime<Utc>, epoch_length: Duration) -> u64 {
    let epoch_ms = epoch_length.as_millis();
    if epoch_ms == 0 {
        return 0;
    }
    let Ok(elapsed_ms) = u128::try_from((now - last).num_milliseconds()) else {
        return 0;
    };
    u64::try_from(elapsed_ms / epoch_ms).unwrap_or(u64::MAX)
}

/// Source of the current time for the ledger.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same instant, so a host can keep
/// one handle and move time for a ledger that owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    /// Jump to an absolute instant (may move backwards).
    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
