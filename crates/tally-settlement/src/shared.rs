//! Thread-safe handle around a [`Ledger`].
//!
//! Every command runs under one mutex, so commands are serialized exactly as
//! on a single-writer host. A keeper thread calls
//! [`keeper_tick`](SharedLedger::keeper_tick), which scans and dispatches in
//! two separate critical sections; anything that changes in between is
//! absorbed by the engine's re-checks.

use std::sync::{Arc, Mutex, MutexGuard};

use tally_registry::{InMemoryRail, TransferRail};
use tally_types::{Clock, Result, SystemClock, TallyError};

use crate::ledger::Ledger;
use crate::sweep::SweepReport;

/// Cloneable, lock-protected ledger handle.
pub struct SharedLedger<R = InMemoryRail, C = SystemClock> {
    inner: Arc<Mutex<Ledger<R, C>>>,
}

impl<R, C> Clone for SharedLedger<R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: TransferRail, C: Clock> SharedLedger<R, C> {
    #[must_use]
    pub fn new(ledger: Ledger<R, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Run a command with exclusive access.
    ///
    /// # Errors
    /// Returns `Internal` if a previous holder panicked, otherwise whatever
    /// `f` returns.
    pub fn with<T>(&self, f: impl FnOnce(&mut Ledger<R, C>) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        f(&mut guard)
    }

    /// Run a query.
    pub fn read<T>(&self, f: impl FnOnce(&Ledger<R, C>) -> T) -> Result<T> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// One keeper round: scan, and settle if anything is due.
    ///
    /// Returns `None` when nothing was due.
    pub fn keeper_tick(&self) -> Result<Option<SweepReport>> {
        let due = self.read(|ledger| ledger.check_due())?;
        if !due.any_due() {
            return Ok(None);
        }
        tracing::debug!(due = due.len(), "keeper dispatching");
        let report = self.with(|ledger| Ok(ledger.run_settlement(&due.ids)))?;
        Ok(Some(report))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger<R, C>>> {
        self.inner
            .lock()
            .map_err(|_| TallyError::Internal("ledger lock poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use tally_types::{AccountId, LedgerConfig, ManualClock, Plan, RegistrationKey};

    use super::*;

    const EPOCH: Duration = Duration::from_secs(60);

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn shared() -> (SharedLedger<InMemoryRail, ManualClock>, ManualClock) {
        let clock = ManualClock::starting_at(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(1));
        let config = LedgerConfig::default().with_epoch_length(EPOCH);
        let ledger =
            Ledger::new(config, AccountId::new(), InMemoryRail::new(), clock.clone()).unwrap();
        (SharedLedger::new(ledger), clock)
    }

    #[test]
    fn keeper_tick_settles_only_when_due() {
        let (ledger, clock) = shared();
        let alice = AccountId::new();
        let s = ledger
            .with(|l| {
                let p = l.register_provider(AccountId::new(), RegistrationKey::random(), dec(5))?;
                l.rail_mut().fund(alice, dec(100));
                l.register_subscriber(alice, dec(100), Plan::Basic, &[p])
            })
            .unwrap();

        assert!(ledger.keeper_tick().unwrap().is_none());
        clock.advance(EPOCH * 2);
        let report = ledger.keeper_tick().unwrap().unwrap();
        assert_eq!(report.settled(), 1);
        assert_eq!(report.total_charged(), dec(10));
        assert!(ledger.keeper_tick().unwrap().is_none());
        assert_eq!(ledger.read(|l| l.subscriber_balance(s)).unwrap().unwrap(), dec(85));
    }

    #[test]
    fn concurrent_commands_and_keeper_conserve_supply() {
        let (ledger, clock) = shared();
        let vendor = AccountId::new();
        let p = ledger
            .with(|l| l.register_provider(vendor, RegistrationKey::random(), dec(1)))
            .unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let ledger = ledger.clone();
                scope.spawn(move || {
                    let payer = AccountId::new();
                    for _ in 0..10 {
                        ledger
                            .with(|l| {
                                l.rail_mut().fund(payer, dec(10));
                                l.register_subscriber(payer, dec(10), Plan::Standard, &[p])
                            })
                            .unwrap();
                    }
                });
            }
            let keeper = ledger.clone();
            let clock = clock.clone();
            scope.spawn(move || {
                for _ in 0..10 {
                    clock.advance(EPOCH);
                    keeper.keeper_tick().unwrap();
                }
            });
        });

        ledger.with(|l| l.verify_conservation()).unwrap();
        let subscribers = ledger.read(|l| l.provider_subscribers(p)).unwrap().unwrap();
        assert_eq!(subscribers.len(), 40);
        assert_eq!(ledger.read(|l| l.total_deposited()).unwrap(), dec(400));
    }
}
