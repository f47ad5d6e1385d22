//! The ledger: every command and query, wired over the registries, the
//! settlement engine, the transfer rail and the clock.
//!
//! ## Command shape
//!
//! ```text
//! validate (no writes) → external transfer → write state → record event
//! ```
//!
//! Payouts invert the last two steps: the provider balance is zeroed
//! *before* the push, and restored if the push fails.
//!
//! A `Ledger` assumes one writer at a time. Use
//! [`SharedLedger`](crate::SharedLedger) on a multi-threaded host.

use tally_registry::{InMemoryRail, ProviderRegistry, SubscriberRegistry, TransferRail};
use tally_types::{
    AccountId, Amount, Clock, LedgerConfig, LedgerEvent, LedgerEventKind, Plan, ProviderId,
    ProviderView, RegistrationKey, Result, SubscriberId, SubscriberView, SystemClock, TallyError,
    constants,
};

use crate::engine::{SettlementEngine, SettlementOutcome};
use crate::supply_conservation::SupplyConservation;
use crate::sweep::{self, DueList, SweepReport};

/// Prepaid subscription ledger.
pub struct Ledger<R = InMemoryRail, C = SystemClock> {
    config: LedgerConfig,
    /// The system owner: the only caller allowed to toggle providers.
    admin: AccountId,
    providers: ProviderRegistry,
    subscribers: SubscriberRegistry,
    engine: SettlementEngine,
    supply: SupplyConservation,
    rail: R,
    clock: C,
    /// Outbox of events not yet collected by the host.
    events: Vec<LedgerEvent>,
}

impl<R: TransferRail, C: Clock> Ledger<R, C> {
    /// Create an empty ledger.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` does not validate.
    pub fn new(config: LedgerConfig, admin: AccountId, rail: R, clock: C) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            admin = %admin,
            epoch_secs = config.epoch_length.as_secs(),
            max_providers = config.max_providers,
            "ledger created"
        );
        Ok(Self {
            providers: ProviderRegistry::new(config.max_providers),
            subscribers: SubscriberRegistry::new(config.min_deposit_epochs),
            engine: SettlementEngine::new(config.epoch_length),
            supply: SupplyConservation::new(),
            config,
            admin,
            rail,
            clock,
            events: Vec::new(),
        })
    }

    // =================================================================
    // Provider commands
    // =================================================================

    /// Register a provider owned by `caller`.
    pub fn register_provider(
        &mut self,
        caller: AccountId,
        key: RegistrationKey,
        fee: Amount,
    ) -> Result<ProviderId> {
        let id = self.providers.register(caller, key, fee)?;
        self.emit(LedgerEventKind::ProviderRegistered {
            provider: id,
            owner: caller,
            fee,
        });
        Ok(id)
    }

    /// Pay out a provider's balance to its owner, then delete it.
    ///
    /// Subscribers that still list the provider simply stop paying for it.
    /// Returns the amount flushed.
    pub fn remove_provider(&mut self, id: ProviderId, caller: AccountId) -> Result<Amount> {
        let flushed = self.providers.take_earnings(id, &caller)?;
        self.pay_out(id, caller, flushed)?;
        self.providers.remove(id)?;
        self.emit(LedgerEventKind::ProviderRemoved {
            provider: id,
            flushed,
        });
        Ok(flushed)
    }

    /// Toggle providers on or off. System owner only.
    ///
    /// Forward-only: balances and already accrued earnings are untouched;
    /// the flags only gate new registrations and future settlements.
    pub fn set_providers_active(
        &mut self,
        caller: AccountId,
        ids: &[ProviderId],
        flags: &[bool],
    ) -> Result<()> {
        if caller != self.admin {
            return Err(TallyError::NotSystemOwner { caller });
        }
        for (provider, active) in self.providers.set_active(ids, flags)? {
            self.emit(LedgerEventKind::ProviderStatusChanged { provider, active });
        }
        Ok(())
    }

    /// Change a provider's fee. Owner only. Applies from the next settlement.
    pub fn set_provider_fee(&mut self, id: ProviderId, caller: AccountId, fee: Amount) -> Result<()> {
        let old_fee = self.providers.set_fee(id, &caller, fee)?;
        self.emit(LedgerEventKind::ProviderFeeChanged {
            provider: id,
            old_fee,
            new_fee: fee,
        });
        Ok(())
    }

    /// Withdraw all accrued earnings to the provider owner. Returns the
    /// amount paid; zero means nothing was pushed and no event is recorded.
    pub fn withdraw_provider_earnings(&mut self, id: ProviderId, caller: AccountId) -> Result<Amount> {
        let amount = self.providers.take_earnings(id, &caller)?;
        if amount.is_zero() {
            return Ok(amount);
        }
        self.pay_out(id, caller, amount)?;
        tracing::info!(provider = %id, amount = %amount, "earnings withdrawn");
        self.emit(LedgerEventKind::EarningsWithdrawn {
            provider: id,
            amount,
        });
        Ok(amount)
    }

    // =================================================================
    // Subscriber commands
    // =================================================================

    /// Register a subscriber paid by `caller`.
    ///
    /// The deposit must cover the configured number of epochs of the chosen
    /// providers' fees. One epoch is pre-charged into each provider
    /// immediately; the rest becomes the subscriber's balance.
    pub fn register_subscriber(
        &mut self,
        caller: AccountId,
        deposit: Amount,
        plan: Plan,
        provider_ids: &[ProviderId],
    ) -> Result<SubscriberId> {
        let admission = self
            .subscribers
            .admit(&self.providers, caller, deposit, plan, provider_ids)?;
        self.supply.check_deposit(deposit)?;
        self.rail.pull(&caller, deposit)?;
        self.supply.record_deposit(deposit)?;
        let now = self.clock.now();
        let id = self.subscribers.register(&mut self.providers, admission, now)?;
        self.emit(LedgerEventKind::SubscriberRegistered {
            subscriber: id,
            owner: caller,
            plan,
            deposit,
        });
        Ok(id)
    }

    /// Top up a subscriber's balance from `caller`. Returns the new balance.
    ///
    /// Does not reactivate an inactive subscriber.
    pub fn deposit_for_subscription(
        &mut self,
        id: SubscriberId,
        caller: AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        self.subscribers.check_deposit(id, amount)?;
        self.supply.check_deposit(amount)?;
        self.rail.pull(&caller, amount)?;
        self.supply.record_deposit(amount)?;
        let balance = self.subscribers.deposit(id, amount)?;
        tracing::info!(subscriber = %id, amount = %amount, balance = %balance, "deposit received");
        self.emit(LedgerEventKind::SubscriptionDeposited {
            subscriber: id,
            amount,
        });
        Ok(balance)
    }

    /// Pause a subscription. Owner only; repeat calls are no-ops.
    pub fn pause_subscription(&mut self, id: SubscriberId, caller: AccountId) -> Result<()> {
        if self.subscribers.pause(&mut self.providers, id, &caller)? {
            self.emit(LedgerEventKind::SubscriptionPaused { subscriber: id });
        }
        Ok(())
    }

    // =================================================================
    // Sweep
    // =================================================================

    /// Read-only: every subscriber due for settlement right now.
    #[must_use]
    pub fn check_due(&self) -> DueList {
        sweep::scan_due(&self.engine, &self.subscribers, self.clock.now())
    }

    /// Read-only: whether any subscriber is due.
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.check_due().any_due()
    }

    /// Settle each listed subscriber once. Stale, repeated or unknown ids
    /// are no-ops.
    pub fn run_settlement(&mut self, ids: &[SubscriberId]) -> SweepReport {
        let now = self.clock.now();
        let report = sweep::dispatch(
            &self.engine,
            &mut self.providers,
            &mut self.subscribers,
            ids,
            now,
        );
        for (id, outcome) in &report.outcomes {
            let kind = match outcome {
                SettlementOutcome::Settled { epochs, charged } => LedgerEventKind::SubscriberSettled {
                    subscriber: *id,
                    epochs: *epochs,
                    charged: *charged,
                },
                SettlementOutcome::Deactivated { owed, balance } => {
                    LedgerEventKind::SubscriberDeactivated {
                        subscriber: *id,
                        owed: *owed,
                        balance: *balance,
                    }
                }
                _ => continue,
            };
            self.events.push(LedgerEvent::new(kind, now));
        }
        report
    }

    /// Scan and settle in one call.
    pub fn sweep(&mut self) -> SweepReport {
        let due = self.check_due();
        self.run_settlement(&due.ids)
    }

    // =================================================================
    // Queries
    // =================================================================

    pub fn provider_state(&self, id: ProviderId) -> Result<ProviderView> {
        Ok(self.providers.get(id)?.view())
    }

    pub fn provider_earnings(&self, id: ProviderId) -> Result<Amount> {
        Ok(self.providers.get(id)?.balance)
    }

    /// Subscribers currently attached to a provider, in id order.
    pub fn provider_subscribers(&self, id: ProviderId) -> Result<Vec<SubscriberId>> {
        Ok(self.providers.get(id)?.subscribers.iter().copied().collect())
    }

    pub fn subscriber_state(&self, id: SubscriberId) -> Result<SubscriberView> {
        Ok(self.subscribers.get(id)?.view())
    }

    pub fn subscriber_balance(&self, id: SubscriberId) -> Result<Amount> {
        Ok(self.subscribers.get(id)?.balance)
    }

    /// Check `Σ subscriber.balance + Σ provider.balance == pulled − pushed`.
    pub fn verify_conservation(&self) -> Result<()> {
        let actual = self
            .subscribers
            .total_balance()?
            .checked_add(self.providers.total_balance()?)
            .ok_or(TallyError::ArithmeticOverflow)?;
        self.supply.verify(actual)
    }

    /// Total pulled from payers since genesis.
    #[must_use]
    pub fn total_deposited(&self) -> Amount {
        self.supply.total_deposits()
    }

    /// Total pushed to provider owners since genesis.
    #[must_use]
    pub fn total_withdrawn(&self) -> Amount {
        self.supply.total_withdrawals()
    }

    // =================================================================
    // Host plumbing
    // =================================================================

    /// Take all events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    #[must_use]
    pub fn admin(&self) -> AccountId {
        self.admin
    }

    #[must_use]
    pub fn rail(&self) -> &R {
        &self.rail
    }

    pub fn rail_mut(&mut self) -> &mut R {
        &mut self.rail
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn emit(&mut self, kind: LedgerEventKind) {
        let at = self.clock.now();
        self.events.push(LedgerEvent::new(kind, at));
    }

    /// Push `amount` (already taken from the provider) to `to`. On failure
    /// the amount goes back onto the provider's balance.
    fn pay_out(&mut self, id: ProviderId, to: AccountId, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        if let Err(err) = self.rail.push(&to, amount) {
            tracing::warn!(provider = %id, amount = %amount, error = %err, "payout failed; restoring balance");
            self.providers.restore_earnings(id, amount)?;
            return Err(err);
        }
        self.supply.record_withdrawal(amount)
    }
}
