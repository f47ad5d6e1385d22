//! Subscriber Registry — admission, deposits, pause.
//!
//! Registration is split in two so the deposit can be pulled in between:
//!
//! ```text
//! admit() ──▶ rail.pull(deposit) ──▶ register()
//! (read-only)                        (mutates providers + subscribers)
//! ```
//!
//! If `admit` or the pull fails, nothing has been written.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_types::{
    AccountId, Amount, Plan, ProviderId, Result, Subscriber, SubscriberId, TallyError,
};

use crate::provider_registry::ProviderRegistry;
use crate::store::SubscriberStore;

/// A validated registration request, ready to commit once the deposit has
/// been collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub owner: AccountId,
    pub plan: Plan,
    pub deposit: Amount,
    /// One epoch's fee per chosen provider, in the order given.
    pub first_epoch_fees: Vec<(ProviderId, Amount)>,
    /// Sum of `first_epoch_fees`.
    pub total_first_epoch: Amount,
}

impl Admission {
    /// Balance the subscriber starts with after the first epoch is pre-charged.
    #[must_use]
    pub fn opening_balance(&self) -> Amount {
        self.deposit - self.total_first_epoch
    }
}

/// Owns all subscribers.
#[derive(Debug)]
pub struct SubscriberRegistry {
    store: SubscriberStore,
    /// Registration floor multiplier on the first-epoch fee total.
    min_deposit_epochs: u32,
}

impl SubscriberRegistry {
    #[must_use]
    pub fn new(min_deposit_epochs: u32) -> Self {
        Self {
            store: SubscriberStore::new(),
            min_deposit_epochs,
        }
    }

    /// Validate a registration request without mutating anything.
    ///
    /// # Errors
    /// - `EmptyProviderSet` if `provider_ids` is empty
    /// - `DuplicateProviderInSet` if an id is listed twice
    /// - `ProviderNotFound` / `ProviderInactive` for unusable providers
    /// - `InsufficientDeposit` if `deposit` is below the floor
    /// - `ArithmeticOverflow` if pre-charging a provider would overflow its
    ///   balance
    pub fn admit(
        &self,
        providers: &ProviderRegistry,
        owner: AccountId,
        deposit: Amount,
        plan: Plan,
        provider_ids: &[ProviderId],
    ) -> Result<Admission> {
        if provider_ids.is_empty() {
            return Err(TallyError::EmptyProviderSet);
        }

        let mut seen = HashSet::with_capacity(provider_ids.len());
        let mut first_epoch_fees = Vec::with_capacity(provider_ids.len());
        let mut total_first_epoch = Amount::ZERO;
        for &id in provider_ids {
            if !seen.insert(id) {
                return Err(TallyError::DuplicateProviderInSet(id));
            }
            let provider = providers.get(id)?;
            if !provider.active {
                return Err(TallyError::ProviderInactive(id));
            }
            provider
                .balance
                .checked_add(provider.fee)
                .ok_or(TallyError::ArithmeticOverflow)?;
            total_first_epoch = total_first_epoch
                .checked_add(provider.fee)
                .ok_or(TallyError::ArithmeticOverflow)?;
            first_epoch_fees.push((id, provider.fee));
        }

        let required = total_first_epoch
            .checked_mul(Decimal::from(self.min_deposit_epochs))
            .ok_or(TallyError::ArithmeticOverflow)?;
        if deposit < required {
            return Err(TallyError::InsufficientDeposit {
                required,
                provided: deposit,
            });
        }

        Ok(Admission {
            owner,
            plan,
            deposit,
            first_epoch_fees,
            total_first_epoch,
        })
    }

    /// Commit an admission: attach the subscriber to every chosen provider,
    /// pre-charge the first epoch into each provider's balance, and create
    /// the subscriber.
    ///
    /// The chosen providers are re-checked first, so an admission that went
    /// stale fails without writing anything.
    pub fn register(
        &mut self,
        providers: &mut ProviderRegistry,
        admission: Admission,
        now: DateTime<Utc>,
    ) -> Result<SubscriberId> {
        for &(pid, _) in &admission.first_epoch_fees {
            if !providers.get(pid)?.active {
                return Err(TallyError::ProviderInactive(pid));
            }
        }

        let id = self.store.next_id();
        for &(pid, fee) in &admission.first_epoch_fees {
            providers.attach(pid, id)?;
            providers.credit(pid, fee)?;
        }

        let subscriber = Subscriber {
            id,
            owner: admission.owner,
            active: true,
            plan: admission.plan,
            balance: admission.opening_balance(),
            last_settlement: now,
            providers: admission.first_epoch_fees.iter().map(|(pid, _)| *pid).collect(),
        };
        self.store.append(subscriber);
        tracing::info!(
            subscriber = %id,
            owner = %admission.owner,
            plan = %admission.plan,
            deposit = %admission.deposit,
            first_epoch = %admission.total_first_epoch,
            "subscriber registered"
        );
        Ok(id)
    }

    /// Look up a subscriber.
    pub fn get(&self, id: SubscriberId) -> Result<&Subscriber> {
        self.store.get(id).ok_or(TallyError::SubscriberNotFound(id))
    }

    /// Check a top-up without applying it.
    pub fn check_deposit(&self, id: SubscriberId, amount: Amount) -> Result<()> {
        if amount <= Amount::ZERO {
            return Err(TallyError::InvalidAmount(amount));
        }
        self.get(id)?
            .balance
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Add prepaid credit. Returns the new balance.
    ///
    /// Paused or deactivated subscribers can be topped up but stay inactive.
    pub fn deposit(&mut self, id: SubscriberId, amount: Amount) -> Result<Amount> {
        self.check_deposit(id, amount)?;
        let subscriber = self.live_mut(id)?;
        subscriber.balance = subscriber
            .balance
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        Ok(subscriber.balance)
    }

    /// Owner-initiated pause. Clears `active` and detaches the subscriber
    /// from every one of its providers.
    ///
    /// Idempotent: calling it on an inactive subscriber is allowed, and a
    /// second call changes nothing. Returns whether anything changed.
    pub fn pause(
        &mut self,
        providers: &mut ProviderRegistry,
        id: SubscriberId,
        caller: &AccountId,
    ) -> Result<bool> {
        let subscriber = self.live_mut(id)?;
        if !subscriber.is_owned_by(caller) {
            return Err(TallyError::NotOwner { caller: *caller });
        }

        let was_active = std::mem::replace(&mut subscriber.active, false);
        let mut detached = 0usize;
        for &pid in &subscriber.providers {
            if providers.detach(pid, id) {
                detached += 1;
            }
        }
        tracing::info!(subscriber = %id, was_active, detached, "subscription paused");
        Ok(was_active || detached > 0)
    }

    /// Settlement hook: clear `active` without touching the balance.
    pub fn deactivate(&mut self, id: SubscriberId) -> Result<()> {
        self.live_mut(id)?.active = false;
        Ok(())
    }

    /// Settlement hook: debit `total` and stamp the settlement time.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if the balance cannot cover `total`; the
    /// settlement engine checks this before calling.
    pub fn charge(&mut self, id: SubscriberId, total: Amount, now: DateTime<Utc>) -> Result<()> {
        let subscriber = self.live_mut(id)?;
        if subscriber.balance < total {
            return Err(TallyError::InsufficientFunds {
                needed: total,
                available: subscriber.balance,
            });
        }
        subscriber.balance -= total;
        subscriber.last_settlement = now;
        Ok(())
    }

    /// Sum of all subscriber balances.
    pub fn total_balance(&self) -> Result<Amount> {
        self.store.iter().try_fold(Amount::ZERO, |acc, s| {
            acc.checked_add(s.balance).ok_or(TallyError::ArithmeticOverflow)
        })
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &SubscriberStore {
        &self.store
    }

    fn live_mut(&mut self, id: SubscriberId) -> Result<&mut Subscriber> {
        self.store
            .get_mut(id)
            .ok_or(TallyError::SubscriberNotFound(id))
    }
}
