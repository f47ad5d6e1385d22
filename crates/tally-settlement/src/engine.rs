//! Settlement Engine — per-subscriber charge-or-deactivate.
//!
//! For a subscriber owing `n` whole epochs:
//! 1. Skip if unknown, inactive, or `n == 0` (no mutation)
//! 2. Quote `fee × n` for every provider that is live and active;
//!    removed or inactive providers contribute nothing
//! 3. If the balance cannot cover the total, deactivate and stop
//!    (balance and settlement time untouched)
//! 4. Otherwise debit the subscriber, credit each quoted provider, and
//!    reset the settlement time to `now`
//!
//! Every call re-reads the subscriber, so stale or repeated ids are safe.
//! Fees are read at settlement time, which makes fee changes prospective.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_registry::{ProviderRegistry, SubscriberRegistry};
use tally_types::{Amount, ProviderId, Result, Subscriber, SubscriberId, unsettled_epochs};

/// What a settlement attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// No subscriber with this id.
    Unknown,
    /// The subscriber is inactive; nothing to do.
    Inactive,
    /// Less than one whole epoch has elapsed.
    NotDue,
    /// Fees were collected and distributed.
    Settled { epochs: u64, charged: Amount },
    /// The balance could not cover what was owed; the subscriber was
    /// deactivated and nothing was debited.
    Deactivated { owed: Amount, balance: Amount },
}

impl SettlementOutcome {
    /// Whether this attempt changed any state.
    #[must_use]
    pub fn mutated(&self) -> bool {
        matches!(self, Self::Settled { .. } | Self::Deactivated { .. })
    }
}

/// Amounts owed by one subscriber for one settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub epochs: u64,
    /// `(provider, fee × epochs)` for every accruing provider.
    pub lines: Vec<(ProviderId, Amount)>,
    pub total: Amount,
}

/// Stateless settlement rules parameterised by the epoch length.
#[derive(Debug, Clone, Copy)]
pub struct SettlementEngine {
    epoch_length: Duration,
}

impl SettlementEngine {
    #[must_use]
    pub fn new(epoch_length: Duration) -> Self {
        Self { epoch_length }
    }

    #[must_use]
    pub fn epoch_length(&self) -> Duration {
        self.epoch_length
    }

    /// Whole epochs this subscriber has not been charged for.
    #[must_use]
    pub fn unsettled_epochs(&self, subscriber: &Subscriber, now: DateTime<Utc>) -> u64 {
        unsettled_epochs(subscriber.last_settlement, now, self.epoch_length)
    }

    /// Active and owing at least one epoch.
    #[must_use]
    pub fn is_due(&self, subscriber: &Subscriber, now: DateTime<Utc>) -> bool {
        subscriber.active && self.unsettled_epochs(subscriber, now) >= 1
    }

    /// Price `epochs` epochs for a subscriber at current fees.
    ///
    /// Returns `None` if the amounts overflow.
    #[must_use]
    pub fn quote(
        &self,
        providers: &ProviderRegistry,
        subscriber: &Subscriber,
        epochs: u64,
    ) -> Option<Quote> {
        let multiplier = Decimal::from(epochs);
        let mut lines = Vec::with_capacity(subscriber.providers.len());
        let mut total = Amount::ZERO;
        for &pid in &subscriber.providers {
            let Some(fee) = providers.accruing_fee(pid) else {
                continue;
            };
            let owed = fee.checked_mul(multiplier)?;
            // The credit must fit too, so it cannot fail half-way.
            providers.get(pid).ok()?.balance.checked_add(owed)?;
            total = total.checked_add(owed)?;
            lines.push((pid, owed));
        }
        Some(Quote {
            epochs,
            lines,
            total,
        })
    }

    /// Settle one subscriber at `now`.
    ///
    /// # Errors
    /// Only on broken internal invariants; underfunding and stale ids are
    /// outcomes, not errors.
    pub fn settle(
        &self,
        providers: &mut ProviderRegistry,
        subscribers: &mut SubscriberRegistry,
        id: SubscriberId,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome> {
        let Ok(subscriber) = subscribers.get(id) else {
            tracing::debug!(subscriber = %id, "settlement skipped: unknown subscriber");
            return Ok(SettlementOutcome::Unknown);
        };
        if !subscriber.active {
            tracing::debug!(subscriber = %id, "settlement skipped: inactive");
            return Ok(SettlementOutcome::Inactive);
        }
        let epochs = self.unsettled_epochs(subscriber, now);
        if epochs == 0 {
            tracing::debug!(subscriber = %id, "settlement skipped: not due");
            return Ok(SettlementOutcome::NotDue);
        }

        let balance = subscriber.balance;
        let Some(quote) = self.quote(providers, subscriber, epochs) else {
            tracing::warn!(subscriber = %id, epochs, "fee computation overflowed; deactivating");
            subscribers.deactivate(id)?;
            return Ok(SettlementOutcome::Deactivated {
                owed: Amount::MAX,
                balance,
            });
        };

        if balance < quote.total {
            tracing::warn!(
                subscriber = %id,
                owed = %quote.total,
                balance = %balance,
                "underfunded settlement; deactivating"
            );
            subscribers.deactivate(id)?;
            return Ok(SettlementOutcome::Deactivated {
                owed: quote.total,
                balance,
            });
        }

        subscribers.charge(id, quote.total, now)?;
        for &(pid, owed) in &quote.lines {
            providers.credit(pid, owed)?;
        }
        tracing::debug!(subscriber = %id, epochs, charged = %quote.total, "subscriber settled");
        Ok(SettlementOutcome::Settled {
            epochs,
            charged: quote.total,
        })
    }
}
