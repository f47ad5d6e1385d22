//! Ledger events.
//!
//! Every state-changing command records one [`LedgerEvent`]. The ledger
//! does not deliver them anywhere; the host drains the outbox and forwards
//! them to whatever notification system it runs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, Plan, ProviderId, SubscriberId};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventKind {
    ProviderRegistered {
        provider: ProviderId,
        owner: AccountId,
        fee: Amount,
    },
    /// The provider was deleted after its balance was paid out.
    ProviderRemoved {
        provider: ProviderId,
        flushed: Amount,
    },
    ProviderStatusChanged {
        provider: ProviderId,
        active: bool,
    },
    ProviderFeeChanged {
        provider: ProviderId,
        old_fee: Amount,
        new_fee: Amount,
    },
    SubscriberRegistered {
        subscriber: SubscriberId,
        owner: AccountId,
        plan: Plan,
        deposit: Amount,
    },
    SubscriptionDeposited {
        subscriber: SubscriberId,
        amount: Amount,
    },
    SubscriptionPaused {
        subscriber: SubscriberId,
    },
    SubscriberSettled {
        subscriber: SubscriberId,
        epochs: u64,
        charged: Amount,
    },
    /// Settlement found the balance short of what was owed.
    SubscriberDeactivated {
        subscriber: SubscriberId,
        owed: Amount,
        balance: Amount,
    },
    EarningsWithdrawn {
        provider: ProviderId,
        amount: Amount,
    },
}

impl fmt::Display for LedgerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderRegistered { .. } => write!(f, "PROVIDER_REGISTERED"),
            Self::ProviderRemoved { .. } => write!(f, "PROVIDER_REMOVED"),
            Self::ProviderStatusChanged { .. } => write!(f, "PROVIDER_STATUS_CHANGED"),
            Self::ProviderFeeChanged { .. } => write!(f, "PROVIDER_FEE_CHANGED"),
            Self::SubscriberRegistered { .. } => write!(f, "SUBSCRIBER_REGISTERED"),
            Self::SubscriptionDeposited { .. } => write!(f, "SUBSCRIPTION_DEPOSITED"),
            Self::SubscriptionPaused { .. } => write!(f, "SUBSCRIPTION_PAUSED"),
            Self::SubscriberSettled { .. } => write!(f, "SUBSCRIBER_SETTLED"),
            Self::SubscriberDeactivated { .. } => write!(f, "SUBSCRIBER_DEACTIVATED"),
            Self::EarningsWithdrawn { .. } => write!(f, "EARNINGS_WITHDRAWN"),
        }
    }
}

/// A timestamped event in the ledger outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub kind: LedgerEventKind,
    pub at: DateTime<Utc>,
}

impl LedgerEvent {
    #[must_use]
    pub fn new(kind: LedgerEventKind, at: DateTime<Utc>) -> Self {
        Self { kind, at }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn kind_display() {
        let kind = LedgerEventKind::SubscriptionPaused {
            subscriber: SubscriberId(1),
        };
        assert_eq!(kind.to_string(), "SUBSCRIPTION_PAUSED");
        let kind = LedgerEventKind::EarningsWithdrawn {
            provider: ProviderId(2),
            amount: Decimal::ONE,
        };
        assert_eq!(kind.to_string(), "EARNINGS_WITHDRAWN");
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = LedgerEvent::new(
            LedgerEventKind::SubscriberDeactivated {
                subscriber: SubscriberId(7),
                owed: Decimal::new(100, 0),
                balance: Decimal::new(50, 0),
            },
            Utc::now(),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
