//! Subscriber model.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────────────────┐  epoch elapses   ┌──────────────────────┐
//!   │ ACTIVE (nothing    ├─────────────────▶│ ACTIVE (≥1 epoch     │
//!   │ owed)              │◀─────────────────┤ owed, due)           │
//!   └─────────┬──────────┘  settled         └──────────┬───────────┘
//!             │ pause                       underfunded │ / pause
//!             ▼                                         ▼
//!        ┌──────────────────────────────────────────────────┐
//!        │ INACTIVE (terminal)                              │
//!        └──────────────────────────────────────────────────┘
//! ```
//!
//! The provider set is fixed at registration and never changes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, ProviderId, SubscriberId};

/// Subscription tier. Informational only: it never affects fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    Basic,
    Standard,
    Premium,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "BASIC"),
            Self::Standard => write!(f, "STANDARD"),
            Self::Premium => write!(f, "PREMIUM"),
        }
    }
}

/// A registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Sequential id, never reused.
    pub id: SubscriberId,
    /// The principal that registered (and pays for) this subscription.
    pub owner: AccountId,
    /// Cleared on pause or on an underfunded settlement. Never set again.
    pub active: bool,
    pub plan: Plan,
    /// Prepaid credit.
    pub balance: Amount,
    /// Registration time, or the time of the last successful settlement.
    pub last_settlement: DateTime<Utc>,
    /// Providers chosen at registration.
    pub providers: Vec<ProviderId>,
}

impl Subscriber {
    #[must_use]
    pub fn is_owned_by(&self, caller: &AccountId) -> bool {
        self.owner == *caller
    }

    /// Read-only projection returned by queries.
    #[must_use]
    pub fn view(&self) -> SubscriberView {
        SubscriberView {
            id: self.id,
            owner: self.owner,
            active: self.active,
            plan: self.plan,
            balance: self.balance,
            last_settlement: self.last_settlement,
        }
    }
}

/// Public state of a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberView {
    pub id: SubscriberId,
    pub owner: AccountId,
    pub active: bool,
    pub plan: Plan,
    pub balance: Amount,
    pub last_settlement: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn sample() -> Subscriber {
        Subscriber {
            id: SubscriberId(1),
            owner: AccountId::new(),
            active: true,
            plan: Plan::Premium,
            balance: Decimal::new(150, 0),
            last_settlement: Utc::now(),
            providers: vec![ProviderId(1), ProviderId(3)],
        }
    }

    #[test]
    fn plan_display() {
        assert_eq!(Plan::Basic.to_string(), "BASIC");
        assert_eq!(Plan::Standard.to_string(), "STANDARD");
        assert_eq!(Plan::Premium.to_string(), "PREMIUM");
    }

    #[test]
    fn view_mirrors_state() {
        let s = sample();
        let v = s.view();
        assert_eq!(v.id, s.id);
        assert_eq!(v.owner, s.owner);
        assert_eq!(v.plan, Plan::Premium);
        assert_eq!(v.balance, Decimal::new(150, 0));
        assert!(v.active);
    }

    #[test]
    fn subscriber_serde_roundtrip() {
        let s = sample();
        let json = serde_json::to_string(&s).unwrap();
        let back: Subscriber = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
