//! Provider model.
//!
//! A provider sells a metered service for a fixed periodic fee. Its
//! `balance` holds earnings that have been credited by settlement but not
//! yet withdrawn.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, ProviderId, RegistrationKey, SubscriberId};

/// A registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Sequential id, never reused.
    pub id: ProviderId,
    /// The principal that registered this provider.
    pub owner: AccountId,
    /// Inactive providers accept no new subscribers and accrue nothing.
    pub active: bool,
    /// The key consumed to admit this provider.
    pub registration_key: RegistrationKey,
    /// Periodic fee charged per subscriber per epoch. Always > 0.
    pub fee: Amount,
    /// Accrued, not yet withdrawn earnings.
    pub balance: Amount,
    /// Subscribers currently attached to this provider.
    pub subscribers: BTreeSet<SubscriberId>,
}

impl Provider {
    /// A freshly admitted provider: active, zero balance, no subscribers.
    #[must_use]
    pub fn new(
        id: ProviderId,
        owner: AccountId,
        registration_key: RegistrationKey,
        fee: Amount,
    ) -> Self {
        Self {
            id,
            owner,
            active: true,
            registration_key,
            fee,
            balance: Amount::ZERO,
            subscribers: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn is_owned_by(&self, caller: &AccountId) -> bool {
        self.owner == *caller
    }

    /// Read-only projection returned by queries.
    #[must_use]
    pub fn view(&self) -> ProviderView {
        ProviderView {
            id: self.id,
            owner: self.owner,
            active: self.active,
            fee: self.fee,
            balance: self.balance,
            subscriber_count: self.subscribers.len(),
        }
    }
}

/// Public state of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderView {
    pub id: ProviderId,
    pub owner: AccountId,
    pub active: bool,
    pub fee: Amount,
    pub balance: Amount,
    pub subscriber_count: usize,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn new_provider_is_active_and_empty() {
        let owner = AccountId::new();
        let p = Provider::new(
            ProviderId(1),
            owner,
            RegistrationKey::derive("k"),
            Decimal::new(100, 0),
        );
        assert!(p.active);
        assert!(p.balance.is_zero());
        assert!(p.subscribers.is_empty());
        assert!(p.is_owned_by(&owner));
        assert!(!p.is_owned_by(&AccountId::new()));
    }

    #[test]
    fn view_counts_subscribers() {
        let mut p = Provider::new(
            ProviderId(2),
            AccountId::new(),
            RegistrationKey::derive("k2"),
            Decimal::new(5, 0),
        );
        p.subscribers.insert(SubscriberId(1));
        p.subscribers.insert(SubscriberId(4));
        let view = p.view();
        assert_eq!(view.subscriber_count, 2);
        assert_eq!(view.fee, Decimal::new(5, 0));
        assert_eq!(view.id, ProviderId(2));
    }

    #[test]
    fn provider_serde_roundtrip() {
        let mut p = Provider::new(
            ProviderId(3),
            AccountId::new(),
            RegistrationKey::derive("k3"),
            Decimal::new(1250, 2),
        );
        p.subscribers.insert(SubscriberId(9));
        let json = serde_json::to_string(&p).unwrap();
        let back: Provider = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
