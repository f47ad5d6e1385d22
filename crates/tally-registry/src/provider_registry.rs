//! Provider Registry — admission, activation, fees, earnings.
//!
//! Every mutation validates first and only then touches state, so a
//! failed call leaves the registry exactly as it was.

use std::collections::HashSet;

use tally_types::{
    AccountId, Amount, Provider, ProviderId, RegistrationKey, Result, SubscriberId, TallyError,
};

use crate::store::ProviderStore;

/// Owns all providers and the set of consumed registration keys.
#[derive(Debug)]
pub struct ProviderRegistry {
    store: ProviderStore,
    /// Keys consumed by any provider, live or removed. Never shrinks.
    used_keys: HashSet<RegistrationKey>,
    /// Maximum number of ids that will ever be issued.
    max_providers: u64,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(max_providers: u64) -> Self {
        Self {
            store: ProviderStore::new(),
            used_keys: HashSet::new(),
            max_providers,
        }
    }

    /// Admit a new provider.
    ///
    /// # Errors
    /// - `InvalidFee` if `fee <= 0`
    /// - `CapacityExceeded` if the id budget is spent
    /// - `DuplicateRegistrationKey` if `key` was ever used before
    pub fn register(
        &mut self,
        owner: AccountId,
        key: RegistrationKey,
        fee: Amount,
    ) -> Result<ProviderId> {
        if fee <= Amount::ZERO {
            return Err(TallyError::InvalidFee(fee));
        }
        if self.store.last_issued().0 >= self.max_providers {
            return Err(TallyError::CapacityExceeded {
                max: self.max_providers,
            });
        }
        if self.used_keys.contains(&key) {
            return Err(TallyError::DuplicateRegistrationKey(key));
        }

        self.used_keys.insert(key);
        let id = self
            .store
            .insert(Provider::new(self.store.next_id(), owner, key, fee));
        tracing::info!(provider = %id, owner = %owner, fee = %fee, "provider registered");
        Ok(id)
    }

    /// Look up a live provider.
    pub fn get(&self, id: ProviderId) -> Result<&Provider> {
        self.store.get(id).ok_or(TallyError::ProviderNotFound(id))
    }

    /// Look up a live provider and check that `caller` owns it.
    pub fn authorize(&self, id: ProviderId, caller: &AccountId) -> Result<&Provider> {
        let provider = self.get(id)?;
        if !provider.is_owned_by(caller) {
            return Err(TallyError::NotOwner { caller: *caller });
        }
        Ok(provider)
    }

    /// Whether a registration key has been consumed.
    #[must_use]
    pub fn is_key_used(&self, key: &RegistrationKey) -> bool {
        self.used_keys.contains(key)
    }

    /// Change a provider's fee. Returns the previous fee.
    ///
    /// Fees are read at settlement time, so the new fee applies from the
    /// next settlement on.
    pub fn set_fee(&mut self, id: ProviderId, caller: &AccountId, fee: Amount) -> Result<Amount> {
        if fee <= Amount::ZERO {
            return Err(TallyError::InvalidFee(fee));
        }
        self.authorize(id, caller)?;
        let provider = self.live_mut(id)?;
        let old = std::mem::replace(&mut provider.fee, fee);
        tracing::info!(provider = %id, old_fee = %old, new_fee = %fee, "provider fee changed");
        Ok(old)
    }

    /// Flip activation flags in bulk. Returns the `(id, flag)` pairs that were
    /// applied to live providers.
    ///
    /// All ids are validated before any flag changes. Ids of removed
    /// providers are accepted and skipped.
    ///
    /// # Errors
    /// - `ArityMismatch` if the two lists differ in length
    /// - `InvalidProviderId` if an id was never issued
    pub fn set_active(
        &mut self,
        ids: &[ProviderId],
        flags: &[bool],
    ) -> Result<Vec<(ProviderId, bool)>> {
        if ids.len() != flags.len() {
            return Err(TallyError::ArityMismatch {
                ids: ids.len(),
                flags: flags.len(),
            });
        }
        if let Some(bad) = ids.iter().find(|id| !self.store.was_issued(**id)) {
            return Err(TallyError::InvalidProviderId(*bad));
        }

        let mut applied = Vec::with_capacity(ids.len());
        for (&id, &flag) in ids.iter().zip(flags) {
            if let Some(provider) = self.store.get_mut(id) {
                provider.active = flag;
                applied.push((id, flag));
            }
        }
        tracing::info!(changed = applied.len(), "provider activation updated");
        Ok(applied)
    }

    /// Zero the provider's balance and return what it held.
    ///
    /// This is the first half of a payout: the balance is cleared *before*
    /// any external transfer runs, so a second call observes zero.
    pub fn take_earnings(&mut self, id: ProviderId, caller: &AccountId) -> Result<Amount> {
        self.authorize(id, caller)?;
        let provider = self.live_mut(id)?;
        Ok(std::mem::replace(&mut provider.balance, Amount::ZERO))
    }

    /// Put back earnings taken by [`take_earnings`](Self::take_earnings)
    /// when the payout could not be delivered.
    pub fn restore_earnings(&mut self, id: ProviderId, amount: Amount) -> Result<()> {
        let provider = self.live_mut(id)?;
        provider.balance = provider
            .balance
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Delete a provider. Its id and key stay consumed. The caller must have
    /// flushed the balance first.
    pub fn remove(&mut self, id: ProviderId) -> Result<Provider> {
        let removed = self
            .store
            .tombstone(id)
            .ok_or(TallyError::ProviderNotFound(id))?;
        debug_assert!(removed.balance.is_zero(), "balance must be flushed before removal");
        tracing::info!(provider = %id, "provider removed");
        Ok(removed)
    }

    /// Add settled or pre-charged fees to a provider's earnings.
    pub fn credit(&mut self, id: ProviderId, amount: Amount) -> Result<()> {
        let provider = self.live_mut(id)?;
        provider.balance = provider
            .balance
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Fee to charge this settlement, or `None` if the provider is removed or
    /// inactive and so contributes nothing.
    #[must_use]
    pub fn accruing_fee(&self, id: ProviderId) -> Option<Amount> {
        self.store
            .get(id)
            .filter(|p| p.active)
            .map(|p| p.fee)
    }

    /// Attach a subscriber to a provider's subscriber set.
    pub fn attach(&mut self, id: ProviderId, subscriber: SubscriberId) -> Result<()> {
        self.live_mut(id)?.subscribers.insert(subscriber);
        Ok(())
    }

    /// Detach a subscriber. Returns whether it was attached. Removed
    /// providers are ignored.
    pub fn detach(&mut self, id: ProviderId, subscriber: SubscriberId) -> bool {
        self.store
            .get_mut(id)
            .is_some_and(|p| p.subscribers.remove(&subscriber))
    }

    /// Sum of all live providers' balances.
    pub fn total_balance(&self) -> Result<Amount> {
        self.store.iter().try_fold(Amount::ZERO, |acc, p| {
            acc.checked_add(p.balance).ok_or(TallyError::ArithmeticOverflow)
        })
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &ProviderStore {
        &self.store
    }

    fn live_mut(&mut self, id: ProviderId) -> Result<&mut Provider> {
        self.store
            .get_mut(id)
            .ok_or(TallyError::ProviderNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let a = reg.register(owner, RegistrationKey::random(), dec(100)).unwrap();
        let b = reg.register(owner, RegistrationKey::random(), dec(50)).unwrap();
        assert_eq!(a, ProviderId(1));
        assert_eq!(b, ProviderId(2));

        let p = reg.get(a).unwrap();
        assert!(p.active);
        assert!(p.balance.is_zero());
        assert!(p.subscribers.is_empty());
        assert_eq!(p.owner, owner);
    }

    #[test]
    fn zero_or_negative_fee_rejected() {
        let mut reg = ProviderRegistry::new(10);
        let key = RegistrationKey::random();
        let err = reg.register(AccountId::new(), key, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, TallyError::InvalidFee(_)));
        let err = reg.register(AccountId::new(), key, dec(-1)).unwrap_err();
        assert!(matches!(err, TallyError::InvalidFee(_)));
        // Key was not consumed by the failed attempts.
        assert!(!reg.is_key_used(&key));
    }

    #[test]
    fn capacity_counts_issued_ids() {
        let mut reg = ProviderRegistry::new(2);
        let owner = AccountId::new();
        let a = reg.register(owner, RegistrationKey::random(), dec(1)).unwrap();
        reg.register(owner, RegistrationKey::random(), dec(1)).unwrap();
        let err = reg
            .register(owner, RegistrationKey::random(), dec(1))
            .unwrap_err();
        assert!(matches!(err, TallyError::CapacityExceeded { max: 2 }));

        // Removing a provider does not free capacity: ids are never reused.
        reg.remove(a).unwrap();
        let err = reg
            .register(owner, RegistrationKey::random(), dec(1))
            .unwrap_err();
        assert!(matches!(err, TallyError::CapacityExceeded { .. }));
    }

    #[test]
    fn registration_key_is_consumed_forever() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let key = RegistrationKey::derive("acme");
        let id = reg.register(owner, key, dec(10)).unwrap();

        let err = reg.register(owner, key, dec(10)).unwrap_err();
        assert!(matches!(err, TallyError::DuplicateRegistrationKey(k) if k == key));

        reg.remove(id).unwrap();
        let err = reg.register(owner, key, dec(10)).unwrap_err();
        assert!(matches!(err, TallyError::DuplicateRegistrationKey(_)));
    }

    #[test]
    fn authorize_checks_owner() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let id = reg.register(owner, RegistrationKey::random(), dec(10)).unwrap();
        assert!(reg.authorize(id, &owner).is_ok());
        let stranger = AccountId::new();
        let err = reg.authorize(id, &stranger).unwrap_err();
        assert!(matches!(err, TallyError::NotOwner { caller } if caller == stranger));
        let err = reg.authorize(ProviderId(99), &owner).unwrap_err();
        assert!(matches!(err, TallyError::ProviderNotFound(_)));
    }

    #[test]
    fn set_fee_owner_only() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let id = reg.register(owner, RegistrationKey::random(), dec(10)).unwrap();

        assert!(reg.set_fee(id, &AccountId::new(), dec(20)).is_err());
        assert!(matches!(
            reg.set_fee(id, &owner, Decimal::ZERO).unwrap_err(),
            TallyError::InvalidFee(_)
        ));
        let old = reg.set_fee(id, &owner, dec(20)).unwrap();
        assert_eq!(old, dec(10));
        assert_eq!(reg.get(id).unwrap().fee, dec(20));
    }

    #[test]
    fn set_active_validates_then_applies() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let a = reg.register(owner, RegistrationKey::random(), dec(1)).unwrap();
        let b = reg.register(owner, RegistrationKey::random(), dec(1)).unwrap();

        let err = reg.set_active(&[a, b], &[false]).unwrap_err();
        assert!(matches!(err, TallyError::ArityMismatch { ids: 2, flags: 1 }));

        // One bad id aborts the whole batch.
        let err = reg
            .set_active(&[a, ProviderId(3)], &[false, false])
            .unwrap_err();
        assert!(matches!(err, TallyError::InvalidProviderId(ProviderId(3))));
        assert!(reg.get(a).unwrap().active);

        let err = reg.set_active(&[ProviderId(0)], &[false]).unwrap_err();
        assert!(matches!(err, TallyError::InvalidProviderId(ProviderId(0))));

        let applied = reg.set_active(&[a, b], &[false, true]).unwrap();
        assert_eq!(applied, vec![(a, false), (b, true)]);
        assert!(!reg.get(a).unwrap().active);
        assert!(reg.get(b).unwrap().active);
    }

    #[test]
    fn set_active_skips_removed_providers() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let a = reg.register(owner, RegistrationKey::random(), dec(1)).unwrap();
        let b = reg.register(owner, RegistrationKey::random(), dec(1)).unwrap();
        reg.remove(a).unwrap();
        let applied = reg.set_active(&[a, b], &[false, false]).unwrap();
        assert_eq!(applied, vec![(b, false)]);
    }

    #[test]
    fn take_earnings_zeroes_balance() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let id = reg.register(owner, RegistrationKey::random(), dec(10)).unwrap();
        reg.credit(id, dec(30)).unwrap();

        assert!(reg.take_earnings(id, &AccountId::new()).is_err());
        assert_eq!(reg.get(id).unwrap().balance, dec(30));

        assert_eq!(reg.take_earnings(id, &owner).unwrap(), dec(30));
        assert!(reg.get(id).unwrap().balance.is_zero());
        // A second take sees nothing.
        assert_eq!(reg.take_earnings(id, &owner).unwrap(), Decimal::ZERO);

        reg.restore_earnings(id, dec(30)).unwrap();
        assert_eq!(reg.get(id).unwrap().balance, dec(30));
    }

    #[test]
    fn accruing_fee_skips_inactive_and_removed() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let a = reg.register(owner, RegistrationKey::random(), dec(7)).unwrap();
        let b = reg.register(owner, RegistrationKey::random(), dec(9)).unwrap();
        assert_eq!(reg.accruing_fee(a), Some(dec(7)));

        reg.set_active(&[a], &[false]).unwrap();
        assert_eq!(reg.accruing_fee(a), None);

        reg.remove(b).unwrap();
        assert_eq!(reg.accruing_fee(b), None);
    }

    #[test]
    fn attach_and_detach() {
        let mut reg = ProviderRegistry::new(10);
        let id = reg
            .register(AccountId::new(), RegistrationKey::random(), dec(1))
            .unwrap();
        reg.attach(id, SubscriberId(1)).unwrap();
        reg.attach(id, SubscriberId(2)).unwrap();
        assert_eq!(reg.get(id).unwrap().subscribers.len(), 2);

        assert!(reg.detach(id, SubscriberId(1)));
        assert!(!reg.detach(id, SubscriberId(1)));
        assert!(!reg.detach(ProviderId(42), SubscriberId(2)));
        assert!(reg.attach(ProviderId(42), SubscriberId(2)).is_err());
    }

    #[test]
    fn total_balance_sums_live_providers() {
        let mut reg = ProviderRegistry::new(10);
        let owner = AccountId::new();
        let a = reg.register(owner, RegistrationKey::random(), dec(1)).unwrap();
        let b = reg.register(owner, RegistrationKey::random(), dec(1)).unwrap();
        reg.credit(a, dec(40)).unwrap();
        reg.credit(b, dec(2)).unwrap();
        assert_eq!(reg.total_balance().unwrap(), dec(42));
    }
}
