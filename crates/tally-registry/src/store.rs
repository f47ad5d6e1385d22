//! Entity stores.
//!
//! - [`ProviderStore`]: keyed by id, deleting leaves a tombstone so the id
//!   is never issued again.
//! - [`SubscriberStore`]: dense, append-only; id `n` lives at slot `n - 1`.
//!
//! Stores do no validation. Registries own them and enforce the rules.

use std::collections::BTreeMap;

use tally_types::{Provider, ProviderId, Subscriber, SubscriberId};

/// Provider table with tombstone-on-delete.
#[derive(Debug, Default)]
pub struct ProviderStore {
    /// Live providers, ordered by id.
    providers: BTreeMap<ProviderId, Provider>,
    /// Highest id ever issued (0 = none yet).
    last_issued: ProviderId,
}

impl ProviderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next insert will receive.
    #[must_use]
    pub fn next_id(&self) -> ProviderId {
        self.last_issued.next()
    }

    /// Highest id ever issued, including removed ones.
    #[must_use]
    pub fn last_issued(&self) -> ProviderId {
        self.last_issued
    }

    /// Whether `id` was issued at some point (live or tombstoned).
    #[must_use]
    pub fn was_issued(&self, id: ProviderId) -> bool {
        id.0 >= 1 && id <= self.last_issued
    }

    /// Insert a provider under the next id. The caller builds the provider
    /// with [`next_id`](Self::next_id).
    pub(crate) fn insert(&mut self, provider: Provider) -> ProviderId {
        debug_assert_eq!(provider.id, self.next_id(), "provider ids are sequential");
        let id = provider.id;
        self.last_issued = id;
        self.providers.insert(id, provider);
        id
    }

    #[must_use]
    pub fn get(&self, id: ProviderId) -> Option<&Provider> {
        self.providers.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ProviderId) -> Option<&mut Provider> {
        self.providers.get_mut(&id)
    }

    /// Delete a provider. Its id stays consumed.
    pub(crate) fn tombstone(&mut self, id: ProviderId) -> Option<Provider> {
        self.providers.remove(&id)
    }

    /// Live providers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    /// Number of live providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Append-only subscriber table.
#[derive(Debug, Default)]
pub struct SubscriberStore {
    subscribers: Vec<Subscriber>,
}

impl SubscriberStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next append will receive.
    #[must_use]
    pub fn next_id(&self) -> SubscriberId {
        SubscriberId(self.subscribers.len() as u64 + 1)
    }

    pub(crate) fn append(&mut self, subscriber: Subscriber) -> SubscriberId {
        debug_assert_eq!(subscriber.id, self.next_id(), "subscriber ids are sequential");
        let id = subscriber.id;
        self.subscribers.push(subscriber);
        id
    }

    #[must_use]
    pub fn get(&self, id: SubscriberId) -> Option<&Subscriber> {
        id.index().and_then(|i| self.subscribers.get(i))
    }

    pub(crate) fn get_mut(&mut self, id: SubscriberId) -> Option<&mut Subscriber> {
        id.index().and_then(|i| self.subscribers.get_mut(i))
    }

    /// All subscribers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscriber> {
        self.subscribers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
