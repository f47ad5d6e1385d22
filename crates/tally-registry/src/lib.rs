//! # tally-registry
//!
//! **Admission Plane**: provider and subscriber registration, deposits,
//! pause, earnings bookkeeping, and the external transfer rail.
//!
//! ## Architecture
//!
//! 1. **ProviderStore / SubscriberStore**: tombstoning and append-only tables
//! 2. **ProviderRegistry**: keys, capacity, fees, activation, earnings
//! 3. **SubscriberRegistry**: admission floor, first-epoch pre-charge, pause
//! 4. **TransferRail**: pulls deposits in, pushes payouts out
//!
//! ## Registration Flow
//!
//! ```text
//! SubscriberRegistry.admit() → TransferRail.pull() → SubscriberRegistry.register()
//! ```
//!
//! Validation always completes before money moves, and money moves before
//! state is written.

pub mod provider_registry;
pub mod store;
pub mod subscriber_registry;
pub mod transfer;

pub use provider_registry::ProviderRegistry;
pub use store::{ProviderStore, SubscriberStore};
pub use subscriber_registry::{Admission, SubscriberRegistry};
pub use transfer::{InMemoryRail, TransferRail};
