//! # tally-types
//!
//! Shared types, errors, and configuration for the **Tally** prepaid
//! subscription ledger.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`ProviderId`], [`SubscriberId`], [`RegistrationKey`]
//! - **Provider model**: [`Provider`], [`ProviderView`]
//! - **Subscriber model**: [`Subscriber`], [`SubscriberView`], [`Plan`]
//! - **Epoch model**: [`unsettled_epochs`], [`Clock`], [`SystemClock`], [`ManualClock`]
//! - **Events**: [`LedgerEvent`], [`LedgerEventKind`]
//! - **Configuration**: [`LedgerConfig`]
//! - **Errors**: [`TallyError`] with `TL_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod epoch;
pub mod error;
pub mod event;
pub mod ids;
pub mod provider;
pub mod subscriber;

// Re-export all primary types at crate root for ergonomic imports:
//   use tally_types::{Provider, Subscriber, TallyError, ...};

pub use config::*;
pub use epoch::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use provider::*;
pub use subscriber::*;

/// Monetary amounts: fees, balances, deposits, payouts.
///
/// Always non-negative inside the ledger; a single implicit asset.
pub type Amount = rust_decimal::Decimal;

// Constants are accessed via `tally_types::constants::FOO`
// (not re-exported to avoid name collisions).
