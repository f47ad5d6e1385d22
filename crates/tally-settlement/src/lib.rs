//! # tally-settlement
//!
//! **Finality Plane**: epoch settlement, due sweeps, supply conservation and
//! the [`Ledger`] facade that wires every command together.
//!
//! ## Architecture
//!
//! 1. **SettlementEngine**: charge-or-deactivate for one subscriber
//! 2. **Sweep**: read-only due scan, then a dispatch that tolerates stale ids
//! 3. **SupplyConservation**: balances must equal pulled minus pushed
//! 4. **Ledger / SharedLedger**: commands, queries and the event outbox
//!
//! ## Settlement Flow
//!
//! ```text
//! Ledger.check_due() → Ledger.run_settlement(ids) → SettlementEngine.settle() per id
//! ```

pub mod engine;
pub mod ledger;
pub mod shared;
pub mod supply_conservation;
pub mod sweep;

pub use engine::{Quote, SettlementEngine, SettlementOutcome};
pub use ledger::Ledger;
pub use shared::SharedLedger;
pub use supply_conservation::SupplyConservation;
pub use sweep::{DueList, SweepReport, dispatch, scan_due};
