//! Sweep Scanner — find due subscribers, then settle them.
//!
//! The scan is read-only. Dispatch takes any list of ids (fresh, stale,
//! duplicated, or made up by the caller) and runs the engine once per id.
//! Because the engine re-checks every subscriber, anything that changed
//! between scan and dispatch degrades to a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_registry::{ProviderRegistry, SubscriberRegistry};
use tally_types::{Amount, SubscriberId};

use crate::engine::{SettlementEngine, SettlementOutcome};

/// Result of a due scan: every due subscriber, in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueList {
    pub ids: Vec<SubscriberId>,
}

impl DueList {
    #[must_use]
    pub fn any_due(&self) -> bool {
        !self.ids.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Collect every active subscriber owing at least one whole epoch.
///
/// Single pass in store order, so the list is sorted and has no
/// duplicates.
#[must_use]
pub fn scan_due(
    engine: &SettlementEngine,
    subscribers: &SubscriberRegistry,
    now: DateTime<Utc>,
) -> DueList {
    let ids = subscribers
        .store()
        .iter()
        .filter(|s| engine.is_due(s, now))
        .map(|s| s.id)
        .collect();
    DueList { ids }
}

/// Per-id results of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// One entry per id that settled without an internal error, in
    /// dispatch order.
    pub outcomes: Vec<(SubscriberId, SettlementOutcome)>,
    /// Ids whose settlement hit an internal error, with the message.
    pub failures: Vec<(SubscriberId, String)>,
}

impl SweepReport {
    /// Subscribers charged in this sweep.
    #[must_use]
    pub fn settled(&self) -> usize {
        self.count(|o| matches!(o, SettlementOutcome::Settled { .. }))
    }

    /// Subscribers deactivated for underfunding in this sweep.
    #[must_use]
    pub fn deactivated(&self) -> usize {
        self.count(|o| matches!(o, SettlementOutcome::Deactivated { .. }))
    }

    /// Ids that turned out to be no-ops (unknown, inactive, not due).
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| !o.mutated())
    }

    /// Sum debited from subscribers (equals the sum credited to providers).
    #[must_use]
    pub fn total_charged(&self) -> Amount {
        self.outcomes
            .iter()
            .filter_map(|(_, o)| match o {
                SettlementOutcome::Settled { charged, .. } => Some(*charged),
                _ => None,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&SettlementOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Run settlement once for each id in `ids`.
///
/// Never fails as a whole: stale ids become no-op outcomes and internal
/// errors are collected into [`SweepReport::failures`].
pub fn dispatch(
    engine: &SettlementEngine,
    providers: &mut ProviderRegistry,
    subscribers: &mut SubscriberRegistry,
    ids: &[SubscriberId],
    now: DateTime<Utc>,
) -> SweepReport {
    let mut report = SweepReport::default();
    for &id in ids {
        match engine.settle(providers, subscribers, id, now) {
            Ok(outcome) => report.outcomes.push((id, outcome)),
            Err(err) => {
                tracing::error!(subscriber = %id, error = %err, "settlement failed");
                report.failures.push((id, err.to_string()));
            }
        }
    }
    tracing::info!(
        dispatched = ids.len(),
        settled = report.settled(),
        deactivated = report.deactivated(),
        skipped = report.skipped(),
        charged = %report.total_charged(),
        "sweep complete"
    );
    report
}
