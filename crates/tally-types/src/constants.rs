//! System-wide constants for the Tally ledger.

/// Default billing-cycle length in seconds (30 days).
pub const DEFAULT_EPOCH_SECS: u64 = 30 * 24 * 60 * 60;

/// Default maximum number of provider ids the registry will ever issue.
pub const DEFAULT_MAX_PROVIDERS: u64 = 200;

/// Default registration floor: the initial deposit must cover this many
/// epochs of the chosen providers' fees.
pub const DEFAULT_MIN_DEPOSIT_EPOCHS: u32 = 2;

/// Domain prefix mixed into derived registration keys.
pub const REGISTRATION_KEY_DOMAIN: &[u8] = b"tally:registration_key:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Tally";
