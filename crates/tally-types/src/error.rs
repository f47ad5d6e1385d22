//! Error types for the Tally ledger.
//!
//! All errors use the `TL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Authorization errors
//! - 2xx: Validation errors
//! - 3xx: Funds errors
//! - 4xx: Transfer rail errors
//! - 5xx: Invariant errors
//! - 9xx: General / internal errors
//!
//! An underfunded settlement is *not* an error: it is a normal outcome that
//! deactivates the subscriber.

use std::fmt;

use thiserror::Error;

use crate::{AccountId, Amount, ProviderId, RegistrationKey, SubscriberId};

/// Central error enum for all Tally operations.
#[derive(Debug, Error)]
pub enum TallyError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// The caller is not the owner of the entity it tried to act on.
    #[error("TL_ERR_100: Caller {caller} is not the owner")]
    NotOwner { caller: AccountId },

    /// The caller is not the system owner.
    #[error("TL_ERR_101: Caller {caller} is not the system owner")]
    NotSystemOwner { caller: AccountId },

    // =================================================================
    // Validation Errors (2xx)
    // =================================================================
    /// Provider fees must be strictly positive.
    #[error("TL_ERR_200: Invalid fee: {0}")]
    InvalidFee(Amount),

    /// Transfer amounts must be strictly positive.
    #[error("TL_ERR_201: Invalid amount: {0}")]
    InvalidAmount(Amount),

    /// A subscriber must subscribe to at least one provider.
    #[error("TL_ERR_202: Provider set is empty")]
    EmptyProviderSet,

    /// The same provider was listed twice in one registration.
    #[error("TL_ERR_203: Provider listed more than once: {0}")]
    DuplicateProviderInSet(ProviderId),

    /// Parallel input lists have different lengths.
    #[error("TL_ERR_204: Arity mismatch: {ids} ids, {flags} flags")]
    ArityMismatch { ids: usize, flags: usize },

    /// The id was never issued.
    #[error("TL_ERR_205: Invalid provider id: {0}")]
    InvalidProviderId(ProviderId),

    /// The registration key has already been consumed.
    #[error("TL_ERR_206: Registration key already used: {0}")]
    DuplicateRegistrationKey(RegistrationKey),

    /// The registry has issued its maximum number of provider ids.
    #[error("TL_ERR_207: Provider capacity exceeded (max {max})")]
    CapacityExceeded { max: u64 },

    /// No live provider with this id (never issued or removed).
    #[error("TL_ERR_208: Provider not found: {0}")]
    ProviderNotFound(ProviderId),

    /// No subscriber with this id.
    #[error("TL_ERR_209: Subscriber not found: {0}")]
    SubscriberNotFound(SubscriberId),

    /// The provider is not accepting new subscribers.
    #[error("TL_ERR_210: Provider inactive: {0}")]
    ProviderInactive(ProviderId),

    // =================================================================
    // Funds Errors (3xx)
    // =================================================================
    /// Initial deposit does not cover the registration floor.
    #[error("TL_ERR_300: Insufficient deposit: need {required}, got {provided}")]
    InsufficientDeposit { required: Amount, provided: Amount },

    /// A fee or balance computation overflowed.
    #[error("TL_ERR_301: Arithmetic overflow")]
    ArithmeticOverflow,

    // =================================================================
    // Transfer Rail Errors (4xx)
    // =================================================================
    /// The payer cannot cover a pull.
    #[error("TL_ERR_400: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    /// The external rail rejected a transfer.
    #[error("TL_ERR_401: Transfer failed: {reason}")]
    TransferFailed { reason: String },

    // =================================================================
    // Invariant Errors (5xx)
    // =================================================================
    /// Supply conservation invariant violated — critical safety alert.
    #[error("TL_ERR_500: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TL_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TL_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("TL_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Coarse error taxonomy callers can branch on without matching variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Wrong caller.
    Authorization,
    /// Bad input; nothing was mutated.
    Validation,
    /// Not enough money for the requested admission.
    InsufficientFunds,
    /// The external transfer rail failed.
    Transfer,
    /// A ledger invariant no longer holds.
    Invariant,
    /// Everything else.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::InsufficientFunds => write!(f, "INSUFFICIENT_FUNDS"),
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Invariant => write!(f, "INVARIANT"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl TallyError {
    /// Which bucket of the error taxonomy this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotOwner { .. } | Self::NotSystemOwner { .. } => ErrorCategory::Authorization,
            Self::InvalidFee(_)
            | Self::InvalidAmount(_)
            | Self::EmptyProviderSet
            | Self::DuplicateProviderInSet(_)
            | Self::ArityMismatch { .. }
            | Self::InvalidProviderId(_)
            | Self::DuplicateRegistrationKey(_)
            | Self::CapacityExceeded { .. }
            | Self::ProviderNotFound(_)
            | Self::SubscriberNotFound(_)
            | Self::ProviderInactive(_) => ErrorCategory::Validation,
            Self::InsufficientDeposit { .. } | Self::ArithmeticOverflow => {
                ErrorCategory::InsufficientFunds
            }
            Self::InsufficientFunds { .. } | Self::TransferFailed { .. } => ErrorCategory::Transfer,
            Self::SupplyInvariantViolation { .. } => ErrorCategory::Invariant,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TallyError>;

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = TallyError::ProviderNotFound(ProviderId(4));
        let msg = format!("{err}");
        assert!(msg.starts_with("TL_ERR_208"), "Got: {msg}");
        assert!(msg.contains("provider:4"));
    }

    #[test]
    fn insufficient_deposit_display() {
        let err = TallyError::InsufficientDeposit {
            required: Decimal::new(200, 0),
            provided: Decimal::new(199, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("TL_ERR_300"));
        assert!(msg.contains("200"));
        assert!(msg.contains("199"));
    }

    #[test]
    fn categories() {
        assert_eq!(
            TallyError::NotOwner { caller: AccountId::new() }.category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            TallyError::ArityMismatch { ids: 2, flags: 1 }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            TallyError::InsufficientDeposit {
                required: Decimal::ONE,
                provided: Decimal::ZERO,
            }
            .category(),
            ErrorCategory::InsufficientFunds
        );
        assert_eq!(
            TallyError::TransferFailed { reason: "down".into() }.category(),
            ErrorCategory::Transfer
        );
        assert_eq!(ErrorCategory::Validation.to_string(), "VALIDATION");
    }

    #[test]
    fn all_errors_have_tl_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(TallyError::EmptyProviderSet),
            Box::new(TallyError::ArithmeticOverflow),
            Box::new(TallyError::CapacityExceeded { max: 10 }),
            Box::new(TallyError::Internal("test".into())),
            Box::new(TallyError::SupplyInvariantViolation {
                reason: "a".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("TL_ERR_"),
                "Error missing TL_ERR_ prefix: {msg}"
            );
        }
    }
}
