//! Ledger configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, TallyError, constants};

/// Configuration for a single ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Length of one billing epoch.
    pub epoch_length: Duration,
    /// Maximum number of provider ids that will ever be issued.
    pub max_providers: u64,
    /// Registration floor: the initial deposit must cover this many
    /// epochs of first-epoch fees.
    pub min_deposit_epochs: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            epoch_length: Duration::from_secs(constants::DEFAULT_EPOCH_SECS),
            max_providers: constants::DEFAULT_MAX_PROVIDERS,
            min_deposit_epochs: constants::DEFAULT_MIN_DEPOSIT_EPOCHS,
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the ledger cannot operate under.
    pub fn validate(&self) -> Result<()> {
        if self.epoch_length.is_zero() {
            return Err(TallyError::Configuration(
                "epoch_length must be non-zero".to_string(),
            ));
        }
        if self.max_providers == 0 {
            return Err(TallyError::Configuration(
                "max_providers must be at least 1".to_string(),
            ));
        }
        if self.min_deposit_epochs == 0 {
            return Err(TallyError::Configuration(
                "min_deposit_epochs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Same config with a different epoch length.
    #[must_use]
    pub fn with_epoch_length(mut self, epoch_length: Duration) -> Self {
        self.epoch_length = epoch_length;
        self
    }

    /// Same config with a different provider capacity.
    #[must_use]
    pub fn with_max_providers(mut self, max_providers: u64) -> Self {
        self.max_providers = max_providers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.epoch_length.as_secs(), 2_592_000);
        assert_eq!(cfg.max_providers, 200);
        assert_eq!(cfg.min_deposit_epochs, 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_epoch_rejected() {
        let cfg = LedgerConfig::default().with_epoch_length(Duration::ZERO);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, TallyError::Configuration(_)));
    }

    #[test]
    fn zero_capacity_rejected() {
        let cfg = LedgerConfig::default().with_max_providers(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_json_parses_and_validates() {
        let json = r#"{
            "epoch_length": { "secs": 3600, "nanos": 0 },
            "max_providers": 5,
            "min_deposit_epochs": 3
        }"#;
        let cfg = LedgerConfig::from_json(json).unwrap();
        assert_eq!(cfg.epoch_length, Duration::from_secs(3600));
        assert_eq!(cfg.max_providers, 5);
        assert_eq!(cfg.min_deposit_epochs, 3);

        let bad = r#"{
            "epoch_length": { "secs": 3600, "nanos": 0 },
            "max_providers": 5,
            "min_deposit_epochs": 0
        }"#;
        assert!(matches!(
            LedgerConfig::from_json(bad).unwrap_err(),
            TallyError::Configuration(_)
        ));
    }

    #[test]
    fn from_json_reports_malformed_input() {
        let err = LedgerConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, TallyError::Serialization(_)));
    }
}
