//! Supply conservation invariant checker.
//!
//! Mathematical invariant enforced after every command:
//! ```text
//! Σ subscriber.balance + Σ provider.balance == Σ pulled − Σ pushed
//! ```
//!
//! Settlement only moves value between subscribers and providers, so it
//! never changes either side. Only deposits (pulls) and payouts (pushes)
//! do, and they are recorded here.

use tally_types::{Amount, Result, TallyError};

/// Tracks money entering and leaving ledger custody.
#[derive(Debug, Default)]
pub struct SupplyConservation {
    /// Total pulled from payers since genesis.
    deposited: Amount,
    /// Total pushed to provider owners since genesis.
    withdrawn: Amount,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that a pull of `amount` could be recorded. Run before money
    /// moves.
    ///
    /// # Errors
    /// Returns [`TallyError::ArithmeticOverflow`] if the running total would
    /// overflow.
    pub fn check_deposit(&self, amount: Amount) -> Result<()> {
        self.deposited
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Record a successful pull.
    pub fn record_deposit(&mut self, amount: Amount) -> Result<()> {
        self.deposited = self
            .deposited
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Record a successful push.
    pub fn record_withdrawal(&mut self, amount: Amount) -> Result<()> {
        self.withdrawn = self
            .withdrawn
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        Ok(())
    }

    /// What the ledger should be holding: deposits − withdrawals.
    ///
    /// # Errors
    /// Returns [`TallyError::ArithmeticOverflow`] if the subtraction
    /// overflows.
    pub fn expected_supply(&self) -> Result<Amount> {
        self.deposited
            .checked_sub(self.withdrawn)
            .ok_or(TallyError::ArithmeticOverflow)
    }

    /// Verify that the sum of all ledger balances matches the expected
    /// supply.
    ///
    /// # Errors
    /// Returns [`TallyError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, actual_supply: Amount) -> Result<()> {
        let expected = self.expected_supply()?;
        if actual_supply != expected {
            return Err(TallyError::SupplyInvariantViolation {
                reason: format!(
                    "actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.deposited, self.withdrawn,
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn total_deposits(&self) -> Amount {
        self.deposited
    }

    #[must_use]
    pub fn total_withdrawals(&self) -> Amount {
        self.withdrawn
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn empty_supply_is_zero() {
        let sc = SupplyConservation::new();
        assert_eq!(sc.expected_supply().unwrap(), Decimal::ZERO);
        assert!(sc.verify(Decimal::ZERO).is_ok());
    }

    #[test]
    fn deposits_minus_withdrawals() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit(Decimal::new(1000, 0)).unwrap();
        sc.record_deposit(Decimal::new(500, 0)).unwrap();
        sc.record_withdrawal(Decimal::new(300, 0)).unwrap();
        assert_eq!(sc.expected_supply().unwrap(), Decimal::new(1200, 0));
        assert_eq!(sc.total_deposits(), Decimal::new(1500, 0));
        assert_eq!(sc.total_withdrawals(), Decimal::new(300, 0));
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit(Decimal::new(10, 0)).unwrap();
        assert!(sc.verify(Decimal::new(10, 0)).is_ok());
        let err = sc.verify(Decimal::new(11, 0)).unwrap_err();
        assert!(matches!(
            err,
            TallyError::SupplyInvariantViolation { .. }
        ));
    }

    #[test]
    fn overflowing_deposit_is_rejected_without_change() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit(Decimal::MAX - Decimal::ONE).unwrap();
        assert!(sc.check_deposit(Decimal::ONE).is_ok());
        assert!(matches!(
            sc.check_deposit(Decimal::TWO).unwrap_err(),
            TallyError::ArithmeticOverflow
        ));
        assert!(matches!(
            sc.record_deposit(Decimal::TWO).unwrap_err(),
            TallyError::ArithmeticOverflow
        ));
        assert_eq!(sc.total_deposits(), Decimal::MAX - Decimal::ONE);
    }
}
