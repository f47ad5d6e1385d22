//! Transfer rail — the external collaborator that actually moves money.
//!
//! The ledger only *records* balances. Pulling a deposit from a payer and
//! pushing a payout to a provider owner happen through a [`TransferRail`].

use std::collections::HashMap;

use tally_types::{AccountId, Amount, Result, TallyError};

/// Moves funds between external accounts and ledger custody.
pub trait TransferRail {
    /// Collect `amount` from `from` into custody.
    ///
    /// # Errors
    /// Fails if `from` lacks the balance or allowance.
    fn pull(&mut self, from: &AccountId, amount: Amount) -> Result<()>;

    /// Pay `amount` out of custody to `to`.
    fn push(&mut self, to: &AccountId, amount: Amount) -> Result<()>;
}

/// In-process rail backed by a wallet map.
///
/// Useful for simulations and tests. Pushes can be switched off to exercise
/// the ledger's compensation paths.
#[derive(Debug, Default)]
pub struct InMemoryRail {
    wallets: HashMap<AccountId, Amount>,
    /// Funds currently held on behalf of the ledger.
    custody: Amount,
    reject_pushes: bool,
}

impl InMemoryRail {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an external wallet (e.g. a user buying in).
    pub fn fund(&mut self, account: AccountId, amount: Amount) {
        let wallet = self.wallets.entry(account).or_insert(Amount::ZERO);
        *wallet = wallet.saturating_add(amount);
    }

    /// External wallet balance.
    #[must_use]
    pub fn wallet(&self, account: &AccountId) -> Amount {
        self.wallets.get(account).copied().unwrap_or(Amount::ZERO)
    }

    /// Funds held in custody.
    #[must_use]
    pub fn custody(&self) -> Amount {
        self.custody
    }

    /// Make every subsequent push fail (or succeed again).
    pub fn set_reject_pushes(&mut self, reject: bool) {
        self.reject_pushes = reject;
    }
}

impl TransferRail for InMemoryRail {
    fn pull(&mut self, from: &AccountId, amount: Amount) -> Result<()> {
        let wallet = self.wallets.entry(*from).or_insert(Amount::ZERO);
        if *wallet < amount {
            return Err(TallyError::InsufficientFunds {
                needed: amount,
                available: *wallet,
            });
        }
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        *wallet -= amount;
        self.custody = custody;
        Ok(())
    }

    fn push(&mut self, to: &AccountId, amount: Amount) -> Result<()> {
        if self.reject_pushes {
            return Err(TallyError::TransferFailed {
                reason: format!("push of {amount} to {to} rejected"),
            });
        }
        if self.custody < amount {
            return Err(TallyError::TransferFailed {
                reason: format!("custody {} cannot cover {amount}", self.custody),
            });
        }
        let wallet = self.wallets.entry(*to).or_insert(Amount::ZERO);
        *wallet = wallet
            .checked_add(amount)
            .ok_or(TallyError::ArithmeticOverflow)?;
        self.custody -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn pull_moves_wallet_into_custody() {
        let mut rail = InMemoryRail::new();
        let alice = AccountId::new();
        rail.fund(alice, Decimal::new(500, 0));
        rail.pull(&alice, Decimal::new(200, 0)).unwrap();
        assert_eq!(rail.wallet(&alice), Decimal::new(300, 0));
        assert_eq!(rail.custody(), Decimal::new(200, 0));
    }

    #[test]
    fn pull_insufficient_fails_without_change() {
        let mut rail = InMemoryRail::new();
        let alice = AccountId::new();
        rail.fund(alice, Decimal::new(10, 0));
        let err = rail.pull(&alice, Decimal::new(11, 0)).unwrap_err();
        assert!(matches!(err, TallyError::InsufficientFunds { .. }));
        assert_eq!(rail.wallet(&alice), Decimal::new(10, 0));
        assert!(rail.custody().is_zero());
    }

    #[test]
    fn push_pays_out_of_custody() {
        let mut rail = InMemoryRail::new();
        let alice = AccountId::new();
        let bob = AccountId::new();
        rail.fund(alice, Decimal::new(100, 0));
        rail.pull(&alice, Decimal::new(100, 0)).unwrap();
        rail.push(&bob, Decimal::new(60, 0)).unwrap();
        assert_eq!(rail.wallet(&bob), Decimal::new(60, 0));
        assert_eq!(rail.custody(), Decimal::new(40, 0));

        let err = rail.push(&bob, Decimal::new(41, 0)).unwrap_err();
        assert!(matches!(err, TallyError::TransferFailed { .. }));
    }

    #[test]
    fn rejected_pushes() {
        let mut rail = InMemoryRail::new();
        let alice = AccountId::new();
        rail.fund(alice, Decimal::ONE);
        rail.pull(&alice, Decimal::ONE).unwrap();
        rail.set_reject_pushes(true);
        assert!(rail.push(&alice, Decimal::ONE).is_err());
        rail.set_reject_pushes(false);
        assert!(rail.push(&alice, Decimal::ONE).is_ok());
    }
}
