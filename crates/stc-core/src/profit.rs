// ─────────────────────────────────────────────────────────────────
// Profit Distributor: Pull-Based Profit-Per-Share Accounting
// ─────────────────────────────────────────────────────────────────
// Deposit:  acc += amount × SCALE / total_supply        (SCALE = 10^18)
// Accrual:  owed = balance × (acc − checkpoint) / SCALE
// Settle:   pending += owed; checkpoint = acc
// Claim:    pay pending + owed, checkpoint = acc, pending = 0
//
// Deposits and claims are O(1): no holder is ever iterated. Both divisions
// truncate. The remainder of a deposit that does not divide evenly across
// the supply stays in the reserve as bounded dust; it is never paid out, so
// the sum of all claims can never exceed the sum of all deposits.
// ─────────────────────────────────────────────────────────────────

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::{SaleError, SaleResult};
use crate::ledger::Account;
use crate::math::{mul_div_floor, to_u128};
use crate::PROFIT_SCALE;

/// Global profit accounting state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitDistributor {
    /// Cumulative profit per unit of supply, scaled by PROFIT_SCALE.
    /// Never decreases.
    cumulative_profit_per_share: U256,
    #[serde(with = "crate::u128_str")]
    total_distributed: u128,
    #[serde(with = "crate::u128_str")]
    total_claimed: u128,
    /// Number of deposits made
    #[serde(default)]
    distribution_count: u64,
}

impl Default for ProfitDistributor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfitDistributor {
    pub fn new() -> Self {
        Self {
            cumulative_profit_per_share: U256::zero(),
            total_distributed: 0,
            total_claimed: 0,
            distribution_count: 0,
        }
    }

    pub fn cumulative_profit_per_share(&self) -> U256 {
        self.cumulative_profit_per_share
    }

    pub fn total_distributed(&self) -> u128 {
        self.total_distributed
    }

    pub fn total_claimed(&self) -> u128 {
        self.total_claimed
    }

    pub fn distribution_count(&self) -> u64 {
        self.distribution_count
    }

    /// Distributed but not yet claimed.
    pub fn outstanding(&self) -> u128 {
        self.total_distributed.saturating_sub(self.total_claimed)
    }

    /// Accumulator increment a deposit of `amount` over `total_supply` would add.
    pub fn per_share_increment(amount: u128, total_supply: u128) -> SaleResult<U256> {
        if total_supply == 0 {
            return Err(SaleError::ZeroSupply);
        }
        mul_div_floor(
            U256::from(amount),
            U256::from(PROFIT_SCALE),
            U256::from(total_supply),
        )
    }

    /// Spread `amount` across `total_supply`. Returns the new accumulator.
    pub fn deposit(&mut self, amount: u128, total_supply: u128) -> SaleResult<U256> {
        if amount == 0 {
            return Err(SaleError::ZeroAmount);
        }
        let increment = Self::per_share_increment(amount, total_supply)?;
        let next_acc = self
            .cumulative_profit_per_share
            .checked_add(increment)
            .ok_or(SaleError::ArithmeticOverflow)?;
        let next_total = self
            .total_distributed
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;

        self.cumulative_profit_per_share = next_acc;
        self.total_distributed = next_total;
        self.distribution_count += 1;
        Ok(next_acc)
    }

    /// Profit accrued by `account` since its checkpoint, at its current balance.
    pub fn accrued_since_checkpoint(&self, account: &Account) -> SaleResult<u128> {
        // checkpoint ≤ acc always holds; saturate rather than trust a restored snapshot
        let delta = self
            .cumulative_profit_per_share
            .saturating_sub(account.profit_checkpoint);
        if delta.is_zero() || account.balance == 0 {
            return Ok(0);
        }
        to_u128(mul_div_floor(
            U256::from(account.balance),
            delta,
            U256::from(PROFIT_SCALE),
        )?)
    }

    /// Total currently claimable by `account` (settled + accrued).
    pub fn owed(&self, account: &Account) -> SaleResult<u128> {
        account
            .pending_profit
            .checked_add(self.accrued_since_checkpoint(account)?)
            .ok_or(SaleError::ArithmeticOverflow)
    }

    /// Copy of `account` with accrued profit folded into `pending_profit` and
    /// the checkpoint moved to the current accumulator. Must be applied
    /// before any change to the account's balance.
    pub fn settled(&self, account: &Account) -> SaleResult<Account> {
        let mut next = *account;
        next.pending_profit = self.owed(account)?;
        next.profit_checkpoint = self.cumulative_profit_per_share;
        Ok(next)
    }

    /// In-place form of [`settled`](Self::settled).
    pub fn settle(&self, account: &mut Account) -> SaleResult<()> {
        *account = self.settled(account)?;
        Ok(())
    }

    /// Account state after paying out everything owed: settled, pending
    /// zeroed, `claimed_total` increased. Returns the new state and amount.
    pub fn claimed(&self, account: &Account) -> SaleResult<(Account, u128)> {
        let mut next = self.settled(account)?;
        let amount = next.pending_profit;
        next.pending_profit = 0;
        next.claimed_total = next
            .claimed_total
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;
        Ok((next, amount))
    }

    /// Book a payout in the global totals.
    pub fn record_claim(&mut self, amount: u128) -> SaleResult<()> {
        let next = self
            .total_claimed
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;
        if next > self.total_distributed {
            return Err(SaleError::InsufficientReserve {
                have: self.outstanding(),
                need: amount,
            });
        }
        self.total_claimed = next;
        Ok(())
    }

    /// Undo `record_claim` after a failed outbound transfer.
    pub(crate) fn revert_claim(&mut self, amount: u128) {
        self.total_claimed = self.total_claimed.saturating_sub(amount);
    }
}
