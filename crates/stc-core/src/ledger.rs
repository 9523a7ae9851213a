// SPDX-License-Identifier: AGPL-3.0-only
//! # Sale Ledger
//!
//! Fungible balance ledger for the STCT claim token.
//!
//! ## Overview
//! Tokens only come into existence through `issue` (a whitelisted purchase
//! during the Active phase) and move between holders through `transfer`.
//! There is no burn, so `total_supply` equals the sum of all balances at
//! every observable boundary.
//!
//! ## Profit settlement
//! Every balance change first settles the affected accounts against the
//! profit accumulator using the balance held BEFORE the change. New holdings
//! only start earning from the next deposit, and a seller keeps whatever
//! accrued while they held the tokens.
//!
//! Each mutation computes the full post-state first and commits it only
//! after every check has passed, so a failed call leaves the ledger untouched.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::Address;
use crate::error::{SaleError, SaleResult};
use crate::profit::ProfitDistributor;

// ─────────────────────────────────────────────────────────────
// TOKEN METADATA
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Human-readable name (e.g. "StockToChain Token")
    pub name: String,
    /// Ticker symbol (e.g. "STCT"), max 8 characters
    pub symbol: String,
    /// Decimal places of the smallest unit (STCT = 18)
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() || self.name.len() > 64 {
            return Err("Name must be 1-64 characters".to_string());
        }
        if self.symbol.is_empty() || self.symbol.len() > 8 {
            return Err("Symbol must be 1-8 characters".to_string());
        }
        if self.decimals > 18 {
            return Err("Decimals must be 0-18".to_string());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// ACCOUNT RECORD
// ─────────────────────────────────────────────────────────────

/// Per-holder record. Created lazily on the first balance or profit event
/// and never removed; a zero balance is a valid terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(with = "crate::u128_str")]
    pub balance: u128,
    /// Accumulator value this account was last settled at
    pub profit_checkpoint: U256,
    /// Settled entitlement not yet claimed
    #[serde(with = "crate::u128_str")]
    pub pending_profit: u128,
    /// Lifetime amount claimed
    #[serde(with = "crate::u128_str")]
    pub claimed_total: u128,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance: 0,
            profit_checkpoint: U256::zero(),
            pending_profit: 0,
            claimed_total: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// LEDGER
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLedger {
    pub metadata: TokenMetadata,
    /// Issuance cap in smallest units (0 = uncapped)
    #[serde(with = "crate::u128_str")]
    max_supply: u128,
    #[serde(with = "crate::u128_str")]
    total_supply: u128,
    /// BTreeMap for deterministic serialization and state roots
    accounts: BTreeMap<Address, Account>,
}

impl SaleLedger {
    pub fn new(metadata: TokenMetadata, max_supply: u128) -> Self {
        Self {
            metadata,
            max_supply,
            total_supply: 0,
            accounts: BTreeMap::new(),
        }
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn max_supply(&self) -> u128 {
        self.max_supply
    }

    /// Units still available for issuance (`u128::MAX` headroom when uncapped).
    pub fn remaining_supply(&self) -> u128 {
        if self.max_supply == 0 {
            return u128::MAX - self.total_supply;
        }
        self.max_supply.saturating_sub(self.total_supply)
    }

    pub fn balance_of(&self, address: &Address) -> u128 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.accounts.values().filter(|a| a.balance > 0).count()
    }

    /// Sum of every balance (audit only; iterates all accounts).
    pub fn sum_balances(&self) -> SaleResult<u128> {
        self.accounts.values().try_fold(0u128, |acc, a| {
            acc.checked_add(a.balance)
                .ok_or(SaleError::ArithmeticOverflow)
        })
    }

    pub(crate) fn put_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    /// Mint `amount` new units to `to`, settling `to` first.
    pub fn issue(
        &mut self,
        to: &Address,
        amount: u128,
        profit: &ProfitDistributor,
    ) -> SaleResult<()> {
        to.ensure_nonzero()?;
        if amount == 0 {
            return Err(SaleError::ZeroAmount);
        }
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;
        if self.max_supply > 0 && new_supply > self.max_supply {
            return Err(SaleError::SupplyCapExceeded {
                supply: self.total_supply,
                requested: amount,
                cap: self.max_supply,
            });
        }

        let current = self.accounts.get(to).copied().unwrap_or_default();
        let mut next = profit.settled(&current)?;
        next.balance = next
            .balance
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;

        self.accounts.insert(*to, next);
        self.total_supply = new_supply;
        Ok(())
    }

    /// Move `amount` from `from` to `to`, settling both first.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
        profit: &ProfitDistributor,
    ) -> SaleResult<()> {
        to.ensure_nonzero()?;
        if amount == 0 {
            return Err(SaleError::ZeroAmount);
        }
        let sender = self.accounts.get(from).copied().unwrap_or_default();
        if sender.balance < amount {
            return Err(SaleError::InsufficientBalance {
                have: sender.balance,
                need: amount,
            });
        }

        if from == to {
            // Self-transfer: settle once, balance unchanged
            let settled = profit.settled(&sender)?;
            self.accounts.insert(*from, settled);
            return Ok(());
        }

        let receiver = self.accounts.get(to).copied().unwrap_or_default();
        let mut next_sender = profit.settled(&sender)?;
        let mut next_receiver = profit.settled(&receiver)?;
        next_sender.balance -= amount;
        next_receiver.balance = next_receiver
            .balance
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;

        self.accounts.insert(*from, next_sender);
        self.accounts.insert(*to, next_receiver);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// TESTS
// ─────────────────────────────────────────────────────────────
