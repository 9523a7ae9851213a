// Treasury: custody of sale proceeds and the profit reserve
//
// Purchase proceeds are split at receipt between the company wallet and the
// platform wallet (`company_share_bps` of each payment to the company, the
// remainder to the platform, so rounding never loses a unit). Each recipient
// pulls its share with a separate withdrawal.
//
// Profit deposits sit in a separate reserve that only claims draw from.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{SaleError, SaleResult};
use crate::BPS_DENOMINATOR;

/// Company/platform split of one payment, computed before anything is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProceedsSplit {
    pub company: u128,
    pub platform: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treasury {
    company_wallet: Address,
    platform_wallet: Address,
    company_share_bps: u16,
    /// Proceeds not yet withdrawn (company_owed + platform_owed)
    #[serde(with = "crate::u128_str")]
    proceeds_held: u128,
    #[serde(with = "crate::u128_str")]
    company_owed: u128,
    #[serde(with = "crate::u128_str")]
    platform_owed: u128,
    /// Lifetime proceeds received
    #[serde(with = "crate::u128_str")]
    total_proceeds: u128,
    /// Deposited profit not yet claimed
    #[serde(with = "crate::u128_str")]
    profit_reserve: u128,
}

impl Treasury {
    pub fn new(company_wallet: Address, platform_wallet: Address, company_share_bps: u16) -> Self {
        Self {
            company_wallet,
            platform_wallet,
            company_share_bps,
            proceeds_held: 0,
            company_owed: 0,
            platform_owed: 0,
            total_proceeds: 0,
            profit_reserve: 0,
        }
    }

    pub fn company_wallet(&self) -> Address {
        self.company_wallet
    }

    pub fn platform_wallet(&self) -> Address {
        self.platform_wallet
    }

    pub fn company_share_bps(&self) -> u16 {
        self.company_share_bps
    }

    pub fn proceeds_held(&self) -> u128 {
        self.proceeds_held
    }

    pub fn total_proceeds(&self) -> u128 {
        self.total_proceeds
    }

    pub fn profit_reserve(&self) -> u128 {
        self.profit_reserve
    }

    pub fn is_recipient(&self, address: &Address) -> bool {
        *address == self.company_wallet || *address == self.platform_wallet
    }

    /// Amount currently withdrawable by `recipient` (0 for non-recipients).
    /// If both wallets are the same address it receives both shares.
    pub fn owed_to(&self, recipient: &Address) -> u128 {
        let mut owed = 0u128;
        if *recipient == self.company_wallet {
            owed += self.company_owed;
        }
        if *recipient == self.platform_wallet {
            owed += self.platform_owed;
        }
        owed
    }

    /// Split one payment by the configured ratio.
    pub fn split(&self, amount: u128) -> ProceedsSplit {
        // divide first when amount × bps overflows
        let bps = self.company_share_bps as u128;
        let company = match amount.checked_mul(bps) {
            Some(v) => v / BPS_DENOMINATOR,
            None => (amount / BPS_DENOMINATOR) * bps
                + (amount % BPS_DENOMINATOR) * bps / BPS_DENOMINATOR,
        };
        ProceedsSplit {
            company,
            platform: amount - company,
        }
    }

    /// Check that `amount` can be booked; returns the split to commit.
    pub fn plan_proceeds(&self, amount: u128) -> SaleResult<ProceedsSplit> {
        let split = self.split(amount);
        self.proceeds_held
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;
        self.total_proceeds
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;
        self.company_owed
            .checked_add(split.company)
            .ok_or(SaleError::ArithmeticOverflow)?;
        self.platform_owed
            .checked_add(split.platform)
            .ok_or(SaleError::ArithmeticOverflow)?;
        Ok(split)
    }

    /// Book a split returned by `plan_proceeds` on the same state.
    pub fn commit_proceeds(&mut self, split: ProceedsSplit) {
        let amount = split.company + split.platform;
        self.proceeds_held += amount;
        self.total_proceeds += amount;
        self.company_owed += split.company;
        self.platform_owed += split.platform;
    }

    pub fn receive_proceeds(&mut self, amount: u128) -> SaleResult<ProceedsSplit> {
        let split = self.plan_proceeds(amount)?;
        self.commit_proceeds(split);
        Ok(split)
    }

    /// Zero out `recipient`'s share and return it. The caller sends the funds
    /// and calls `restore_withdrawal` if sending fails.
    pub fn take_withdrawal(&mut self, recipient: &Address) -> SaleResult<ProceedsSplit> {
        if !self.is_recipient(recipient) {
            return Err(SaleError::Unauthorized {
                caller: *recipient,
                operation: "withdraw_proceeds",
            });
        }
        let taken = ProceedsSplit {
            company: if *recipient == self.company_wallet {
                self.company_owed
            } else {
                0
            },
            platform: if *recipient == self.platform_wallet {
                self.platform_owed
            } else {
                0
            },
        };
        let total = taken.company + taken.platform;
        if total == 0 {
            return Err(SaleError::NothingToWithdraw(*recipient));
        }
        self.company_owed -= taken.company;
        self.platform_owed -= taken.platform;
        self.proceeds_held -= total;
        Ok(taken)
    }

    pub(crate) fn restore_withdrawal(&mut self, taken: ProceedsSplit) {
        self.company_owed += taken.company;
        self.platform_owed += taken.platform;
        self.proceeds_held += taken.company + taken.platform;
    }

    pub fn deposit_profit(&mut self, amount: u128) -> SaleResult<()> {
        self.profit_reserve = self
            .profit_reserve
            .checked_add(amount)
            .ok_or(SaleError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn pay_profit(&mut self, amount: u128) -> SaleResult<()> {
        if amount > self.profit_reserve {
            return Err(SaleError::InsufficientReserve {
                have: self.profit_reserve,
                need: amount,
            });
        }
        self.profit_reserve -= amount;
        Ok(())
    }

    pub(crate) fn unpay_profit(&mut self, amount: u128) {
        self.profit_reserve += amount;
    }

    /// company_owed + platform_owed == proceeds_held
    pub fn is_balanced(&self) -> bool {
        self.company_owed.checked_add(self.platform_owed) == Some(self.proceeds_held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> Address {
        Address::from_low_u64(0xC0)
    }
    fn platform() -> Address {
        Address::from_low_u64(0xF0)
    }

    #[test]
    fn test_split_sums_exactly() {
        let t = Treasury::new(company(), platform(), 9_000);
        for amount in [0u128, 1, 7, 999, 10_001, 123_456_789] {
            let s = t.split(amount);
            assert_eq!(s.company + s.platform, amount);
        }
        assert_eq!(t.split(1_000).company, 900);
        assert_eq!(t.split(1_000).platform, 100);
    }

    #[test]
    fn test_split_near_max() {
        let t = Treasury::new(company(), platform(), 5_000);
        let s = t.split(u128::MAX);
        assert_eq!(s.company + s.platform, u128::MAX);
        assert_eq!(s.company, u128::MAX / 2);
    }

    #[test]
    fn test_split_extremes() {
        let all_company = Treasury::new(company(), platform(), 10_000);
        assert_eq!(all_company.split(77).platform, 0);
        let all_platform = Treasury::new(company(), platform(), 0);
        assert_eq!(all_platform.split(77).company, 0);
    }

    #[test]
    fn test_receive_and_withdraw() {
        let mut t = Treasury::new(company(), platform(), 8_000);
        t.receive_proceeds(1_000).unwrap();
        assert_eq!(t.proceeds_held(), 1_000);
        assert_eq!(t.owed_to(&company()), 800);
        assert_eq!(t.owed_to(&platform()), 200);
        assert!(t.is_balanced());

        let taken = t.take_withdrawal(&company()).unwrap();
        assert_eq!(taken.company, 800);
        assert_eq!(t.owed_to(&company()), 0);
        assert_eq!(t.proceeds_held(), 200);
        assert!(t.is_balanced());

        assert_eq!(
            t.take_withdrawal(&company()),
            Err(SaleError::NothingToWithdraw(company()))
        );
    }

    #[test]
    fn test_withdraw_by_stranger() {
        let mut t = Treasury::new(company(), platform(), 8_000);
        t.receive_proceeds(10).unwrap();
        let stranger = Address::from_low_u64(1);
        assert!(matches!(
            t.take_withdrawal(&stranger),
            Err(SaleError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_restore_withdrawal() {
        let mut t = Treasury::new(company(), platform(), 5_000);
        t.receive_proceeds(100).unwrap();
        let taken = t.take_withdrawal(&platform()).unwrap();
        t.restore_withdrawal(taken);
        assert_eq!(t.owed_to(&platform()), 50);
        assert_eq!(t.proceeds_held(), 100);
    }

    #[test]
    fn test_same_wallet_gets_both_shares() {
        let mut t = Treasury::new(company(), company(), 3_000);
        t.receive_proceeds(100).unwrap();
        assert_eq!(t.owed_to(&company()), 100);
        let taken = t.take_withdrawal(&company()).unwrap();
        assert_eq!(taken.company + taken.platform, 100);
        assert_eq!(t.proceeds_held(), 0);
    }

    #[test]
    fn test_profit_reserve() {
        let mut t = Treasury::new(company(), platform(), 5_000);
        t.deposit_profit(50).unwrap();
        t.pay_profit(20).unwrap();
        assert_eq!(t.profit_reserve(), 30);
        assert!(t.pay_profit(31).is_err());
        t.unpay_profit(20);
        assert_eq!(t.profit_reserve(), 50);
    }
}
