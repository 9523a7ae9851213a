//! Purchase whitelist.
//!
//! Membership only gates future purchases; it never touches issued balances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::address::Address;
use crate::error::SaleResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessRegistry {
    /// BTreeSet for deterministic serialization and state roots
    members: BTreeSet<Address>,
}

impl AccessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_whitelisted(&self, address: &Address) -> bool {
        self.members.contains(address)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &Address> {
        self.members.iter()
    }

    /// Include or exclude a batch of addresses.
    ///
    /// The whole batch is validated before anything changes, so a zero
    /// address anywhere rejects the call untouched. Returns the addresses
    /// whose membership actually changed, in batch order; re-adding a member
    /// or removing a non-member is a no-op.
    pub fn set(&mut self, addresses: &[Address], included: bool) -> SaleResult<Vec<Address>> {
        for address in addresses {
            address.ensure_nonzero()?;
        }
        let mut changed = Vec::new();
        for address in addresses {
            let did_change = if included {
                self.members.insert(*address)
            } else {
                self.members.remove(address)
            };
            if did_change {
                changed.push(*address);
            }
        }
        Ok(changed)
    }
}
