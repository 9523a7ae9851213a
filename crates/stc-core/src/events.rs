//! # Sale Events
//!
//! Append-only log of typed records that external watchers poll with
//! [`EventLog::since`]. Records are only appended for committed operations.
//!
//! Each record is chained to the previous one:
//! `hash = SHA3-256(prev_hash || seq_le || json(event))`, hex-encoded. The
//! first record chains from 64 zeros.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::address::Address;
use crate::workflow::Phase;

/// Hash the first record chains from.
pub const GENESIS_EVENT_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SaleEvent {
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    WhitelistUpdated {
        account: Address,
        included: bool,
    },
    TokensPurchased {
        buyer: Address,
        #[serde(with = "crate::u128_str")]
        amount: u128,
        #[serde(with = "crate::u128_str")]
        price_paid: u128,
    },
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "crate::u128_str")]
        amount: u128,
    },
    ProfitsDistributed {
        #[serde(with = "crate::u128_str")]
        amount: u128,
        cumulative_profit_per_share: U256,
    },
    ProfitsClaimed {
        account: Address,
        #[serde(with = "crate::u128_str")]
        amount: u128,
    },
    ProceedsWithdrawn {
        recipient: Address,
        #[serde(with = "crate::u128_str")]
        amount: u128,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    /// 0-based position in the log
    pub seq: u64,
    pub event: SaleEvent,
    pub hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `seq >= from_seq`.
    pub fn since(&self, from_seq: u64) -> &[EventRecord] {
        let start = (from_seq as usize).min(self.records.len());
        &self.records[start..]
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    pub fn head_hash(&self) -> &str {
        self.records
            .last()
            .map(|r| r.hash.as_str())
            .unwrap_or(GENESIS_EVENT_HASH)
    }

    fn chain_hash(prev: &str, seq: u64, event: &SaleEvent) -> String {
        let payload = serde_json::to_vec(event).unwrap_or_default();
        let mut hasher = Sha3_256::new();
        hasher.update(prev.as_bytes());
        hasher.update(seq.to_le_bytes());
        hasher.update(&payload);
        hex::encode(hasher.finalize())
    }

    /// Append `event`; returns its sequence number.
    pub fn append(&mut self, event: SaleEvent) -> u64 {
        let seq = self.records.len() as u64;
        let hash = Self::chain_hash(self.head_hash(), seq, &event);
        self.records.push(EventRecord { seq, event, hash });
        seq
    }

    /// Recompute every link of the chain.
    pub fn verify_chain(&self) -> bool {
        let mut prev = GENESIS_EVENT_HASH.to_string();
        for (i, record) in self.records.iter().enumerate() {
            if record.seq != i as u64 {
                return false;
            }
            let expected = Self::chain_hash(&prev, record.seq, &record.event);
            if expected != record.hash {
                return false;
            }
            prev = expected;
        }
        true
    }
}
