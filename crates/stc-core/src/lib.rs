// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// STOCKTOCHAIN (STCT) - CORE ENGINE
//
// Accounting and access-control engine for the STCT claim token.
// - Phase state machine gating every operation
// - Whitelisted issuance priced from two external rate feeds
// - Pull-based profit distribution (magnified profit-per-share accumulator)
// - Treasury custody with pull-based forwarding to issuer/platform wallets
// All financial arithmetic is integer-only (u128 amounts, U256 intermediates).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod access;
pub mod address;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod profit;
pub mod treasury;
pub mod workflow;

pub use access::AccessRegistry;
pub use address::Address;
pub use config::{PricingConfig, SaleConfig, TreasuryConfig};
pub use engine::{SaleEngine, SaleState, ValueSink};
pub use error::{SaleError, SaleResult};
pub use events::{EventLog, EventRecord, SaleEvent};
pub use ledger::{Account, SaleLedger, TokenMetadata};
pub use oracle::{ManualRateFeed, PriceOracleAdapter, RateFeed, RateReading};
pub use primitive_types::U256;
pub use profit::ProfitDistributor;
pub use treasury::Treasury;
pub use workflow::{Phase, WorkflowController};

/// Fixed-point scale of the profit-per-share accumulator (10^18).
pub const PROFIT_SCALE: u128 = 1_000_000_000_000_000_000;

/// Decimals every rate reading is rescaled to before pricing.
pub const RATE_DECIMALS: u8 = 18;

/// Basis-point denominator for the treasury split (10000 = 100%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Default freshness bound for rate readings (1 hour).
pub const DEFAULT_MAX_FEED_AGE_SECS: u64 = 3_600;

// ─────────────────────────────────────────────────────────────
// u128 ↔ String serialization (JSON and TOML lack 128-bit integers)
// ─────────────────────────────────────────────────────────────

pub(crate) mod u128_str {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(val: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&val.to_string())
    }

    /// Accepts a decimal string or a non-negative integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        struct U128Visitor;

        impl<'de> Visitor<'de> for U128Visitor {
            type Value = u128;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a u128 as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                u128::try_from(v).map_err(|_| E::custom("negative value for u128"))
            }
        }

        d.deserialize_any(U128Visitor)
    }
}
