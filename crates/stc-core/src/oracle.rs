// Price Oracle Adapter: reference-currency price → native payment amount
//
// The token is priced in a reference currency (EUR) and paid for in the
// native payment currency (POL). Two external feeds quote both against USD:
//
//   R1 = USD per 1 reference unit   (EUR/USD)
//   R2 = USD per 1 payment unit     (POL/USD)
//
//   payment = ceil(tokens × P × R1 / R2)
//
// Both readings are rescaled to 18 decimals before the division and all
// intermediates are U256, so the result is deterministic integer math.
// Rounding is upward: the sale never under-collects by a fractional unit.

use log::debug;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::error::{SaleError, SaleResult};
use crate::math::{div_ceil, pow10, rescale_up, to_u128};
use crate::RATE_DECIMALS;

/// A single rate observation from an external feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateReading {
    /// Raw answer with `decimals` fractional digits (1.08 at 8 decimals = 108_000_000)
    #[serde(with = "crate::u128_str")]
    pub answer: u128,
    pub decimals: u8,
    /// Unix seconds of the feed's last update
    pub updated_at: u64,
}

impl RateReading {
    pub fn new(answer: u128, decimals: u8, updated_at: u64) -> Self {
        Self {
            answer,
            decimals,
            updated_at,
        }
    }

    /// Seconds since the last update. Readings from the future count as fresh.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.updated_at)
    }
}

/// External rate source. The engine trusts whatever a feed reports and only
/// checks shape and freshness.
pub trait RateFeed {
    fn latest_reading(&self) -> SaleResult<RateReading>;
}

/// Feed whose reading is pushed in by the host (tests, simulations, a relay
/// process). Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct ManualRateFeed {
    slot: Arc<Mutex<Option<RateReading>>>,
}

impl ManualRateFeed {
    pub fn new(reading: RateReading) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(reading))),
        }
    }

    /// Feed that has never reported.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&self, reading: RateReading) -> SaleResult<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SaleError::PriceFeedUnavailable("feed lock poisoned".to_string()))?;
        *slot = Some(reading);
        Ok(())
    }
}

impl RateFeed for ManualRateFeed {
    fn latest_reading(&self) -> SaleResult<RateReading> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| SaleError::PriceFeedUnavailable("feed lock poisoned".to_string()))?;
        slot.ok_or_else(|| SaleError::PriceFeedUnavailable("feed has not reported".to_string()))
    }
}

/// Converts token amounts into the exact native payment required.
pub struct PriceOracleAdapter {
    /// Price of one whole token in the reference currency, `price_decimals` digits
    unit_price: u128,
    price_decimals: u8,
    token_decimals: u8,
    payment_decimals: u8,
    max_feed_age_secs: u64,
    reference_feed: Box<dyn RateFeed>,
    payment_feed: Box<dyn RateFeed>,
}

impl PriceOracleAdapter {
    pub fn new(
        unit_price: u128,
        price_decimals: u8,
        token_decimals: u8,
        payment_decimals: u8,
        max_feed_age_secs: u64,
        reference_feed: Box<dyn RateFeed>,
        payment_feed: Box<dyn RateFeed>,
    ) -> Self {
        Self {
            unit_price,
            price_decimals,
            token_decimals,
            payment_decimals,
            max_feed_age_secs,
            reference_feed,
            payment_feed,
        }
    }

    pub fn max_feed_age_secs(&self) -> u64 {
        self.max_feed_age_secs
    }

    /// Validate shape and freshness of one reading.
    fn check_reading(&self, feed: &'static str, reading: RateReading, now: u64) -> SaleResult<()> {
        if reading.answer == 0 {
            return Err(SaleError::InvalidPriceFeed {
                feed,
                reason: "zero answer".to_string(),
            });
        }
        if reading.decimals > RATE_DECIMALS {
            return Err(SaleError::InvalidPriceFeed {
                feed,
                reason: format!("{} decimals exceeds {}", reading.decimals, RATE_DECIMALS),
            });
        }
        let age = reading.age(now);
        if age > self.max_feed_age_secs {
            return Err(SaleError::StalePriceFeed {
                feed,
                age_secs: age,
                max_age_secs: self.max_feed_age_secs,
            });
        }
        Ok(())
    }

    /// Payment (in smallest payment units) for `token_amount` smallest token
    /// units, priced from both live feeds as of `now`.
    pub fn quote_payment(&self, token_amount: u128, now: u64) -> SaleResult<u128> {
        let reference = self.reference_feed.latest_reading()?;
        let payment = self.payment_feed.latest_reading()?;
        self.check_reading("reference", reference, now)?;
        self.check_reading("payment", payment, now)?;
        let quote = self.price_from_readings(token_amount, reference, payment)?;
        debug!(
            "quote: {} token units -> {} payment units (R1={}e-{}, R2={}e-{})",
            token_amount,
            quote,
            reference.answer,
            reference.decimals,
            payment.answer,
            payment.decimals
        );
        Ok(quote)
    }

    /// Price of one whole token (10^token_decimals units).
    pub fn current_unit_price(&self, now: u64) -> SaleResult<u128> {
        let one_token = to_u128(pow10(self.token_decimals))?;
        self.quote_payment(one_token, now)
    }

    /// The pricing formula on already-validated readings; no feed access.
    pub fn price_from_readings(
        &self,
        token_amount: u128,
        reference: RateReading,
        payment: RateReading,
    ) -> SaleResult<u128> {
        let r1 = rescale_up(reference.answer, reference.decimals, RATE_DECIMALS)?;
        let r2 = rescale_up(payment.answer, payment.decimals, RATE_DECIMALS)?;
        if r2.is_zero() {
            return Err(SaleError::InvalidPriceFeed {
                feed: "payment",
                reason: "zero answer".to_string(),
            });
        }

        let numerator = U256::from(token_amount)
            .checked_mul(U256::from(self.unit_price))
            .and_then(|v| v.checked_mul(r1))
            .and_then(|v| v.checked_mul(pow10(self.payment_decimals)))
            .ok_or(SaleError::ArithmeticOverflow)?;
        let denominator = r2
            .checked_mul(pow10(self.price_decimals))
            .and_then(|v| v.checked_mul(pow10(self.token_decimals)))
            .ok_or(SaleError::ArithmeticOverflow)?;

        to_u128(div_ceil(numerator, denominator)?)
    }
}
