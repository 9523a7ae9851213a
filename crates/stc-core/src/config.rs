use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::address::Address;
use crate::error::{SaleError, SaleResult};
use crate::ledger::TokenMetadata;
use crate::{BPS_DENOMINATOR, DEFAULT_MAX_FEED_AGE_SECS, RATE_DECIMALS};

/// Deployment configuration, fixed for the engine's lifetime.
///
/// ```toml
/// admin = "0x00000000000000000000000000000000000000ad"
/// max_supply = "1000000000000000000000000"
///
/// [token]
/// name = "StockToChain Token"
/// symbol = "STCT"
/// decimals = 18
///
/// [pricing]
/// unit_price = "100"        # 1.00 EUR per whole token
/// price_decimals = 2
/// payment_decimals = 18
/// max_feed_age_secs = 3600
///
/// [treasury]
/// company_wallet = "0x00000000000000000000000000000000000000c0"
/// platform_wallet = "0x00000000000000000000000000000000000000f0"
/// company_share_bps = 9000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleConfig {
    pub admin: Address,
    /// Issuance cap in smallest token units (0 = uncapped)
    #[serde(with = "crate::u128_str", default)]
    pub max_supply: u128,
    pub token: TokenMetadata,
    pub pricing: PricingConfig,
    pub treasury: TreasuryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Price of one whole token in the reference currency
    #[serde(with = "crate::u128_str")]
    pub unit_price: u128,
    pub price_decimals: u8,
    /// Decimals of the native payment currency (POL = 18)
    pub payment_decimals: u8,
    #[serde(default = "default_max_feed_age")]
    pub max_feed_age_secs: u64,
}

fn default_max_feed_age() -> u64 {
    DEFAULT_MAX_FEED_AGE_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryConfig {
    pub company_wallet: Address,
    pub platform_wallet: Address,
    /// Share of every payment owed to the company wallet, in basis points
    pub company_share_bps: u16,
}

impl SaleConfig {
    pub fn from_toml_str(content: &str) -> SaleResult<Self> {
        let config: SaleConfig =
            toml::from_str(content).map_err(|e| SaleError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate config from a TOML file
    pub fn load_from_file(path: &Path) -> SaleResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| SaleError::Persistence(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> SaleResult<String> {
        toml::to_string_pretty(self).map_err(|e| SaleError::InvalidConfig(e.to_string()))
    }

    pub fn save_to_file(&self, path: &Path) -> SaleResult<()> {
        let content = self.to_toml_string()?;
        fs::write(path, content)
            .map_err(|e| SaleError::Persistence(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> SaleResult<()> {
        if self.admin.is_zero() {
            return Err(SaleError::InvalidConfig("admin cannot be the zero address".to_string()));
        }
        self.token.validate().map_err(SaleError::InvalidConfig)?;

        if self.pricing.unit_price == 0 {
            return Err(SaleError::InvalidConfig("unit_price must be > 0".to_string()));
        }
        if self.pricing.price_decimals > RATE_DECIMALS {
            return Err(SaleError::InvalidConfig(format!(
                "price_decimals must be 0-{}",
                RATE_DECIMALS
            )));
        }
        if self.pricing.payment_decimals > RATE_DECIMALS {
            return Err(SaleError::InvalidConfig(format!(
                "payment_decimals must be 0-{}",
                RATE_DECIMALS
            )));
        }
        if self.pricing.max_feed_age_secs == 0 {
            return Err(SaleError::InvalidConfig(
                "max_feed_age_secs must be > 0".to_string(),
            ));
        }

        if self.treasury.company_wallet.is_zero() || self.treasury.platform_wallet.is_zero() {
            return Err(SaleError::InvalidConfig(
                "treasury wallets cannot be the zero address".to_string(),
            ));
        }
        if self.treasury.company_share_bps as u128 > BPS_DENOMINATOR {
            return Err(SaleError::InvalidConfig(format!(
                "company_share_bps {} exceeds {}",
                self.treasury.company_share_bps, BPS_DENOMINATOR
            )));
        }
        Ok(())
    }
}
