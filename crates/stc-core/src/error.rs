//! Sale engine errors
//!
//! Every operation aborts with one of these and applies no mutation.

use thiserror::Error;

use crate::address::Address;
use crate::workflow::Phase;

/// Error returned by any engine operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaleError {
    #[error("Unauthorized: {caller} may not perform {operation}")]
    Unauthorized {
        caller: Address,
        operation: &'static str,
    },

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidPhaseTransition { from: Phase, to: Phase },

    #[error("Address {0} is not whitelisted")]
    NotWhitelisted(Address),

    #[error("Sale is not active (current phase: {0:?})")]
    NotActive(Phase),

    #[error("Insufficient payment: sent {sent}, required {required}")]
    InsufficientPayment { sent: u128, required: u128 },

    #[error("Overpayment rejected: sent {sent}, required exactly {required}")]
    OverPayment { sent: u128, required: u128 },

    #[error("Stale price feed '{feed}': age {age_secs}s exceeds {max_age_secs}s")]
    StalePriceFeed {
        feed: &'static str,
        age_secs: u64,
        max_age_secs: u64,
    },

    #[error("Invalid price feed '{feed}': {reason}")]
    InvalidPriceFeed { feed: &'static str, reason: String },

    #[error("Price feed unavailable: {0}")]
    PriceFeedUnavailable(String),

    #[error("Cannot distribute profit while total supply is zero")]
    ZeroSupply,

    #[error("No profit to claim for {0}")]
    NoProfitToClaim(Address),

    #[error("Zero address is not allowed")]
    ZeroAddress,

    #[error("Reentrant call rejected")]
    ReentrancyDetected,

    #[error("Amount must be > 0")]
    ZeroAmount,

    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },

    #[error("Supply cap exceeded: supply {supply} + {requested} > cap {cap}")]
    SupplyCapExceeded {
        supply: u128,
        requested: u128,
        cap: u128,
    },

    #[error("Insufficient reserve: have {have}, need {need}")]
    InsufficientReserve { have: u128, need: u128 },

    #[error("Nothing to withdraw for {0}")]
    NothingToWithdraw(Address),

    #[error("Outbound transfer to {to} failed: {reason}")]
    TransferFailed { to: Address, reason: String },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Result type for sale engine operations
pub type SaleResult<T> = Result<T, SaleError>;
