// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SALE ENGINE
//
// Owns every component and exposes the external operations. Each
// state-changing operation:
//   1. takes the engine-wide guard (nested calls fail with ReentrancyDetected)
//   2. validates everything before the first mutation
//   3. applies its effects
//   4. performs the outbound transfer, if any, through a ValueSink
//   5. appends its event only once committed
// A failed outbound transfer restores every record it touched.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use log::{debug, info, warn};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::access::AccessRegistry;
use crate::address::Address;
use crate::config::SaleConfig;
use crate::error::{SaleError, SaleResult};
use crate::events::{EventLog, EventRecord, SaleEvent};
use crate::ledger::{Account, SaleLedger};
use crate::oracle::{PriceOracleAdapter, RateFeed};
use crate::profit::ProfitDistributor;
use crate::treasury::Treasury;
use crate::workflow::{Phase, WorkflowController};

/// Outbound value transfer to an external recipient.
///
/// The sink receives the live engine, so a recipient can try to call back
/// into it while the transfer is in flight. Returning `Err` aborts the
/// operation and rolls back its effects.
pub trait ValueSink {
    fn send(&mut self, engine: &mut SaleEngine, to: &Address, amount: u128) -> Result<(), String>;
}

/// Everything the engine mutates. Serializable for snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleState {
    pub workflow: WorkflowController,
    pub access: AccessRegistry,
    pub ledger: SaleLedger,
    pub profit: ProfitDistributor,
    pub treasury: Treasury,
    pub events: EventLog,
}

impl SaleState {
    /// Fresh state for a deployment of `config`.
    pub fn genesis(config: &SaleConfig) -> Self {
        Self {
            workflow: WorkflowController::new(),
            access: AccessRegistry::new(),
            ledger: SaleLedger::new(config.token.clone(), config.max_supply),
            profit: ProfitDistributor::new(),
            treasury: Treasury::new(
                config.treasury.company_wallet,
                config.treasury.platform_wallet,
                config.treasury.company_share_bps,
            ),
            events: EventLog::new(),
        }
    }
}

pub struct SaleEngine {
    config: SaleConfig,
    oracle: PriceOracleAdapter,
    state: SaleState,
    /// Held for the duration of any state-changing operation
    entered: bool,
}

fn u256_bytes(v: U256) -> [u8; 32] {
    let mut buf = [0u8; 32];
    v.to_big_endian(&mut buf);
    buf
}

impl SaleEngine {
    pub fn new(
        config: SaleConfig,
        reference_feed: Box<dyn RateFeed>,
        payment_feed: Box<dyn RateFeed>,
    ) -> SaleResult<Self> {
        config.validate()?;
        let state = SaleState::genesis(&config);
        Ok(Self::assemble(config, state, reference_feed, payment_feed))
    }

    /// Resume from a previously exported state. The state must belong to the
    /// same deployment and pass [`audit`](Self::audit).
    pub fn from_state(
        config: SaleConfig,
        state: SaleState,
        reference_feed: Box<dyn RateFeed>,
        payment_feed: Box<dyn RateFeed>,
    ) -> SaleResult<Self> {
        config.validate()?;
        if state.treasury.company_wallet() != config.treasury.company_wallet
            || state.treasury.platform_wallet() != config.treasury.platform_wallet
            || state.treasury.company_share_bps() != config.treasury.company_share_bps
        {
            return Err(SaleError::Persistence(
                "treasury in state does not match config".to_string(),
            ));
        }
        if state.ledger.max_supply() != config.max_supply || state.ledger.metadata != config.token
        {
            return Err(SaleError::Persistence(
                "token in state does not match config".to_string(),
            ));
        }
        if !state.events.verify_chain() {
            return Err(SaleError::Persistence("event chain is broken".to_string()));
        }

        let engine = Self::assemble(config, state, reference_feed, payment_feed);
        engine.audit()?;
        info!(
            "Restored sale state: phase {}, supply {}, {} events",
            engine.current_phase().label(),
            engine.total_supply(),
            engine.state.events.len()
        );
        Ok(engine)
    }

    /// Parse a JSON snapshot produced by [`export_state`](Self::export_state).
    pub fn from_state_json(
        config: SaleConfig,
        json: &str,
        reference_feed: Box<dyn RateFeed>,
        payment_feed: Box<dyn RateFeed>,
    ) -> SaleResult<Self> {
        let state: SaleState =
            serde_json::from_str(json).map_err(|e| SaleError::Persistence(e.to_string()))?;
        Self::from_state(config, state, reference_feed, payment_feed)
    }

    fn assemble(
        config: SaleConfig,
        state: SaleState,
        reference_feed: Box<dyn RateFeed>,
        payment_feed: Box<dyn RateFeed>,
    ) -> Self {
        let oracle = PriceOracleAdapter::new(
            config.pricing.unit_price,
            config.pricing.price_decimals,
            config.token.decimals,
            config.pricing.payment_decimals,
            config.pricing.max_feed_age_secs,
            reference_feed,
            payment_feed,
        );
        Self {
            config,
            oracle,
            state,
            entered: false,
        }
    }

    /// JSON snapshot of the full state.
    pub fn export_state(&self) -> SaleResult<String> {
        serde_json::to_string_pretty(&self.state).map_err(|e| SaleError::Persistence(e.to_string()))
    }

    // ─────────────────────────────────────────────────────────────
    // GUARD
    // ─────────────────────────────────────────────────────────────

    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> SaleResult<T>) -> SaleResult<T> {
        if self.entered {
            warn!("Rejected nested call while an operation is in progress");
            return Err(SaleError::ReentrancyDetected);
        }
        self.entered = true;
        let result = op(self);
        self.entered = false;
        result
    }

    fn ensure_admin(&self, caller: &Address, operation: &'static str) -> SaleResult<()> {
        if *caller != self.config.admin {
            warn!("Rejected {} from non-admin {}", operation, caller);
            return Err(SaleError::Unauthorized {
                caller: *caller,
                operation,
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // ADMINISTRATION
    // ─────────────────────────────────────────────────────────────

    /// Move the sale to `target`, which must be the immediate successor.
    pub fn advance_phase(&mut self, caller: &Address, target: Phase) -> SaleResult<()> {
        self.guarded(|engine| {
            engine.ensure_admin(caller, "advance_phase")?;
            let from = engine.state.workflow.advance(target)?;
            engine.state.events.append(SaleEvent::PhaseChanged { from, to: target });
            info!("Phase {} -> {}", from.label(), target.label());
            Ok(())
        })
    }

    /// Advance to whatever phase follows the current one.
    pub fn next_phase(&mut self, caller: &Address) -> SaleResult<Phase> {
        self.ensure_admin(caller, "next_phase")?;
        let current = self.current_phase();
        let target = current.next().ok_or(SaleError::InvalidPhaseTransition {
            from: current,
            to: current,
        })?;
        self.advance_phase(caller, target)?;
        Ok(target)
    }

    /// Add or remove a batch of addresses. Returns how many actually changed.
    pub fn set_whitelisted(
        &mut self,
        caller: &Address,
        addresses: &[Address],
        included: bool,
    ) -> SaleResult<usize> {
        self.guarded(|engine| {
            engine.ensure_admin(caller, "set_whitelisted")?;
            let changed = engine.state.access.set(addresses, included)?;
            for account in &changed {
                engine.state.events.append(SaleEvent::WhitelistUpdated {
                    account: *account,
                    included,
                });
            }
            if !changed.is_empty() {
                info!(
                    "Whitelist: {} {} address(es), {} members",
                    if included { "added" } else { "removed" },
                    changed.len(),
                    engine.state.access.len()
                );
            }
            Ok(changed.len())
        })
    }

    // ─────────────────────────────────────────────────────────────
    // ISSUANCE & TRANSFERS
    // ─────────────────────────────────────────────────────────────

    /// Buy `token_amount` smallest units, paying exactly the quoted amount.
    /// Returns the price paid.
    pub fn purchase(
        &mut self,
        caller: &Address,
        token_amount: u128,
        payment_sent: u128,
        now: u64,
    ) -> SaleResult<u128> {
        self.guarded(|engine| engine.purchase_inner(caller, token_amount, payment_sent, now))
    }

    fn purchase_inner(
        &mut self,
        caller: &Address,
        token_amount: u128,
        payment_sent: u128,
        now: u64,
    ) -> SaleResult<u128> {
        self.state.workflow.require(Phase::Active)?;
        if !self.state.access.is_whitelisted(caller) {
            return Err(SaleError::NotWhitelisted(*caller));
        }
        if token_amount == 0 {
            return Err(SaleError::ZeroAmount);
        }

        let required = self.oracle.quote_payment(token_amount, now)?;
        if payment_sent < required {
            return Err(SaleError::InsufficientPayment {
                sent: payment_sent,
                required,
            });
        }
        if payment_sent > required {
            return Err(SaleError::OverPayment {
                sent: payment_sent,
                required,
            });
        }

        let split = self.state.treasury.plan_proceeds(payment_sent)?;
        self.state
            .ledger
            .issue(caller, token_amount, &self.state.profit)?;
        self.state.treasury.commit_proceeds(split);

        self.state.events.append(SaleEvent::TokensPurchased {
            buyer: *caller,
            amount: token_amount,
            price_paid: required,
        });
        info!(
            "Purchase: {} bought {} units for {} (company {}, platform {})",
            caller, token_amount, required, split.company, split.platform
        );
        Ok(required)
    }

    /// Move tokens between holders. Allowed in every phase.
    pub fn transfer(&mut self, caller: &Address, to: &Address, amount: u128) -> SaleResult<()> {
        self.guarded(|engine| {
            engine
                .state
                .ledger
                .transfer(caller, to, amount, &engine.state.profit)?;
            engine.state.events.append(SaleEvent::Transfer {
                from: *caller,
                to: *to,
                amount,
            });
            debug!("Transfer: {} -> {} ({} units)", caller, to, amount);
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────
    // PROFIT
    // ─────────────────────────────────────────────────────────────

    /// Spread `amount` over the current supply. Returns the new accumulator.
    pub fn deposit_profit(&mut self, caller: &Address, amount: u128) -> SaleResult<U256> {
        self.guarded(|engine| {
            engine.ensure_admin(caller, "deposit_profit")?;
            engine
                .state
                .treasury
                .profit_reserve()
                .checked_add(amount)
                .ok_or(SaleError::ArithmeticOverflow)?;

            let supply = engine.state.ledger.total_supply();
            let acc = engine.state.profit.deposit(amount, supply)?;
            engine.state.treasury.deposit_profit(amount)?;

            engine.state.events.append(SaleEvent::ProfitsDistributed {
                amount,
                cumulative_profit_per_share: acc,
            });
            info!(
                "Profit deposit: {} over supply {} (acc = {})",
                amount, supply, acc
            );
            Ok(acc)
        })
    }

    /// Pay `caller` everything it is owed through `sink`. Returns the amount.
    pub fn claim(&mut self, caller: &Address, sink: &mut dyn ValueSink) -> SaleResult<u128> {
        self.guarded(|engine| engine.claim_inner(caller, sink))
    }

    fn claim_inner(&mut self, caller: &Address, sink: &mut dyn ValueSink) -> SaleResult<u128> {
        // Owed > 0 implies an account exists
        let before = self
            .state
            .ledger
            .account(caller)
            .copied()
            .ok_or(SaleError::NoProfitToClaim(*caller))?;
        let (after, owed) = self.state.profit.claimed(&before)?;
        if owed == 0 {
            return Err(SaleError::NoProfitToClaim(*caller));
        }

        self.state.profit.record_claim(owed)?;
        if let Err(e) = self.state.treasury.pay_profit(owed) {
            self.state.profit.revert_claim(owed);
            return Err(e);
        }
        self.state.ledger.put_account(*caller, after);

        if let Err(reason) = sink.send(self, caller, owed) {
            self.state.ledger.put_account(*caller, before);
            self.state.profit.revert_claim(owed);
            self.state.treasury.unpay_profit(owed);
            warn!("Claim payout of {} to {} failed: {}", owed, caller, reason);
            return Err(SaleError::TransferFailed {
                to: *caller,
                reason,
            });
        }

        self.state.events.append(SaleEvent::ProfitsClaimed {
            account: *caller,
            amount: owed,
        });
        info!("Claim: {} received {}", caller, owed);
        Ok(owed)
    }

    // ─────────────────────────────────────────────────────────────
    // TREASURY
    // ─────────────────────────────────────────────────────────────

    /// Pay a treasury recipient its accumulated share of proceeds.
    pub fn withdraw_proceeds(
        &mut self,
        caller: &Address,
        sink: &mut dyn ValueSink,
    ) -> SaleResult<u128> {
        self.guarded(|engine| {
            let taken = engine.state.treasury.take_withdrawal(caller)?;
            let amount = taken.company + taken.platform;

            if let Err(reason) = sink.send(engine, caller, amount) {
                engine.state.treasury.restore_withdrawal(taken);
                warn!("Withdrawal of {} to {} failed: {}", amount, caller, reason);
                return Err(SaleError::TransferFailed {
                    to: *caller,
                    reason,
                });
            }

            engine.state.events.append(SaleEvent::ProceedsWithdrawn {
                recipient: *caller,
                amount,
            });
            info!("Withdrawal: {} received {}", caller, amount);
            Ok(amount)
        })
    }

    // ─────────────────────────────────────────────────────────────
    // QUERIES
    // ─────────────────────────────────────────────────────────────

    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    pub fn admin(&self) -> Address {
        self.config.admin
    }

    pub fn state(&self) -> &SaleState {
        &self.state
    }

    pub fn ledger(&self) -> &SaleLedger {
        &self.state.ledger
    }

    pub fn treasury(&self) -> &Treasury {
        &self.state.treasury
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    pub fn events_since(&self, from_seq: u64) -> &[EventRecord] {
        self.state.events.since(from_seq)
    }

    pub fn current_phase(&self) -> Phase {
        self.state.workflow.current()
    }

    pub fn is_whitelisted(&self, address: &Address) -> bool {
        self.state.access.is_whitelisted(address)
    }

    pub fn balance_of(&self, address: &Address) -> u128 {
        self.state.ledger.balance_of(address)
    }

    pub fn total_supply(&self) -> u128 {
        self.state.ledger.total_supply()
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.state.ledger.account(address)
    }

    /// What `claim` would pay `address` right now.
    pub fn preview_owed(&self, address: &Address) -> SaleResult<u128> {
        match self.state.ledger.account(address) {
            Some(account) => self.state.profit.owed(account),
            None => Ok(0),
        }
    }

    pub fn cumulative_profit_per_share(&self) -> U256 {
        self.state.profit.cumulative_profit_per_share()
    }

    pub fn total_distributed(&self) -> u128 {
        self.state.profit.total_distributed()
    }

    pub fn total_claimed(&self) -> u128 {
        self.state.profit.total_claimed()
    }

    /// Exact payment required for `token_amount` smallest units at `now`.
    pub fn quote_payment(&self, token_amount: u128, now: u64) -> SaleResult<u128> {
        self.oracle.quote_payment(token_amount, now)
    }

    /// Payment required for one whole token at `now`.
    pub fn current_unit_price(&self, now: u64) -> SaleResult<u128> {
        self.oracle.current_unit_price(now)
    }

    /// SHA3-256 over phase, totals, accumulator, whitelist and every account
    /// in address order. Hex-encoded.
    pub fn compute_state_root(&self) -> String {
        let s = &self.state;
        let mut hasher = Sha3_256::new();
        hasher.update([s.workflow.current().as_u8()]);
        hasher.update(s.ledger.total_supply().to_le_bytes());
        hasher.update(u256_bytes(s.profit.cumulative_profit_per_share()));
        hasher.update(s.profit.total_distributed().to_le_bytes());
        hasher.update(s.profit.total_claimed().to_le_bytes());
        hasher.update(s.treasury.proceeds_held().to_le_bytes());
        hasher.update(s.treasury.owed_to(&s.treasury.company_wallet()).to_le_bytes());
        hasher.update(s.treasury.profit_reserve().to_le_bytes());
        for member in s.access.members() {
            hasher.update(member.as_bytes());
        }
        for (address, account) in s.ledger.accounts() {
            hasher.update(address.as_bytes());
            hasher.update(account.balance.to_le_bytes());
            hasher.update(u256_bytes(account.profit_checkpoint));
            hasher.update(account.pending_profit.to_le_bytes());
            hasher.update(account.claimed_total.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Check the conservation invariants. Iterates every account.
    pub fn audit(&self) -> SaleResult<()> {
        let s = &self.state;

        let sum = s.ledger.sum_balances()?;
        if sum != s.ledger.total_supply() {
            return Err(SaleError::InvariantViolation(format!(
                "sum of balances {} != total supply {}",
                sum,
                s.ledger.total_supply()
            )));
        }

        let distributed = s.profit.total_distributed();
        let claimed = s.profit.total_claimed();
        if claimed > distributed {
            return Err(SaleError::InvariantViolation(format!(
                "claimed {} exceeds distributed {}",
                claimed, distributed
            )));
        }
        if s.treasury.profit_reserve() != distributed - claimed {
            return Err(SaleError::InvariantViolation(format!(
                "profit reserve {} != distributed - claimed {}",
                s.treasury.profit_reserve(),
                distributed - claimed
            )));
        }
        if !s.treasury.is_balanced() {
            return Err(SaleError::InvariantViolation(
                "treasury shares do not sum to proceeds held".to_string(),
            ));
        }

        let acc = s.profit.cumulative_profit_per_share();
        if let Some((address, _)) = s.ledger.accounts().find(|(_, a)| a.profit_checkpoint > acc) {
            return Err(SaleError::InvariantViolation(format!(
                "checkpoint of {} is ahead of the accumulator",
                address
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// TESTS
// ─────────────────────────────────────────────────────────────
