//! Sale workflow: NotStarted → Active → Ended → BuybackActive.
//!
//! Phases only ever advance by exactly one step. The controller owns the
//! current phase; nothing else in the engine writes it.

use serde::{Deserialize, Serialize};

use crate::error::{SaleError, SaleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    NotStarted = 0,
    Active = 1,
    Ended = 2,
    BuybackActive = 3,
}

impl Phase {
    /// The phase directly after this one, or `None` for the terminal phase.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::NotStarted => Some(Phase::Active),
            Phase::Active => Some(Phase::Ended),
            Phase::Ended => Some(Phase::BuybackActive),
            Phase::BuybackActive => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Phase> {
        match v {
            0 => Some(Phase::NotStarted),
            1 => Some(Phase::Active),
            2 => Some(Phase::Ended),
            3 => Some(Phase::BuybackActive),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::NotStarted => "not started",
            Phase::Active => "sale active",
            Phase::Ended => "sale ended",
            Phase::BuybackActive => "buyback active",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowController {
    phase: Phase,
}

impl Default for WorkflowController {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowController {
    pub fn new() -> Self {
        Self {
            phase: Phase::NotStarted,
        }
    }

    pub fn current(&self) -> Phase {
        self.phase
    }

    /// Check that `target` is the immediate successor of the current phase.
    pub fn check_transition(&self, target: Phase) -> SaleResult<()> {
        if self.phase.next() != Some(target) {
            return Err(SaleError::InvalidPhaseTransition {
                from: self.phase,
                to: target,
            });
        }
        Ok(())
    }

    /// Move to `target`. Returns the previous phase.
    /// Authorization is the engine's job; this only enforces ordering.
    pub fn advance(&mut self, target: Phase) -> SaleResult<Phase> {
        self.check_transition(target)?;
        let previous = self.phase;
        self.phase = target;
        Ok(previous)
    }

    pub fn require(&self, expected: Phase) -> SaleResult<()> {
        if self.phase != expected {
            return Err(SaleError::NotActive(self.phase));
        }
        Ok(())
    }
}
