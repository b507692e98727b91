//! Per-turn cycle accounting.

use serde::{Deserialize, Serialize};

use crate::error::ToolcodeError;

/// Bounds how many generations one user turn may use.
///
/// `cost` only ever grows. A generation may start while `cost < max`;
/// every non-empty generation charges one unit afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleBudget {
    cost: u32,
    max: u32,
}

impl CycleBudget {
    pub fn new(max: u32) -> Result<Self, ToolcodeError> {
        if max == 0 {
            return Err(ToolcodeError::Configuration(
                "cycle budget must allow at least one cycle".into(),
            ));
        }
        Ok(Self { cost: 0, max })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.cost)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cost >= self.max
    }

    /// Whether at most one more cycle may run.
    pub fn is_final_cycle(&self) -> bool {
        self.remaining() <= 1
    }

    /// Fail with [`ToolcodeError::CycleBudgetExceeded`] if no cycle is left.
    pub fn ensure_remaining(&self) -> Result<(), ToolcodeError> {
        if self.is_exhausted() {
            Err(ToolcodeError::CycleBudgetExceeded { max: self.max })
        } else {
            Ok(())
        }
    }

    /// Record one completed cycle.
    pub fn charge(&mut self) {
        self.cost = self.cost.saturating_add(1);
    }
}
