//! Strategy Planning and Run Bookkeeping
//!
//! Both supported strategies decompose a total order into an ordered
//! sequence of intents that are executed sequentially with every outcome
//! recorded. Planning is pure: given a run id and parameters it produces
//! the full intent sequence up front, including deterministic idempotency
//! keys, so a retried submission of the same run produces identical keys.

use std::fmt;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{OrderIntent, OrderResult, OrderSide};

// =============================================================================
// Run Identity
// =============================================================================

/// Unique identifier of one strategy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyRunId(Uuid);

impl StrategyRunId {
    /// Generate a fresh run id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive the idempotency key for one slice of this run.
    ///
    /// Deterministic in (run id, slice index): calling this twice for the
    /// same pair yields the same key.
    #[must_use]
    pub fn idempotency_key(&self, slice_index: usize) -> String {
        format!("{}-{}", self.0, slice_index)
    }
}

impl fmt::Display for StrategyRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Parameters for a time-weighted average price run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapParams {
    /// Trading pair symbol.
    pub symbol: String,
    /// Order side for every slice.
    pub side: OrderSide,
    /// Total base-asset quantity, split equally across slices.
    pub total_quantity: Decimal,
    /// Number of market-order slices.
    pub slice_count: u32,
    /// Scheduling delay between consecutive slices.
    pub interval: Duration,
}

impl TwapParams {
    /// Validate the preconditions; a violation rejects the run before any
    /// slice is attempted.
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.slice_count == 0 {
            return Err(StrategyError::InvalidParameters(
                "slice count must be greater than 0".to_string(),
            ));
        }
        if self.total_quantity <= Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(
                "total quantity must be greater than 0".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(StrategyError::InvalidParameters(
                "interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Equal-split quantity per slice. Venue precision rounding is the
    /// order gateway's responsibility, not the planner's.
    #[must_use]
    pub fn quantity_per_slice(&self) -> Decimal {
        self.total_quantity / Decimal::from(self.slice_count)
    }
}

/// Parameters for a price-grid run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridParams {
    /// Trading pair symbol.
    pub symbol: String,
    /// Order side for every level.
    pub side: OrderSide,
    /// Lowest grid price (level 0).
    pub lower_price: Decimal,
    /// Highest grid price (last level).
    pub upper_price: Decimal,
    /// Number of price levels; must be at least 2.
    pub grid_levels: u32,
    /// Base-asset quantity placed at each level.
    pub quantity_per_level: Decimal,
}

impl GridParams {
    /// Validate the preconditions; a violation rejects the run before any
    /// level is attempted.
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.grid_levels <= 1 {
            return Err(StrategyError::InvalidParameters(
                "grid levels must be at least 2".to_string(),
            ));
        }
        if self.lower_price >= self.upper_price {
            return Err(StrategyError::InvalidParameters(
                "lower price must be less than upper price".to_string(),
            ));
        }
        if self.quantity_per_level <= Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(
                "quantity per level must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Price increment between adjacent levels.
    #[must_use]
    pub fn price_step(&self) -> Decimal {
        (self.upper_price - self.lower_price) / Decimal::from(self.grid_levels - 1)
    }

    /// Price of a 0-indexed level: `lower + i * step`.
    #[must_use]
    pub fn level_price(&self, level: u32) -> Decimal {
        self.lower_price + Decimal::from(level) * self.price_step()
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Plan the ordered market-order slices of a TWAP run.
///
/// Call [`TwapParams::validate`] first; planning assumes valid parameters.
#[must_use]
pub fn plan_twap(run_id: StrategyRunId, params: &TwapParams) -> Vec<OrderIntent> {
    let quantity = params.quantity_per_slice();
    (0..params.slice_count as usize)
        .map(|index| {
            OrderIntent::market(
                params.symbol.clone(),
                params.side,
                quantity,
                run_id.idempotency_key(index),
            )
        })
        .collect()
}

/// Plan the ordered limit-order levels of a grid run, lowest price first.
///
/// Call [`GridParams::validate`] first; planning assumes valid parameters.
#[must_use]
pub fn plan_grid(run_id: StrategyRunId, params: &GridParams) -> Vec<OrderIntent> {
    (0..params.grid_levels)
        .map(|level| {
            OrderIntent::limit(
                params.symbol.clone(),
                params.side,
                params.quantity_per_level,
                params.level_price(level),
                run_id.idempotency_key(level as usize),
            )
        })
        .collect()
}

// =============================================================================
// Run Bookkeeping
// =============================================================================

/// Which strategy a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyKind {
    /// Time-weighted average price.
    Twap,
    /// Price-grid placement.
    Grid,
}

/// Overall status of a strategy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Slices are still being attempted.
    Running,
    /// Every slice succeeded.
    Completed,
    /// All slices were attempted; at least one failed.
    PartiallyFailed,
    /// Halted before all slices were attempted (cancellation or a fatal
    /// gateway condition); completed outcomes are retained.
    Aborted,
}

/// Recorded result of one slice or level.
///
/// Outcomes are append-only and never reordered; a failed slice is a
/// first-class outcome, not an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceOutcome {
    /// The intent that was submitted.
    pub intent: OrderIntent,
    /// Gateway result, or the classified failure reason.
    pub result: Result<OrderResult, String>,
}

impl SliceOutcome {
    /// Record a successful slice.
    #[must_use]
    pub const fn success(intent: OrderIntent, result: OrderResult) -> Self {
        Self {
            intent,
            result: Ok(result),
        }
    }

    /// Record a failed slice.
    #[must_use]
    pub const fn failed(intent: OrderIntent, reason: String) -> Self {
        Self {
            intent,
            result: Err(reason),
        }
    }

    /// Whether the slice succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// One strategy invocation: parameters, ordered outcomes, overall status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRun {
    id: StrategyRunId,
    kind: StrategyKind,
    outcomes: Vec<SliceOutcome>,
    status: RunStatus,
}

impl StrategyRun {
    /// Create a running strategy run.
    #[must_use]
    pub fn new(id: StrategyRunId, kind: StrategyKind) -> Self {
        Self {
            id,
            kind,
            outcomes: Vec::new(),
            status: RunStatus::Running,
        }
    }

    /// Append a slice outcome. Outcomes are never discarded or reordered.
    pub fn record(&mut self, outcome: SliceOutcome) {
        self.outcomes.push(outcome);
    }

    /// Mark the run finished after all slices were attempted.
    pub fn finish(&mut self) {
        self.status = if self.outcomes.iter().all(SliceOutcome::is_success) {
            RunStatus::Completed
        } else {
            RunStatus::PartiallyFailed
        };
    }

    /// Mark the run halted before all slices were attempted.
    pub fn abort(&mut self) {
        self.status = RunStatus::Aborted;
    }

    /// Run id.
    #[must_use]
    pub const fn id(&self) -> StrategyRunId {
        self.id
    }

    /// Strategy kind.
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Ordered slice outcomes recorded so far.
    #[must_use]
    pub fn outcomes(&self) -> &[SliceOutcome] {
        &self.outcomes
    }

    /// Current overall status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Strategy-level errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StrategyError {
    /// Parameter preconditions violated; no slice was attempted.
    #[error("invalid strategy parameters: {0}")]
    InvalidParameters(String),
}

// =============================================================================
// Tests
// =============================================================================
