use crate::id::ShardId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Cost basis
// ---------------------------------------------------------------------------

/// What unit costs are measured in. The price table must have been built for
/// the same basis; the engine itself only ever sees one number per shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostBasis {
    /// Gold cost per unit.
    #[default]
    Currency,
    /// Seconds to obtain per unit.
    Time,
}

// ---------------------------------------------------------------------------
// Yield bonus
// ---------------------------------------------------------------------------

/// Player upgrade levels controlling the yield bonus on bonus-eligible
/// recipes. Each double level adds a 2% chance of doubled output, each
/// triple level a 1% chance of tripled output; the optimizer consumes only
/// the expectation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusConfig {
    pub double_level: u32,
    pub triple_level: u32,
}

impl BonusConfig {
    /// Expected output multiplier: `1 + P(double) + 2 * P(triple)`.
    pub fn multiplier(&self) -> f64 {
        1.0 + 0.02 * f64::from(self.double_level) + 2.0 * 0.01 * f64::from(self.triple_level)
    }
}

// ---------------------------------------------------------------------------
// Inventory discount
// ---------------------------------------------------------------------------

/// Default diminishing-returns coefficient for inventory draws.
pub const DEFAULT_STOCK_K: f64 = 0.05;

/// Diminishing-returns pricing for on-hand stock. Drawing from an inventory
/// of `inv` units costs `base * 1 / (1 + k * inv)` per unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockDiscount {
    /// Coefficient applied to shards without an override.
    pub k: f64,
    /// Per-shard overrides of `k`.
    pub overrides: HashMap<ShardId, f64>,
}

impl Default for StockDiscount {
    fn default() -> Self {
        Self {
            k: DEFAULT_STOCK_K,
            overrides: HashMap::new(),
        }
    }
}

impl StockDiscount {
    /// The coefficient in effect for a shard.
    pub fn k_for(&self, shard: ShardId) -> f64 {
        self.overrides.get(&shard).copied().unwrap_or(self.k)
    }

    /// Discount factor for a shard with `inv` units on hand.
    pub fn factor(&self, shard: ShardId, inv: f64) -> f64 {
        1.0 / (1.0 + self.k_for(shard) * inv.max(0.0))
    }
}

// ---------------------------------------------------------------------------
// CalculationParams
// ---------------------------------------------------------------------------

/// The levels and toggles that shape one calculation. Recomputed choice maps
/// are only valid for the parameter set they were relaxed under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalculationParams {
    /// Whether costs are gold or seconds.
    pub basis: CostBasis,
    /// Yield bonus levels.
    pub bonus: BonusConfig,
    /// Fixed cost added per craft, in the active basis.
    pub craft_penalty: f64,
    /// Per-shard direct-cost overrides. Take precedence over the price table.
    pub rate_overrides: HashMap<ShardId, f64>,
    /// Inventory diminishing-returns configuration.
    pub stock: StockDiscount,
}

impl CalculationParams {
    /// Effective output quantity of a recipe under these params.
    pub fn effective_output(&self, base: u32, bonus_eligible: bool) -> f64 {
        let base = f64::from(base);
        if bonus_eligible {
            base * self.bonus.multiplier()
        } else {
            base
        }
    }
}
