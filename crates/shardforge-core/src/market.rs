//! Direct-acquisition pricing.
//!
//! The live market feed is an external collaborator; this module only models
//! its output: a [`PriceSnapshot`] of per-market-id rates, resolved against
//! the registry into a [`PriceTable`] of per-shard unit costs. A missing
//! price means the shard cannot be bought directly and costs infinity.

use crate::id::ShardId;
use crate::params::{CalculationParams, CostBasis};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One market listing from the external price feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRate {
    /// Gold per unit.
    pub gold: f64,
    /// Seconds to obtain one unit.
    pub seconds: f64,
}

/// A snapshot of the external market feed: market id -> rates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub rates: HashMap<String, MarketRate>,
}

/// Per-shard direct unit costs for one cost basis.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    rates: HashMap<ShardId, f64>,
}

impl PriceTable {
    /// Resolve a snapshot against the registry's market ids for the given
    /// basis. Shards without a market id or without a listing get no entry.
    pub fn from_snapshot(snapshot: &PriceSnapshot, registry: &Registry, basis: CostBasis) -> Self {
        let mut rates = HashMap::new();
        for shard in registry.shard_ids() {
            let Some(def) = registry.shard(shard) else {
                continue;
            };
            let Some(market_id) = def.market_id.as_deref() else {
                continue;
            };
            if let Some(rate) = snapshot.rates.get(market_id) {
                let value = match basis {
                    CostBasis::Currency => rate.gold,
                    CostBasis::Time => rate.seconds,
                };
                rates.insert(shard, value);
            }
        }
        Self { rates }
    }

    /// Build a table directly from per-shard rates. Test and tooling entry.
    pub fn from_rates(rates: HashMap<ShardId, f64>) -> Self {
        Self { rates }
    }

    /// Set or replace one shard's rate.
    pub fn set(&mut self, shard: ShardId, rate: f64) {
        self.rates.insert(shard, rate);
    }

    /// The raw rate for a shard, if listed.
    pub fn rate(&self, shard: ShardId) -> Option<f64> {
        self.rates.get(&shard).copied()
    }

    /// The direct unit cost in effect for a calculation: caller override
    /// first, then the snapshot rate, then infinity (unavailable).
    pub fn direct_cost(&self, shard: ShardId, params: &CalculationParams) -> f64 {
        params
            .rate_overrides
            .get(&shard)
            .copied()
            .or_else(|| self.rate(shard))
            .unwrap_or(f64::INFINITY)
    }
}

/// Caller-owned cache of a resolved price table. The market service refreshes
/// roughly once a minute; holders should re-resolve once `is_stale` reports
/// true rather than keeping a hidden global.
#[derive(Debug)]
pub struct PriceCache {
    pub table: PriceTable,
    fetched_at: Instant,
    ttl: Duration,
}

/// How long a resolved price table stays fresh.
pub const PRICE_TTL: Duration = Duration::from_secs(60);

impl PriceCache {
    pub fn new(table: PriceTable) -> Self {
        Self::with_ttl(table, PRICE_TTL)
    }

    pub fn with_ttl(table: PriceTable, ttl: Duration) -> Self {
        Self {
            table,
            fetched_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() >= self.ttl
    }

    /// Replace the table and reset the clock.
    pub fn refresh(&mut self, table: PriceTable) {
        self.table = table;
        self.fetched_at = Instant::now();
    }
}
