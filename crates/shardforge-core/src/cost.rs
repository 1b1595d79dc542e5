//! Cost relaxation over the recipe hypergraph.
//!
//! Every recipe is a two-input hyperedge; the minimum achievable unit cost
//! per shard is the fixpoint of a Bellman-Ford/SPFA-style worklist
//! relaxation. Costs start at each shard's direct cost (infinity when it
//! cannot be bought) and only ever decrease, which bounds the iteration.

use crate::id::{RecipeId, ShardId};
use crate::market::PriceTable;
use crate::params::CalculationParams;
use crate::registry::{RecipeDef, Registry};
use std::collections::VecDeque;

/// Relaxation tolerance. An update must beat the incumbent cost by more than
/// this to count, otherwise floating-point noise in near-tied recipes would
/// keep the worklist oscillating. Tunable, not a stability contract.
pub const COST_EPSILON: f64 = 1e-10;

// ---------------------------------------------------------------------------
// CostTable
// ---------------------------------------------------------------------------

/// Output of the relaxation: per-shard minimum unit cost and the recipe
/// realizing it (`None` means acquire directly).
#[derive(Debug, Clone)]
pub struct CostTable {
    min_cost: Vec<f64>,
    choice: Vec<Option<RecipeId>>,
}

impl CostTable {
    /// Minimum achievable unit cost. Infinity for unreachable or unknown
    /// shards.
    pub fn cost(&self, shard: ShardId) -> f64 {
        self.min_cost
            .get(shard.0 as usize)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    /// The chosen recipe, or `None` when direct acquisition is cheapest.
    pub fn choice(&self, shard: ShardId) -> Option<RecipeId> {
        self.choice.get(shard.0 as usize).copied().flatten()
    }

    /// Shards that currently resolve to a recipe, in id order.
    pub fn crafted_shards(&self) -> impl Iterator<Item = ShardId> + '_ {
        self.choice
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .map(|(i, _)| ShardId(i as u32))
    }
}

// ---------------------------------------------------------------------------
// Recipe cost
// ---------------------------------------------------------------------------

/// Per-unit cost of producing via `recipe`, with input costs supplied by the
/// caller. Infinity when an input is unknown (malformed recipes are skipped,
/// not fatal) or unobtainable.
pub(crate) fn recipe_unit_cost_with<F>(
    registry: &Registry,
    params: &CalculationParams,
    recipe: &RecipeDef,
    input_cost: F,
) -> f64
where
    F: Fn(ShardId) -> f64,
{
    let mut craft_cost = params.craft_penalty;
    for input in recipe.inputs {
        let Some(def) = registry.shard(input) else {
            return f64::INFINITY;
        };
        craft_cost += input_cost(input) * f64::from(def.fuse_amount);
    }
    let effective = params.effective_output(recipe.output_quantity, recipe.bonus_eligible);
    if effective <= 0.0 {
        return f64::INFINITY;
    }
    craft_cost / effective
}

// ---------------------------------------------------------------------------
// Relaxation
// ---------------------------------------------------------------------------

/// Compute minimum unit costs and recipe choices for every shard.
///
/// Worklist discipline: seed a FIFO with all shards; on pop, rescan the
/// shard's producing recipes against current input costs; on a strict
/// improvement (beyond [`COST_EPSILON`]) store the new cost/choice and
/// re-enqueue dependents not already queued. Equal-cost alternatives keep
/// the incumbent choice.
pub fn relax(registry: &Registry, prices: &PriceTable, params: &CalculationParams) -> CostTable {
    let n = registry.shard_count();
    let mut min_cost: Vec<f64> = Vec::with_capacity(n);
    let mut choice: Vec<Option<RecipeId>> = vec![None; n];

    for shard in registry.shard_ids() {
        min_cost.push(prices.direct_cost(shard, params));
    }

    let mut queue: VecDeque<ShardId> = registry.shard_ids().collect();
    let mut in_queue = vec![true; n];
    let mut settled_rounds = 0u64;

    while let Some(shard) = queue.pop_front() {
        in_queue[shard.0 as usize] = false;
        settled_rounds += 1;

        // Direct acquisition is the baseline; recipes must strictly beat it.
        let mut best = prices.direct_cost(shard, params);
        let mut best_choice = None;
        for &recipe_id in registry.recipes_for(shard) {
            let Some(recipe) = registry.recipe(recipe_id) else {
                continue;
            };
            let unit = recipe_unit_cost_with(registry, params, recipe, |input| {
                min_cost[input.0 as usize]
            });
            if unit < best - COST_EPSILON {
                best = unit;
                best_choice = Some(recipe_id);
            }
        }

        let idx = shard.0 as usize;
        if best < min_cost[idx] - COST_EPSILON {
            min_cost[idx] = best;
            choice[idx] = best_choice;
            for &dependent in registry.dependents_of(shard) {
                let didx = dependent.0 as usize;
                if !in_queue[didx] {
                    in_queue[didx] = true;
                    queue.push_back(dependent);
                }
            }
        }
    }

    tracing::debug!(
        shards = n,
        rounds = settled_rounds,
        "cost relaxation settled"
    );

    CostTable { min_cost, choice }
}
