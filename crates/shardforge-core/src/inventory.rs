//! Inventory-aware planning.
//!
//! A variant of build-and-propagate that prefers consuming on-hand stock
//! over crafting when the diminishing-returns price makes it cheaper.
//! Drawing from an inventory of `inv` units costs
//! `base * 1 / (1 + k * inv)` per unit -- early withdrawals are near-free
//! wins, large stockpiles never make a shard look absurdly cheap.
//!
//! Consuming stock shifts the relative attractiveness of recipes shard by
//! shard, which the context-free relaxation cannot see, so every loop turn
//! re-evaluates all alternative recipes for the current target under
//! inventory-adjusted input costs and crafts in discrete batches sized to
//! the inputs' remaining stock. The inventory map is depleted in place;
//! callers needing the pre-call state must pass a defensive copy.

use crate::builder::PlanCtx;
use crate::cost::recipe_unit_cost_with;
use crate::id::{PlanNodeId, RecipeId, ShardId};
use crate::market::PriceTable;
use crate::plan::{PlanArena, PlanNode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Ignore quantity residues below this when looping on remaining demand.
const QUANTITY_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// InventoryMap
// ---------------------------------------------------------------------------

/// On-hand stock per shard. Mutated in place during planning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryMap {
    stock: HashMap<ShardId, f64>,
}

impl InventoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, shard: ShardId, quantity: f64) {
        self.stock.insert(shard, quantity.max(0.0));
    }

    pub fn available(&self, shard: ShardId) -> f64 {
        self.stock.get(&shard).copied().unwrap_or(0.0)
    }

    /// Take up to `quantity` units. Returns what was actually taken.
    pub fn withdraw(&mut self, shard: ShardId, quantity: f64) -> f64 {
        let Some(held) = self.stock.get_mut(&shard) else {
            return 0.0;
        };
        let taken = held.min(quantity.max(0.0));
        *held -= taken;
        taken
    }
}

impl FromIterator<(ShardId, f64)> for InventoryMap {
    fn from_iter<T: IntoIterator<Item = (ShardId, f64)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (shard, quantity) in iter {
            map.set(shard, quantity);
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Plan `required` units of `target`, drawing down `inventory` as a side
/// effect. Returns the subtree root; quantities are fully assigned.
pub(crate) fn plan_with_inventory(
    arena: &mut PlanArena,
    ctx: &PlanCtx<'_>,
    prices: &PriceTable,
    inventory: &mut InventoryMap,
    target: ShardId,
    required: f64,
    crafts_total: &mut f64,
) -> PlanNodeId {
    let mut visiting = HashSet::new();
    plan_shard(
        arena,
        ctx,
        prices,
        inventory,
        target,
        required,
        crafts_total,
        &mut visiting,
    )
}

#[allow(clippy::too_many_arguments)]
fn plan_shard(
    arena: &mut PlanArena,
    ctx: &PlanCtx<'_>,
    prices: &PriceTable,
    inventory: &mut InventoryMap,
    target: ShardId,
    required: f64,
    crafts_total: &mut f64,
    visiting: &mut HashSet<ShardId>,
) -> PlanNodeId {
    // The greedy recursion has no cycle condensation; a chosen-recipe loop
    // falls back to buying the shard outright.
    if visiting.contains(&target) {
        return arena.insert(PlanNode::Direct {
            shard: target,
            quantity: required,
        });
    }
    visiting.insert(target);

    let mut parts: Vec<PlanNodeId> = Vec::new();
    let mut remaining = required;

    while remaining > QUANTITY_EPSILON {
        let held = inventory.available(target);
        let stock_cost = ctx.costs.cost(target) * ctx.params.stock.factor(target, held);
        let (alt_cost, alt_recipe) = best_alternative(ctx, prices, inventory, target);

        // Step 1: draw from stock while it undercuts the best alternative.
        if held > 0.0 && stock_cost < alt_cost {
            let taken = inventory.withdraw(target, remaining);
            tracing::trace!(shard = target.0, taken, unit_cost = stock_cost, "stock draw");
            parts.push(arena.insert(PlanNode::Stock {
                shard: target,
                quantity: taken,
                unit_cost: stock_cost,
            }));
            remaining -= taken;
            continue;
        }

        // Step 2: no recipe worth running -- buy the residual outright.
        let Some(recipe_id) = alt_recipe else {
            parts.push(arena.insert(PlanNode::Direct {
                shard: target,
                quantity: remaining,
            }));
            remaining = 0.0;
            continue;
        };
        let Some(recipe) = ctx.registry.recipe(recipe_id) else {
            parts.push(arena.insert(PlanNode::Direct {
                shard: target,
                quantity: remaining,
            }));
            remaining = 0.0;
            continue;
        };

        let effective = ctx
            .params
            .effective_output(recipe.output_quantity, recipe.bonus_eligible);
        if effective <= 0.0 {
            parts.push(arena.insert(PlanNode::Direct {
                shard: target,
                quantity: remaining,
            }));
            remaining = 0.0;
            continue;
        }

        // Step 3: batch until an input's discrete stock runs out, capped by
        // the crafts still needed. Re-evaluating after every single craft
        // would be quadratic; once per batch reacts to depletion just as
        // well.
        let crafts_needed = (remaining / effective).ceil();
        let mut batch = crafts_needed;
        for input in recipe.inputs {
            let fuse = f64::from(ctx.registry.fuse_amount(input));
            let held = inventory.available(input);
            if fuse > 0.0 && held >= fuse {
                batch = batch.min((held / fuse).floor());
            }
        }
        let batch = batch.max(1.0);

        // Step 4: recurse into both inputs with the batch's consumption.
        let inputs = recipe.inputs;
        let children = inputs.map(|input| {
            let fuse = f64::from(ctx.registry.fuse_amount(input));
            plan_shard(
                arena,
                ctx,
                prices,
                inventory,
                input,
                batch * fuse,
                crafts_total,
                visiting,
            )
        });

        *crafts_total += batch;
        let produced = batch * effective;
        parts.push(arena.insert(PlanNode::Craft {
            shard: target,
            recipe: recipe_id,
            inputs: children,
            quantity: remaining.min(produced),
            crafts: batch,
            in_cycle: false,
        }));
        remaining -= produced;
    }

    visiting.remove(&target);

    match parts.len() {
        0 => arena.insert(PlanNode::Direct {
            shard: target,
            quantity: 0.0,
        }),
        1 => parts[0],
        _ => arena.insert(PlanNode::Split {
            shard: target,
            quantity: required,
            parts,
        }),
    }
}

/// The cheapest way to obtain one unit of `target` other than drawing it
/// from stock, under inventory-adjusted input costs: `None` means direct
/// acquisition.
fn best_alternative(
    ctx: &PlanCtx<'_>,
    prices: &PriceTable,
    inventory: &InventoryMap,
    target: ShardId,
) -> (f64, Option<RecipeId>) {
    let adjusted = |shard: ShardId| {
        ctx.costs.cost(shard) * ctx.params.stock.factor(shard, inventory.available(shard))
    };

    let mut best = prices.direct_cost(target, ctx.params);
    let mut best_recipe = None;
    for &recipe_id in ctx.registry.recipes_for(target) {
        let Some(recipe) = ctx.registry.recipe(recipe_id) else {
            continue;
        };
        let unit = recipe_unit_cost_with(ctx.registry, ctx.params, recipe, adjusted);
        if unit < best {
            best = unit;
            best_recipe = Some(recipe_id);
        }
    }
    (best, best_recipe)
}
