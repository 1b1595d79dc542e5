//! Pipeline orchestration.
//!
//! The full calculation runs four phases over immutable inputs:
//! relaxation -> cycle detection -> tree building -> quantity propagation,
//! then aggregates the plan into a [`CalculationResult`]. Everything here is
//! a stateless function; callers own every piece of state (registry, price
//! table, params, optional inventory) and thread it through explicitly.
//!
//! Cancellation is cooperative and checked between phases only. Batch
//! requests share the relaxation and cycle-detection phases read-only
//! across per-target tree tasks; with the `parallel` feature those tasks
//! run on a rayon iterator. Inventory-aware batches stay sequential because
//! they mutate a shared inventory map.

use crate::builder::{self, PlanCtx};
use crate::cancel::CancelToken;
use crate::cost::{self, CostTable};
use crate::cycle::{self, CycleSet};
use crate::id::{PlanNodeId, ShardId};
use crate::inventory::{self, InventoryMap};
use crate::market::PriceTable;
use crate::params::CalculationParams;
use crate::plan::{Plan, PlanArena, PlanNode};
use crate::propagate;
use crate::registry::Registry;
use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Calculation outcomes that are not results. Cancellation is deliberately
/// its own variant so callers can tell "cancelled" from "failed".
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("calculation cancelled")]
    Cancelled,
}

fn checkpoint(cancel: &CancelToken) -> Result<(), SolveError> {
    if cancel.is_cancelled() {
        Err(SolveError::Cancelled)
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The aggregated outcome of one calculation.
#[derive(Debug, Clone)]
pub struct CalculationResult {
    /// Minimum achievable per-unit cost of the target.
    pub unit_cost: f64,
    /// Total cost of the plan: raw acquisitions, stock draws, and craft
    /// penalties.
    pub total_cost: f64,
    /// Units of the target the plan actually yields (crafts round up, so
    /// this can exceed the request).
    pub total_produced: f64,
    /// Total recipe applications across the plan.
    pub total_crafts: f64,
    /// Raw units acquired per shard (market buys and stock draws).
    pub per_material: HashMap<ShardId, f64>,
    /// The plan tree realizing the optimum.
    pub plan: Plan,
}

// ---------------------------------------------------------------------------
// Single-target solve
// ---------------------------------------------------------------------------

/// Compute the cheapest plan for `quantity` units of `target`.
///
/// Unknown targets yield a well-formed zero result (a direct leaf of
/// quantity 0) rather than an error; unreachable targets yield infinite
/// costs without failing.
pub fn solve(
    target: ShardId,
    quantity: f64,
    registry: &Registry,
    prices: &PriceTable,
    params: &CalculationParams,
    cancel: &CancelToken,
) -> Result<CalculationResult, SolveError> {
    if registry.shard(target).is_none() {
        return Ok(zero_result(target));
    }

    let costs = cost::relax(registry, prices, params);
    checkpoint(cancel)?;
    let cycles = cycle::detect_cycles(registry, &costs);
    checkpoint(cancel)?;

    let result = solve_target(target, quantity, registry, prices, params, &costs, &cycles, cancel)?;
    Ok(result)
}

/// Build, propagate, and aggregate one target against precomputed phases.
#[allow(clippy::too_many_arguments)]
fn solve_target(
    target: ShardId,
    quantity: f64,
    registry: &Registry,
    prices: &PriceTable,
    params: &CalculationParams,
    costs: &CostTable,
    cycles: &CycleSet,
    cancel: &CancelToken,
) -> Result<CalculationResult, SolveError> {
    let ctx = PlanCtx {
        registry,
        params,
        costs,
        cycles,
    };

    let mut arena = PlanArena::with_key();
    let root = builder::build(&mut arena, &ctx, target);
    checkpoint(cancel)?;

    let mut total_crafts = 0.0;
    propagate::assign_quantities(&mut arena, root, quantity, &ctx, &mut total_crafts);
    checkpoint(cancel)?;

    tracing::debug!(
        shard = target.0,
        quantity,
        nodes = arena.len(),
        crafts = total_crafts,
        "plan assembled"
    );

    Ok(aggregate(
        arena,
        root,
        &ctx,
        prices,
        costs.cost(target),
        total_crafts,
    ))
}

// ---------------------------------------------------------------------------
// Batch solve
// ---------------------------------------------------------------------------

/// Compute plans for many targets against one parameter set. Relaxation and
/// cycle detection run once and are shared read-only; per-target work is
/// independent (and parallel under the `parallel` feature).
pub fn solve_batch(
    targets: &[ShardId],
    quantity: f64,
    registry: &Registry,
    prices: &PriceTable,
    params: &CalculationParams,
    cancel: &CancelToken,
) -> Result<Vec<CalculationResult>, SolveError> {
    let costs = cost::relax(registry, prices, params);
    checkpoint(cancel)?;
    let cycles = cycle::detect_cycles(registry, &costs);
    checkpoint(cancel)?;

    let per_target = |&target: &ShardId| -> Result<CalculationResult, SolveError> {
        checkpoint(cancel)?;
        if registry.shard(target).is_none() {
            return Ok(zero_result(target));
        }
        solve_target(target, quantity, registry, prices, params, &costs, &cycles, cancel)
    };

    #[cfg(feature = "parallel")]
    {
        targets.par_iter().map(per_target).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        targets.iter().map(per_target).collect()
    }
}

// ---------------------------------------------------------------------------
// Inventory-aware solve
// ---------------------------------------------------------------------------

/// Compute a plan that prefers consuming on-hand inventory over crafting
/// when the diminishing-returns price is cheaper. `inventory` is depleted in
/// place; pass a copy to preserve the pre-call state.
pub fn solve_with_inventory(
    target: ShardId,
    quantity: f64,
    registry: &Registry,
    prices: &PriceTable,
    params: &CalculationParams,
    stock: &mut InventoryMap,
    cancel: &CancelToken,
) -> Result<CalculationResult, SolveError> {
    if registry.shard(target).is_none() {
        return Ok(zero_result(target));
    }

    let costs = cost::relax(registry, prices, params);
    checkpoint(cancel)?;

    // The greedy planner carries its own loop-breaking; condensation stays
    // off so stock can be weighed shard by shard.
    let cycles = CycleSet::empty();
    let ctx = PlanCtx {
        registry,
        params,
        costs: &costs,
        cycles: &cycles,
    };

    let mut arena = PlanArena::with_key();
    let mut total_crafts = 0.0;
    let root = inventory::plan_with_inventory(
        &mut arena,
        &ctx,
        prices,
        stock,
        target,
        quantity,
        &mut total_crafts,
    );
    checkpoint(cancel)?;

    Ok(aggregate(
        arena,
        root,
        &ctx,
        prices,
        costs.cost(target),
        total_crafts,
    ))
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// A zero-valued result for an unknown target: callers can render "nothing"
/// without special-casing.
fn zero_result(target: ShardId) -> CalculationResult {
    let mut arena = PlanArena::with_key();
    let root = arena.insert(PlanNode::Direct {
        shard: target,
        quantity: 0.0,
    });
    CalculationResult {
        unit_cost: 0.0,
        total_cost: 0.0,
        total_produced: 0.0,
        total_crafts: 0.0,
        per_material: HashMap::new(),
        plan: Plan::new(arena, root),
    }
}

/// Walk the finished plan and fold it into totals. Cycle reference subtrees
/// are display-only and skipped; everything they would contribute is
/// accounted by the cycle's fodder.
fn aggregate(
    arena: PlanArena,
    root: PlanNodeId,
    ctx: &PlanCtx<'_>,
    prices: &PriceTable,
    unit_cost: f64,
    total_crafts: f64,
) -> CalculationResult {
    let mut total_cost = 0.0;
    let mut per_material: HashMap<ShardId, f64> = HashMap::new();

    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        match &arena[id] {
            PlanNode::Direct { shard, quantity } => {
                if *quantity > 0.0 {
                    *per_material.entry(*shard).or_insert(0.0) += quantity;
                    total_cost += quantity * prices.direct_cost(*shard, ctx.params);
                }
            }
            PlanNode::Stock {
                shard,
                quantity,
                unit_cost,
            } => {
                if *quantity > 0.0 {
                    *per_material.entry(*shard).or_insert(0.0) += quantity;
                    total_cost += quantity * unit_cost;
                }
            }
            PlanNode::Craft { crafts, inputs, .. } => {
                total_cost += crafts * ctx.params.craft_penalty;
                stack.extend_from_slice(inputs);
            }
            PlanNode::Cycle { crafts, fodder, .. } => {
                total_cost += crafts * ctx.params.craft_penalty;
                stack.extend_from_slice(fodder);
            }
            PlanNode::Split { parts, .. } => {
                stack.extend_from_slice(parts);
            }
        }
    }

    let total_produced = produced_quantity(&arena, root, ctx);

    CalculationResult {
        unit_cost,
        total_cost,
        total_produced,
        total_crafts,
        per_material,
        plan: Plan::new(arena, root),
    }
}

/// Units of its shard a subtree actually yields once crafts round up.
fn produced_quantity(arena: &PlanArena, id: PlanNodeId, ctx: &PlanCtx<'_>) -> f64 {
    match &arena[id] {
        PlanNode::Direct { quantity, .. } | PlanNode::Stock { quantity, .. } => *quantity,
        PlanNode::Craft { recipe, crafts, .. } => {
            let effective = ctx
                .registry
                .recipe(*recipe)
                .map(|r| ctx.params.effective_output(r.output_quantity, r.bonus_eligible))
                .unwrap_or(0.0);
            crafts * effective
        }
        PlanNode::Cycle {
            shard,
            steps,
            crafts,
            ..
        } => {
            let (effective, net) = propagate::cycle_production(ctx, *shard, steps);
            let per_run = if net > 0.0 { net } else { effective };
            crafts * per_run
        }
        PlanNode::Split { parts, .. } => parts
            .iter()
            .map(|&part| produced_quantity(arena, part, ctx))
            .sum(),
    }
}
