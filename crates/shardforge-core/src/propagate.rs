//! Top-down quantity propagation.
//!
//! Walks a built plan with an explicit stack, turning the requested output
//! quantity at the root into per-node quantities and craft counts. Ordinary
//! craft nodes divide cleanly: `crafts = ceil(required / effective_output)`
//! and each input subtree is asked for `crafts * fuse_amount`. Cycle nodes
//! need net-production accounting instead -- output that the group produces
//! and immediately re-consumes must not be double-counted -- and their
//! external inputs only become known here, so the propagator re-enters the
//! builder to grow each cycle's fodder subtrees. That re-entry is bounded:
//! cycle membership was decided once up front.

use crate::builder::{self, PlanCtx};
use crate::id::{PlanNodeId, ShardId};
use crate::plan::{CycleStep, PlanArena, PlanNode};

/// Assign quantities and craft counts below `root` for a required output
/// quantity, accumulating into `crafts_total`.
pub fn assign_quantities(
    arena: &mut PlanArena,
    root: PlanNodeId,
    required: f64,
    ctx: &PlanCtx<'_>,
    crafts_total: &mut f64,
) {
    let mut stack: Vec<(PlanNodeId, f64)> = vec![(root, required)];

    while let Some((id, required)) = stack.pop() {
        let Some(node) = arena.get_mut(id) else {
            continue;
        };
        match node {
            PlanNode::Direct { quantity, .. } | PlanNode::Stock { quantity, .. } => {
                *quantity = required;
            }
            PlanNode::Split { quantity, .. } => {
                // Parts carry their own quantities (assigned by the
                // inventory planner); only the aggregate is recorded here.
                *quantity = required;
            }
            PlanNode::Craft {
                recipe,
                inputs,
                quantity,
                crafts,
                ..
            } => {
                let recipe_id = *recipe;
                let children = *inputs;
                *quantity = required;

                let effective = ctx
                    .registry
                    .recipe(recipe_id)
                    .map(|r| ctx.params.effective_output(r.output_quantity, r.bonus_eligible))
                    .unwrap_or(0.0);
                let needed = if effective > 0.0 && required > 0.0 {
                    (required / effective).ceil()
                } else {
                    0.0
                };
                *crafts = needed;
                *crafts_total += needed;

                if let Some(recipe) = ctx.registry.recipe(recipe_id) {
                    for (child, input) in children.into_iter().zip(recipe.inputs) {
                        let fuse = f64::from(ctx.registry.fuse_amount(input));
                        stack.push((child, needed * fuse));
                    }
                }
            }
            PlanNode::Cycle {
                shard,
                steps,
                quantity,
                ..
            } => {
                let shard = *shard;
                let steps = steps.clone();
                *quantity = required;

                let (effective, net) = cycle_production(ctx, shard, &steps);
                let per_run = if net > 0.0 { net } else { effective };
                let expected_crafts = if per_run > 0.0 && required > 0.0 {
                    (required / per_run).ceil()
                } else {
                    0.0
                };
                *crafts_total += expected_crafts;

                // Demand the group pulls from outside itself, per run.
                let external = external_demand(ctx, shard, &steps);

                // Grow and queue a fodder subtree per external input. This
                // re-enters the builder, so the &mut borrow of the cycle
                // node must be dropped first.
                let mut fodder_ids = Vec::with_capacity(external.len());
                for (ext_shard, per_run_amount) in external {
                    let sub = builder::build(arena, ctx, ext_shard);
                    fodder_ids.push(sub);
                    stack.push((sub, per_run_amount * expected_crafts));
                }

                if let Some(PlanNode::Cycle { crafts, fodder, .. }) = arena.get_mut(id) {
                    *crafts = expected_crafts;
                    fodder.extend(fodder_ids);
                }
            }
        }
    }
}

/// Effective output of the step producing `shard`, and the group's net
/// production of `shard` per full traversal (effective output minus what the
/// other steps fuse away again).
pub(crate) fn cycle_production(
    ctx: &PlanCtx<'_>,
    shard: ShardId,
    steps: &[CycleStep],
) -> (f64, f64) {
    let effective = steps
        .iter()
        .find(|s| s.output == shard)
        .and_then(|s| ctx.registry.recipe(s.recipe))
        .map(|r| ctx.params.effective_output(r.output_quantity, r.bonus_eligible))
        .unwrap_or(0.0);

    let fuse = f64::from(ctx.registry.fuse_amount(shard));
    let mut consumed = 0.0;
    for step in steps {
        if step.output == shard {
            continue;
        }
        if let Some(recipe) = ctx.registry.recipe(step.recipe) {
            for input in recipe.inputs {
                if input == shard {
                    consumed += fuse;
                }
            }
        }
    }

    (effective, effective - consumed)
}

/// Per-run demand the group places on shards outside its own component, in
/// first-encountered order.
fn external_demand(ctx: &PlanCtx<'_>, shard: ShardId, steps: &[CycleStep]) -> Vec<(ShardId, f64)> {
    let component = ctx.cycles.component_of(shard);
    let mut demand: Vec<(ShardId, f64)> = Vec::new();

    for step in steps {
        let Some(recipe) = ctx.registry.recipe(step.recipe) else {
            continue;
        };
        for input in recipe.inputs {
            if component.is_some() && ctx.cycles.component_of(input) == component {
                continue;
            }
            let fuse = f64::from(ctx.registry.fuse_amount(input));
            match demand.iter_mut().find(|(s, _)| *s == input) {
                Some((_, amount)) => *amount += fuse,
                None => demand.push((input, fuse)),
            }
        }
    }

    demand
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::relax;
    use crate::cycle::detect_cycles;
    use crate::test_utils::*;

    fn propagated(fx: &Fixture, target: ShardId, required: f64) -> (PlanArena, PlanNodeId, f64) {
        let costs = relax(&fx.registry, &fx.prices, &fx.params);
        let cycles = detect_cycles(&fx.registry, &costs);
        let ctx = PlanCtx {
            registry: &fx.registry,
            params: &fx.params,
            costs: &costs,
            cycles: &cycles,
        };
        let mut arena = PlanArena::with_key();
        let root = builder::build(&mut arena, &ctx, target);
        let mut crafts = 0.0;
        assign_quantities(&mut arena, root, required, &ctx, &mut crafts);
        (arena, root, crafts)
    }

    // -----------------------------------------------------------------------
    // Ordinary nodes
    // -----------------------------------------------------------------------

    #[test]
    fn direct_leaf_takes_required_quantity() {
        let fx = linear_fixture();
        let (arena, root, crafts) = propagated(&fx, fx.x, 7.0);
        assert_eq!(arena[root].quantity(), 7.0);
        assert_eq!(crafts, 0.0);
    }

    #[test]
    fn craft_node_divides_by_effective_output() {
        // Quantity 10 of Z at effective output 1: 10 crafts, X gets
        // 10 * fuse(2) = 20, Y gets 10 * fuse(3) = 30.
        let fx = linear_fixture();
        let (arena, root, crafts) = propagated(&fx, fx.z, 10.0);
        let PlanNode::Craft {
            quantity,
            crafts: node_crafts,
            inputs,
            ..
        } = &arena[root]
        else {
            panic!("expected craft root");
        };
        assert_eq!(*quantity, 10.0);
        assert_eq!(*node_crafts, 10.0);
        assert_eq!(crafts, 10.0);
        assert_eq!(arena[inputs[0]].quantity(), 20.0);
        assert_eq!(arena[inputs[1]].quantity(), 30.0);
    }

    #[test]
    fn crafts_round_up_to_whole_runs() {
        let fx = multi_output_fixture();
        // Recipe yields 3 per craft; 10 required -> 4 crafts.
        let (arena, root, _) = propagated(&fx, fx.z, 10.0);
        let PlanNode::Craft { crafts, .. } = &arena[root] else {
            panic!("expected craft root");
        };
        assert_eq!(*crafts, 4.0);
    }

    #[test]
    fn bonus_multiplier_reduces_crafts() {
        let mut fx = multi_output_fixture();
        fx.params.bonus.double_level = 25; // multiplier 1.5 -> effective 4.5
        make_recipes_bonus_eligible(&mut fx);
        let (arena, root, _) = propagated(&fx, fx.z, 9.0);
        let PlanNode::Craft { crafts, .. } = &arena[root] else {
            panic!("expected craft root");
        };
        assert_eq!(*crafts, 2.0);
    }

    #[test]
    fn chain_propagates_through_intermediate_craft() {
        let fx = chained_fixture();
        // W needs 4: 4 crafts, Z input = 4 * fuse(z)=1 -> 4, X = 4*2=8, Y = 4*3=12.
        let (arena, root, crafts) = propagated(&fx, fx.w, 4.0);
        let PlanNode::Craft { inputs, .. } = &arena[root] else {
            panic!("expected craft root");
        };
        let z_node = inputs[0];
        assert_eq!(arena[z_node].quantity(), 4.0);
        let PlanNode::Craft { inputs: z_inputs, .. } = &arena[z_node] else {
            panic!("expected crafted Z");
        };
        assert_eq!(arena[z_inputs[0]].quantity(), 8.0);
        assert_eq!(arena[z_inputs[1]].quantity(), 12.0);
        // 4 W crafts + 4 Z crafts.
        assert_eq!(crafts, 8.0);
    }

    #[test]
    fn zero_required_means_zero_everywhere() {
        let fx = chained_fixture();
        let (arena, _, crafts) = propagated(&fx, fx.w, 0.0);
        for (_, node) in arena.iter() {
            assert_eq!(node.quantity(), 0.0);
        }
        assert_eq!(crafts, 0.0);
    }

    // -----------------------------------------------------------------------
    // Cycle nodes
    // -----------------------------------------------------------------------

    #[test]
    fn cycle_net_production_accounts_reconsumption() {
        let fx = two_cycle_fixture();
        let costs = relax(&fx.registry, &fx.prices, &fx.params);
        let cycles = detect_cycles(&fx.registry, &costs);
        let ctx = PlanCtx {
            registry: &fx.registry,
            params: &fx.params,
            costs: &costs,
            cycles: &cycles,
        };
        let mut arena = PlanArena::with_key();
        let root = builder::build(&mut arena, &ctx, fx.a);
        let PlanNode::Cycle { steps, .. } = &arena[root] else {
            panic!("expected cycle root");
        };
        // A's step yields 3; B's step fuses 1 A back in: net 2.
        let (effective, net) = cycle_production(&ctx, fx.a, steps);
        assert_eq!(effective, 3.0);
        assert_eq!(net, 2.0);
    }

    #[test]
    fn cycle_crafts_use_net_output() {
        let fx = two_cycle_fixture();
        // Net output of A is 2 per run; 10 required -> 5 runs.
        let (arena, root, crafts) = propagated(&fx, fx.a, 10.0);
        let PlanNode::Cycle {
            crafts: node_crafts,
            quantity,
            ..
        } = &arena[root]
        else {
            panic!("expected cycle root");
        };
        assert_eq!(*quantity, 10.0);
        assert_eq!(*node_crafts, 5.0);
        assert!(crafts >= 5.0);
    }

    #[test]
    fn cycle_grows_fodder_for_external_inputs() {
        let fx = two_cycle_fixture();
        let (arena, root, _) = propagated(&fx, fx.a, 10.0);
        let PlanNode::Cycle { crafts, fodder, .. } = &arena[root] else {
            panic!("expected cycle root");
        };
        // The group consumes ore from outside: one fodder subtree, sized
        // per-run demand (1 fuse per step consuming it) * runs.
        assert_eq!(fodder.len(), 1);
        let fodder_node = &arena[fodder[0]];
        assert_eq!(fodder_node.shard(), fx.ore);
        assert_eq!(fodder_node.quantity(), 2.0 * crafts);
    }

    #[test]
    fn non_self_sustaining_cycle_falls_back_to_effective_output() {
        let fx = mining_cycle_fixture();
        // B's step consumes more A than A's step yields: net <= 0, so runs
        // are sized by gross output instead.
        let (arena, root, _) = propagated(&fx, fx.a, 6.0);
        let PlanNode::Cycle { crafts, .. } = &arena[root] else {
            panic!("expected cycle root");
        };
        // Gross output of A's step is 1 -> 6 runs.
        assert_eq!(*crafts, 6.0);
    }

    #[test]
    fn external_demand_is_deduplicated_per_shard() {
        let fx = two_cycle_fixture();
        let costs = relax(&fx.registry, &fx.prices, &fx.params);
        let cycles = detect_cycles(&fx.registry, &costs);
        let ctx = PlanCtx {
            registry: &fx.registry,
            params: &fx.params,
            costs: &costs,
            cycles: &cycles,
        };
        let mut arena = PlanArena::with_key();
        let root = builder::build(&mut arena, &ctx, fx.a);
        let PlanNode::Cycle { steps, .. } = &arena[root] else {
            panic!("expected cycle root");
        };
        let demand = external_demand(&ctx, fx.a, steps);
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].0, fx.ore);
        assert_eq!(demand[0].1, 2.0);
    }
}
