//! Recipe tree construction.
//!
//! Converts the per-shard choice map (plus detected cycles) into a concrete
//! plan rooted at a target shard. Construction is an explicit work-stack
//! traversal -- visit frames expand shards, assemble frames pop finished
//! child subtrees off an operand stack -- so arbitrarily deep plans never
//! touch the call stack.
//!
//! Cycles cannot be unrolled finitely (a cyclic fusion chain could run
//! forever), so a shard belonging to a detected SCC condenses into a single
//! [`PlanNode::Cycle`]: the group's steps in walk order, plus a
//! representative reference subtree built from the group's cheapest member
//! with condensation suppressed. Quantities stay zero here; the propagator
//! fills them and grows the cycle's fodder subtrees.

use crate::cost::CostTable;
use crate::cycle::CycleSet;
use crate::id::{PlanNodeId, RecipeId, ShardId};
use crate::params::CalculationParams;
use crate::plan::{CycleStep, PlanArena, PlanNode};
use crate::registry::Registry;
use std::collections::HashSet;

/// Everything the builder and propagator read. Shared immutably; the arena
/// is the only thing they write.
#[derive(Clone, Copy)]
pub struct PlanCtx<'a> {
    pub registry: &'a Registry,
    pub params: &'a CalculationParams,
    pub costs: &'a CostTable,
    pub cycles: &'a CycleSet,
}

enum Frame {
    Visit(ShardId),
    Assemble {
        shard: ShardId,
        recipe: RecipeId,
        in_cycle: bool,
    },
}

/// Build a quantity-unassigned plan for `target` into `arena`. Returns the
/// subtree root.
pub fn build(arena: &mut PlanArena, ctx: &PlanCtx<'_>, target: ShardId) -> PlanNodeId {
    let mut frames = vec![Frame::Visit(target)];
    // Finished subtree roots, popped by assemble frames.
    let mut operands: Vec<PlanNodeId> = Vec::new();

    while let Some(frame) = frames.pop() {
        match frame {
            Frame::Visit(shard) => {
                if ctx.cycles.contains(shard) {
                    let node = build_cycle_node(arena, ctx, shard);
                    operands.push(node);
                } else if let Some(recipe_id) = chosen_recipe(ctx, shard) {
                    let inputs = recipe_inputs(ctx, recipe_id);
                    frames.push(Frame::Assemble {
                        shard,
                        recipe: recipe_id,
                        in_cycle: false,
                    });
                    frames.push(Frame::Visit(inputs[1]));
                    frames.push(Frame::Visit(inputs[0]));
                } else {
                    operands.push(arena.insert(PlanNode::Direct {
                        shard,
                        quantity: 0.0,
                    }));
                }
            }
            Frame::Assemble {
                shard,
                recipe,
                in_cycle,
            } => {
                let right = operands.pop().unwrap_or_default();
                let left = operands.pop().unwrap_or_default();
                operands.push(arena.insert(PlanNode::Craft {
                    shard,
                    recipe,
                    inputs: [left, right],
                    quantity: 0.0,
                    crafts: 0.0,
                    in_cycle,
                }));
            }
        }
    }

    operands.pop().unwrap_or_else(|| {
        arena.insert(PlanNode::Direct {
            shard: target,
            quantity: 0.0,
        })
    })
}

/// The chosen recipe for a shard, resolved against the registry. Choices
/// pointing at recipes the registry no longer knows fall back to direct
/// acquisition.
fn chosen_recipe(ctx: &PlanCtx<'_>, shard: ShardId) -> Option<RecipeId> {
    let recipe_id = ctx.costs.choice(shard)?;
    ctx.registry.recipe(recipe_id)?;
    Some(recipe_id)
}

fn recipe_inputs(ctx: &PlanCtx<'_>, recipe: RecipeId) -> [ShardId; 2] {
    ctx.registry
        .recipe(recipe)
        .map(|r| r.inputs)
        .unwrap_or([ShardId(u32::MAX), ShardId(u32::MAX)])
}

// ---------------------------------------------------------------------------
// Cycle condensation
// ---------------------------------------------------------------------------

/// Condense the SCC containing `shard` into a cycle node.
///
/// The group's cheapest member (ties to the lowest id) is the pivot. The
/// step list walks the choice map from the pivot through in-group inputs;
/// members unreachable along chosen edges are appended in id order. The
/// reference subtree is one representative traversal built from the pivot
/// with condensation suppressed and quantity-assigned for a single fuse's
/// worth of the pivot.
fn build_cycle_node(arena: &mut PlanArena, ctx: &PlanCtx<'_>, shard: ShardId) -> PlanNodeId {
    let component = match ctx.cycles.component_of(shard) {
        Some(c) => c,
        None => {
            return arena.insert(PlanNode::Direct {
                shard,
                quantity: 0.0,
            });
        }
    };
    let members = ctx.cycles.members(component);

    // Cheapest member wins; strict comparison keeps the lowest id on ties
    // (members are sorted ascending).
    let mut pivot = members.first().copied().unwrap_or(shard);
    for &member in members.iter().skip(1) {
        if ctx.costs.cost(member) < ctx.costs.cost(pivot) {
            pivot = member;
        }
    }

    let steps = walk_steps(ctx, pivot, members);

    let reference = build_reference(arena, ctx, pivot);
    let pivot_fuse = f64::from(ctx.registry.fuse_amount(pivot));
    let mut scratch_crafts = 0.0;
    crate::propagate::assign_quantities(arena, reference, pivot_fuse, ctx, &mut scratch_crafts);

    let multiplier = ctx
        .costs
        .choice(shard)
        .and_then(|r| ctx.registry.recipe(r))
        .map(|r| {
            if r.bonus_eligible {
                ctx.params.bonus.multiplier()
            } else {
                1.0
            }
        })
        .unwrap_or(1.0);

    arena.insert(PlanNode::Cycle {
        shard,
        steps,
        multiplier,
        quantity: 0.0,
        crafts: 0.0,
        reference,
        fodder: Vec::new(),
    })
}

/// Order the group's `{output, recipe}` steps by walking chosen in-group
/// inputs from the pivot.
fn walk_steps(ctx: &PlanCtx<'_>, pivot: ShardId, members: &[ShardId]) -> Vec<CycleStep> {
    let mut steps = Vec::with_capacity(members.len());
    let mut seen: HashSet<ShardId> = HashSet::with_capacity(members.len());
    let mut current = Some(pivot);

    while steps.len() < members.len() {
        let shard = match current.take() {
            Some(s) => s,
            // Walk stalled (chosen edges left the unvisited set); resume at
            // the lowest-id member not yet stepped.
            None => match members.iter().copied().find(|m| !seen.contains(m)) {
                Some(s) => s,
                None => break,
            },
        };
        if !seen.insert(shard) {
            continue;
        }
        let Some(recipe_id) = ctx.costs.choice(shard) else {
            continue;
        };
        steps.push(CycleStep {
            output: shard,
            recipe: recipe_id,
        });
        if let Some(recipe) = ctx.registry.recipe(recipe_id) {
            current = recipe
                .inputs
                .iter()
                .copied()
                .find(|i| members.contains(i) && !seen.contains(i));
        }
    }

    steps
}

/// Build the pivot's representative subtree with cycle condensation
/// suppressed: every chosen shard becomes an ordinary craft node (flagged
/// `in_cycle` when it belongs to a detected group) and an input that loops
/// back to a shard still open on the current path becomes a direct leaf for
/// the loop-back stream.
fn build_reference(arena: &mut PlanArena, ctx: &PlanCtx<'_>, pivot: ShardId) -> PlanNodeId {
    let mut frames = vec![Frame::Visit(pivot)];
    let mut operands: Vec<PlanNodeId> = Vec::new();
    let mut open: HashSet<ShardId> = HashSet::new();

    while let Some(frame) = frames.pop() {
        match frame {
            Frame::Visit(shard) => {
                if open.contains(&shard) {
                    operands.push(arena.insert(PlanNode::Direct {
                        shard,
                        quantity: 0.0,
                    }));
                } else if let Some(recipe_id) = chosen_recipe(ctx, shard) {
                    open.insert(shard);
                    let inputs = recipe_inputs(ctx, recipe_id);
                    frames.push(Frame::Assemble {
                        shard,
                        recipe: recipe_id,
                        in_cycle: ctx.cycles.contains(shard),
                    });
                    frames.push(Frame::Visit(inputs[1]));
                    frames.push(Frame::Visit(inputs[0]));
                } else {
                    operands.push(arena.insert(PlanNode::Direct {
                        shard,
                        quantity: 0.0,
                    }));
                }
            }
            Frame::Assemble {
                shard,
                recipe,
                in_cycle,
            } => {
                open.remove(&shard);
                let right = operands.pop().unwrap_or_default();
                let left = operands.pop().unwrap_or_default();
                operands.push(arena.insert(PlanNode::Craft {
                    shard,
                    recipe,
                    inputs: [left, right],
                    quantity: 0.0,
                    crafts: 0.0,
                    in_cycle,
                }));
            }
        }
    }

    operands.pop().unwrap_or_else(|| {
        arena.insert(PlanNode::Direct {
            shard: pivot,
            quantity: 0.0,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::relax;
    use crate::cycle::detect_cycles;
    use crate::test_utils::*;

    fn build_for(fx: &Fixture, target: ShardId) -> (PlanArena, PlanNodeId) {
        let costs = relax(&fx.registry, &fx.prices, &fx.params);
        let cycles = detect_cycles(&fx.registry, &costs);
        let ctx = PlanCtx {
            registry: &fx.registry,
            params: &fx.params,
            costs: &costs,
            cycles: &cycles,
        };
        let mut arena = PlanArena::with_key();
        let root = build(&mut arena, &ctx, target);
        (arena, root)
    }

    // -----------------------------------------------------------------------
    // Acyclic shapes
    // -----------------------------------------------------------------------

    #[test]
    fn direct_leaf_for_unchosen_shard() {
        let fx = linear_fixture();
        let (arena, root) = build_for(&fx, fx.x);
        assert!(matches!(
            arena[root],
            PlanNode::Direct { shard, quantity } if shard == fx.x && quantity == 0.0
        ));
    }

    #[test]
    fn craft_node_wraps_both_inputs() {
        let fx = linear_fixture();
        let (arena, root) = build_for(&fx, fx.z);
        let PlanNode::Craft {
            shard,
            inputs,
            in_cycle,
            ..
        } = &arena[root]
        else {
            panic!("expected craft root, got {:?}", arena[root]);
        };
        assert_eq!(*shard, fx.z);
        assert!(!in_cycle);
        assert_eq!(arena[inputs[0]].shard(), fx.x);
        assert_eq!(arena[inputs[1]].shard(), fx.y);
    }

    #[test]
    fn nested_chain_builds_deep_tree() {
        let fx = chained_fixture();
        let (arena, root) = build_for(&fx, fx.w);
        let PlanNode::Craft { inputs, .. } = &arena[root] else {
            panic!("expected craft root");
        };
        // W's first input is crafted Z, itself a craft node.
        assert!(matches!(arena[inputs[0]], PlanNode::Craft { .. }));
        // 5 nodes: W, Z, X, Y, filler.
        assert_eq!(arena.len(), 5);
    }

    #[test]
    fn quantities_start_at_zero() {
        let fx = chained_fixture();
        let (arena, _) = build_for(&fx, fx.w);
        for (_, node) in arena.iter() {
            assert_eq!(node.quantity(), 0.0);
        }
    }

    // -----------------------------------------------------------------------
    // Cycle condensation
    // -----------------------------------------------------------------------

    #[test]
    fn cycle_member_condenses_into_cycle_node() {
        let fx = two_cycle_fixture();
        let (arena, root) = build_for(&fx, fx.a);
        let PlanNode::Cycle { shard, steps, .. } = &arena[root] else {
            panic!("expected cycle root, got {:?}", arena[root]);
        };
        assert_eq!(*shard, fx.a);
        assert_eq!(steps.len(), 2);
        let outputs: Vec<ShardId> = steps.iter().map(|s| s.output).collect();
        assert!(outputs.contains(&fx.a));
        assert!(outputs.contains(&fx.b));
    }

    #[test]
    fn cycle_steps_walk_from_pivot() {
        let fx = two_cycle_fixture();
        let costs = relax(&fx.registry, &fx.prices, &fx.params);
        let pivot = if costs.cost(fx.a) <= costs.cost(fx.b) {
            fx.a
        } else {
            fx.b
        };
        let (arena, root) = build_for(&fx, fx.a);
        let PlanNode::Cycle { steps, .. } = &arena[root] else {
            panic!("expected cycle root");
        };
        assert_eq!(steps[0].output, pivot);
    }

    #[test]
    fn reference_subtree_is_quantity_assigned() {
        let fx = two_cycle_fixture();
        let (arena, root) = build_for(&fx, fx.a);
        let PlanNode::Cycle { reference, .. } = &arena[root] else {
            panic!("expected cycle root");
        };
        // The reference traversal was sized for one fuse of the pivot.
        assert!(arena[*reference].quantity() > 0.0);
    }

    #[test]
    fn reference_subtree_breaks_loop_backs() {
        // Inside the reference build, the A -> B -> A loop must terminate in
        // a direct leaf rather than recursing forever.
        let fx = two_cycle_fixture();
        let (arena, root) = build_for(&fx, fx.a);
        let PlanNode::Cycle { reference, .. } = &arena[root] else {
            panic!("expected cycle root");
        };
        // Walk the reference subtree; every in-cycle craft node must be
        // flagged, and it must be finite (arena is, by construction).
        let mut stack = vec![*reference];
        let mut saw_flagged = false;
        while let Some(id) = stack.pop() {
            match &arena[id] {
                PlanNode::Craft {
                    inputs, in_cycle, ..
                } => {
                    saw_flagged |= in_cycle;
                    stack.extend_from_slice(inputs);
                }
                _ => {}
            }
        }
        assert!(saw_flagged, "reference build must flag in-cycle crafts");
    }

    #[test]
    fn fodder_is_empty_before_propagation() {
        let fx = two_cycle_fixture();
        let (arena, root) = build_for(&fx, fx.a);
        let PlanNode::Cycle { fodder, crafts, .. } = &arena[root] else {
            panic!("expected cycle root");
        };
        assert!(fodder.is_empty());
        assert_eq!(*crafts, 0.0);
    }

    #[test]
    fn self_loop_condenses_to_singleton_cycle() {
        let fx = self_loop_fixture();
        let (arena, root) = build_for(&fx, fx.a);
        let PlanNode::Cycle { steps, .. } = &arena[root] else {
            panic!("expected cycle root, got {:?}", arena[root]);
        };
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].output, fx.a);
    }
}
