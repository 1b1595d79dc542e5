//! Crafting plan trees.
//!
//! A [`Plan`] is an arena of [`PlanNode`]s plus a root id. The arena is a
//! pure value owned by whoever requested the calculation; nodes are never
//! shared between plans. The builder creates nodes with zero quantities and
//! the quantity propagator fills them in exactly once, so a finished plan is
//! effectively immutable.
//!
//! Nodes are addressable by a path id scheme (`"root"`, `"root-0"`,
//! `"root-0-1"`, ...) with deterministic child ordering, so a rendering
//! collaborator can track per-node expand/collapse state without engine
//! involvement.

use crate::id::{PlanNodeId, RecipeId, ShardId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// Node storage for plans under construction.
pub type PlanArena = SlotMap<PlanNodeId, PlanNode>;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// One step of a condensed cycle: the shard a recipe produces inside the
/// strongly connected group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStep {
    pub output: ShardId,
    pub recipe: RecipeId,
}

/// A node in a crafting plan. Closed sum type; each variant carries only its
/// relevant fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    /// Acquire raw units from the market.
    Direct { shard: ShardId, quantity: f64 },

    /// Apply a recipe. `in_cycle` marks nodes whose shard participates in a
    /// still-open cycle during a reference sub-build; their leaves are
    /// excluded from cost totals because the loop-back stream is produced
    /// inside the cycle itself.
    Craft {
        shard: ShardId,
        recipe: RecipeId,
        /// Subtrees for the recipe's two ordered inputs.
        inputs: [PlanNodeId; 2],
        quantity: f64,
        crafts: f64,
        in_cycle: bool,
    },

    /// A whole strongly connected group of recipes condensed into one node.
    Cycle {
        shard: ShardId,
        /// The group's recipes in walk order from the pivot.
        steps: Vec<CycleStep>,
        /// Yield multiplier of the step producing `shard`.
        multiplier: f64,
        quantity: f64,
        crafts: f64,
        /// Representative sub-plan of one cycle traversal, rooted at the
        /// pivot. Display only; excluded from totals.
        reference: PlanNodeId,
        /// Subtrees supplying the group's external inputs. Grown during
        /// quantity propagation.
        fodder: Vec<PlanNodeId>,
    },

    /// Draw units from on-hand inventory (inventory-aware plans only).
    /// `unit_cost` captures the diminishing-returns price at withdrawal time.
    Stock {
        shard: ShardId,
        quantity: f64,
        unit_cost: f64,
    },

    /// Mixed sourcing of one demand (inventory-aware plans only): the parts
    /// sum to `quantity`.
    Split {
        shard: ShardId,
        quantity: f64,
        parts: Vec<PlanNodeId>,
    },
}

impl PlanNode {
    /// The shard this node supplies.
    pub fn shard(&self) -> ShardId {
        match self {
            PlanNode::Direct { shard, .. }
            | PlanNode::Craft { shard, .. }
            | PlanNode::Cycle { shard, .. }
            | PlanNode::Stock { shard, .. }
            | PlanNode::Split { shard, .. } => *shard,
        }
    }

    /// The quantity this node supplies. Zero until propagation.
    pub fn quantity(&self) -> f64 {
        match self {
            PlanNode::Direct { quantity, .. }
            | PlanNode::Craft { quantity, .. }
            | PlanNode::Cycle { quantity, .. }
            | PlanNode::Stock { quantity, .. }
            | PlanNode::Split { quantity, .. } => *quantity,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A finished crafting plan: arena plus root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    nodes: PlanArena,
    root: PlanNodeId,
}

impl Plan {
    pub fn new(nodes: PlanArena, root: PlanNodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> PlanNodeId {
        self.root
    }

    pub fn node(&self, id: PlanNodeId) -> Option<&PlanNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in arbitrary arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (PlanNodeId, &PlanNode)> {
        self.nodes.iter()
    }

    /// Children of a node in path order: recipe inputs in recipe order, then
    /// a cycle's reference before its fodder, then split parts.
    pub fn children(&self, id: PlanNodeId) -> Vec<PlanNodeId> {
        match self.nodes.get(id) {
            Some(PlanNode::Craft { inputs, .. }) => inputs.to_vec(),
            Some(PlanNode::Cycle {
                reference, fodder, ..
            }) => {
                let mut out = Vec::with_capacity(1 + fodder.len());
                out.push(*reference);
                out.extend_from_slice(fodder);
                out
            }
            Some(PlanNode::Split { parts, .. }) => parts.clone(),
            _ => Vec::new(),
        }
    }

    /// All nodes with their path ids, preorder. The root is `"root"`; child
    /// `i` of a node at `p` is `p-i`.
    pub fn path_ids(&self) -> Vec<(String, PlanNodeId)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![("root".to_string(), self.root)];
        while let Some((path, id)) = stack.pop() {
            let children = self.children(id);
            for (i, child) in children.into_iter().enumerate().rev() {
                stack.push((format!("{path}-{i}"), child));
            }
            out.push((path, id));
        }
        out
    }

    /// Resolve a path id back to a node.
    pub fn node_at_path(&self, path: &str) -> Option<PlanNodeId> {
        let mut segments = path.split('-');
        if segments.next() != Some("root") {
            return None;
        }
        let mut current = self.root;
        for segment in segments {
            let idx: usize = segment.parse().ok()?;
            current = self.children(current).into_iter().nth(idx)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(arena: &mut PlanArena, shard: u32, quantity: f64) -> PlanNodeId {
        arena.insert(PlanNode::Direct {
            shard: ShardId(shard),
            quantity,
        })
    }

    fn two_level_plan() -> Plan {
        let mut arena = PlanArena::with_key();
        let x = leaf(&mut arena, 0, 20.0);
        let y = leaf(&mut arena, 1, 30.0);
        let root = arena.insert(PlanNode::Craft {
            shard: ShardId(2),
            recipe: RecipeId(0),
            inputs: [x, y],
            quantity: 10.0,
            crafts: 10.0,
            in_cycle: false,
        });
        Plan::new(arena, root)
    }

    #[test]
    fn node_accessors() {
        let plan = two_level_plan();
        let root = plan.node(plan.root()).unwrap();
        assert_eq!(root.shard(), ShardId(2));
        assert_eq!(root.quantity(), 10.0);
        assert_eq!(plan.len(), 3);
        assert!(!plan.is_empty());
    }

    #[test]
    fn children_follow_recipe_input_order() {
        let plan = two_level_plan();
        let children = plan.children(plan.root());
        assert_eq!(children.len(), 2);
        assert_eq!(plan.node(children[0]).unwrap().shard(), ShardId(0));
        assert_eq!(plan.node(children[1]).unwrap().shard(), ShardId(1));
    }

    #[test]
    fn path_ids_are_preorder() {
        let plan = two_level_plan();
        let paths: Vec<String> = plan.path_ids().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["root", "root-0", "root-1"]);
    }

    #[test]
    fn path_round_trip() {
        let plan = two_level_plan();
        for (path, id) in plan.path_ids() {
            assert_eq!(plan.node_at_path(&path), Some(id));
        }
        assert_eq!(plan.node_at_path("root-7"), None);
        assert_eq!(plan.node_at_path("trunk"), None);
        assert_eq!(plan.node_at_path("root-x"), None);
    }

    #[test]
    fn cycle_children_put_reference_first() {
        let mut arena = PlanArena::with_key();
        let reference = leaf(&mut arena, 0, 1.0);
        let fodder = leaf(&mut arena, 1, 5.0);
        let root = arena.insert(PlanNode::Cycle {
            shard: ShardId(0),
            steps: vec![CycleStep {
                output: ShardId(0),
                recipe: RecipeId(0),
            }],
            multiplier: 1.0,
            quantity: 5.0,
            crafts: 5.0,
            reference,
            fodder: vec![fodder],
        });
        let plan = Plan::new(arena, root);
        let children = plan.children(root);
        assert_eq!(children, vec![reference, fodder]);
    }

    #[test]
    fn serde_round_trip_preserves_shape() {
        let plan = two_level_plan();
        let json = serde_json::to_string(&plan).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), plan.len());
        let paths_a: Vec<String> = plan.path_ids().into_iter().map(|(p, _)| p).collect();
        let paths_b: Vec<String> = back.path_ids().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths_a, paths_b);
    }
}
