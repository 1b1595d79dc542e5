//! Strongly connected components of the chosen-recipe graph.
//!
//! After relaxation each shard has at most one chosen recipe, so the induced
//! graph (shard -> its chosen inputs) has out-degree <= 2. The optimizer may
//! legitimately settle on a cyclic fusion chain (A feeds B, part of B feeds
//! back into A) when that is cheaper per unit than any acyclic alternative;
//! tree-shaped reconstruction cannot represent that, so the plan builder
//! needs the SCCs up front to condense them.

use crate::cost::CostTable;
use crate::id::ShardId;
use crate::registry::Registry;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// CycleSet
// ---------------------------------------------------------------------------

/// The cycles found in a choice map: SCCs of size > 1, plus single shards
/// whose chosen recipe consumes their own output.
#[derive(Debug, Clone, Default)]
pub struct CycleSet {
    components: Vec<Vec<ShardId>>,
    membership: HashMap<ShardId, usize>,
}

impl CycleSet {
    /// A set with no cycles. Used to suppress condensation during the
    /// reference sub-build of a cycle node.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn components(&self) -> &[Vec<ShardId>] {
        &self.components
    }

    /// Index of the component a shard belongs to, if any.
    pub fn component_of(&self, shard: ShardId) -> Option<usize> {
        self.membership.get(&shard).copied()
    }

    /// Members of one component, ascending by id.
    pub fn members(&self, component: usize) -> &[ShardId] {
        &self.components[component]
    }

    pub fn contains(&self, shard: ShardId) -> bool {
        self.membership.contains_key(&shard)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// True when two shards sit in the same component.
    pub fn same_component(&self, a: ShardId, b: ShardId) -> bool {
        match (self.component_of(a), self.component_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tarjan
// ---------------------------------------------------------------------------

const UNVISITED: u32 = u32::MAX;

/// Chosen inputs of `shard` that are themselves graph nodes (have a chosen
/// recipe). Duplicates are kept; a recipe consuming its own output yields a
/// self-edge.
fn chosen_edges(registry: &Registry, costs: &CostTable, shard: ShardId) -> [Option<ShardId>; 2] {
    let Some(recipe_id) = costs.choice(shard) else {
        return [None, None];
    };
    let Some(recipe) = registry.recipe(recipe_id) else {
        return [None, None];
    };
    recipe
        .inputs
        .map(|input| costs.choice(input).is_some().then_some(input))
}

/// Find the cycle SCCs of the chosen-recipe graph.
///
/// Iterative Tarjan with explicit frames; index/lowlink/stack bookkeeping is
/// the textbook scheme. Components are reported only when they have more
/// than one member, or a single member with a self-edge. Member lists and
/// component order are deterministic (ascending ids, components by smallest
/// member).
pub fn detect_cycles(registry: &Registry, costs: &CostTable) -> CycleSet {
    let n = registry.shard_count();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0u32; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<ShardId> = Vec::new();
    let mut next_index = 0u32;

    // (node, next edge slot to explore)
    let mut frames: Vec<(ShardId, usize)> = Vec::new();
    let mut raw_components: Vec<Vec<ShardId>> = Vec::new();

    for root in registry.shard_ids() {
        if costs.choice(root).is_none() || index[root.0 as usize] != UNVISITED {
            continue;
        }

        frames.push((root, 0));
        index[root.0 as usize] = next_index;
        lowlink[root.0 as usize] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root.0 as usize] = true;

        while let Some(&mut (node, ref mut edge)) = frames.last_mut() {
            let edges = chosen_edges(registry, costs, node);
            if *edge < edges.len() {
                let slot = *edge;
                *edge += 1;
                let Some(target) = edges[slot] else {
                    continue;
                };
                let tidx = target.0 as usize;
                if index[tidx] == UNVISITED {
                    index[tidx] = next_index;
                    lowlink[tidx] = next_index;
                    next_index += 1;
                    stack.push(target);
                    on_stack[tidx] = true;
                    frames.push((target, 0));
                } else if on_stack[tidx] {
                    let nidx = node.0 as usize;
                    lowlink[nidx] = lowlink[nidx].min(index[tidx]);
                }
            } else {
                frames.pop();
                let nidx = node.0 as usize;
                if let Some(&(parent, _)) = frames.last() {
                    let pidx = parent.0 as usize;
                    lowlink[pidx] = lowlink[pidx].min(lowlink[nidx]);
                }
                if lowlink[nidx] == index[nidx] {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member.0 as usize] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    raw_components.push(component);
                }
            }
        }
    }

    // Keep real cycles only: size > 1, or a self-edge singleton.
    let mut components: Vec<Vec<ShardId>> = raw_components
        .into_iter()
        .filter(|c| {
            if c.len() > 1 {
                return true;
            }
            let only = c[0];
            chosen_edges(registry, costs, only)
                .iter()
                .any(|&e| e == Some(only))
        })
        .collect();

    for component in &mut components {
        component.sort();
    }
    components.sort_by_key(|c| c[0]);

    let mut membership = HashMap::new();
    for (idx, component) in components.iter().enumerate() {
        for &member in component {
            membership.insert(member, idx);
        }
    }

    tracing::debug!(cycles = components.len(), "cycle detection complete");

    CycleSet {
        components,
        membership,
    }
}
