//! Cheapest plan example: craft a storm shard from ember and frost shards.
//!
//! Demonstrates registry construction, pricing, solving, and walking the
//! resulting plan tree by path id.
//!
//! Run with: `cargo run -p shardforge-core --example cheapest_plan`

use shardforge_core::cancel::CancelToken;
use shardforge_core::market::PriceTable;
use shardforge_core::params::CalculationParams;
use shardforge_core::plan::PlanNode;
use shardforge_core::registry::{Rarity, RecipeDef, RegistryBuilder, ShardDef};
use shardforge_core::solver;

fn main() {
    // --- Dataset: ember + frost -> storm, storm + ember -> tempest ---

    let mut builder = RegistryBuilder::new();
    let ember = builder.register_shard(ShardDef {
        name: "ember".to_string(),
        rarity: Rarity::Common,
        families: vec!["elemental".to_string()],
        fuse_amount: 2,
        market_id: Some("ember".to_string()),
    });
    let frost = builder.register_shard(ShardDef {
        name: "frost".to_string(),
        rarity: Rarity::Common,
        families: vec!["elemental".to_string()],
        fuse_amount: 3,
        market_id: Some("frost".to_string()),
    });
    let storm = builder.register_shard(ShardDef {
        name: "storm".to_string(),
        rarity: Rarity::Rare,
        families: vec!["elemental".to_string()],
        fuse_amount: 1,
        market_id: Some("storm".to_string()),
    });
    let tempest = builder.register_shard(ShardDef {
        name: "tempest".to_string(),
        rarity: Rarity::Legendary,
        families: vec!["elemental".to_string()],
        fuse_amount: 1,
        market_id: Some("tempest".to_string()),
    });
    builder.register_recipe(RecipeDef {
        output: storm,
        inputs: [ember, frost],
        output_quantity: 1,
        bonus_eligible: true,
    });
    builder.register_recipe(RecipeDef {
        output: tempest,
        inputs: [storm, ember],
        output_quantity: 1,
        bonus_eligible: false,
    });
    let registry = builder.build().expect("valid dataset");

    // --- Market rates ---

    let mut prices = PriceTable::default();
    prices.set(ember, 10.0);
    prices.set(frost, 5.0);
    prices.set(storm, 100.0);
    prices.set(tempest, 900.0);

    // --- Solve for 10 tempest shards ---

    let params = CalculationParams::default();
    let result = solver::solve(
        tempest,
        10.0,
        &registry,
        &prices,
        &params,
        &CancelToken::new(),
    )
    .expect("not cancelled");

    println!("unit cost:      {:.2}", result.unit_cost);
    println!("total cost:     {:.2}", result.total_cost);
    println!("total crafts:   {}", result.total_crafts);
    println!("total produced: {}", result.total_produced);
    println!();

    for (path, id) in result.plan.path_ids() {
        let node = result.plan.node(id).expect("path ids are live");
        let name = registry
            .shard(node.shard())
            .map(|s| s.name.as_str())
            .unwrap_or("?");
        let indent = "  ".repeat(path.matches('-').count());
        match node {
            PlanNode::Direct { quantity, .. } => {
                println!("{indent}{path}: buy {quantity} {name}");
            }
            PlanNode::Craft { crafts, quantity, .. } => {
                println!("{indent}{path}: craft {name} x{quantity} ({crafts} fusions)");
            }
            other => println!("{indent}{path}: {other:?}"),
        }
    }
}
