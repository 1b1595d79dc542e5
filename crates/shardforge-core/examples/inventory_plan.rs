//! Inventory-aware planning example: spend banked shards before crafting.
//!
//! Run with: `cargo run -p shardforge-core --example inventory_plan`

use shardforge_core::cancel::CancelToken;
use shardforge_core::inventory::InventoryMap;
use shardforge_core::market::PriceTable;
use shardforge_core::params::CalculationParams;
use shardforge_core::plan::PlanNode;
use shardforge_core::registry::{Rarity, RecipeDef, RegistryBuilder, ShardDef};
use shardforge_core::solver;

fn main() {
    let mut builder = RegistryBuilder::new();
    let ember = builder.register_shard(ShardDef {
        name: "ember".to_string(),
        rarity: Rarity::Common,
        families: Vec::new(),
        fuse_amount: 2,
        market_id: Some("ember".to_string()),
    });
    let frost = builder.register_shard(ShardDef {
        name: "frost".to_string(),
        rarity: Rarity::Common,
        families: Vec::new(),
        fuse_amount: 3,
        market_id: Some("frost".to_string()),
    });
    let storm = builder.register_shard(ShardDef {
        name: "storm".to_string(),
        rarity: Rarity::Rare,
        families: Vec::new(),
        fuse_amount: 1,
        market_id: Some("storm".to_string()),
    });
    builder.register_recipe(RecipeDef {
        output: storm,
        inputs: [ember, frost],
        output_quantity: 1,
        bonus_eligible: false,
    });
    let registry = builder.build().expect("valid dataset");

    let mut prices = PriceTable::default();
    prices.set(ember, 10.0);
    prices.set(frost, 5.0);
    prices.set(storm, 100.0);

    // 4 storm shards banked, plus a pile of embers to feed the crafts.
    let mut stock = InventoryMap::new();
    stock.set(storm, 4.0);
    stock.set(ember, 8.0);

    let params = CalculationParams::default();
    let result = solver::solve_with_inventory(
        storm,
        10.0,
        &registry,
        &prices,
        &params,
        &mut stock,
        &CancelToken::new(),
    )
    .expect("not cancelled");

    println!("total cost:   {:.2}", result.total_cost);
    println!("total crafts: {}", result.total_crafts);
    println!("stock left:   storm={} ember={}", stock.available(storm), stock.available(ember));
    println!();

    for (path, id) in result.plan.path_ids() {
        let node = result.plan.node(id).expect("path ids are live");
        let name = registry
            .shard(node.shard())
            .map(|s| s.name.as_str())
            .unwrap_or("?");
        let indent = "  ".repeat(path.matches('-').count());
        match node {
            PlanNode::Stock {
                quantity,
                unit_cost,
                ..
            } => println!("{indent}{path}: draw {quantity} {name} from stock @ {unit_cost:.2}"),
            PlanNode::Direct { quantity, .. } => println!("{indent}{path}: buy {quantity} {name}"),
            PlanNode::Craft { crafts, .. } => println!("{indent}{path}: fuse {name} ({crafts} crafts)"),
            PlanNode::Split { quantity, .. } => println!("{indent}{path}: {name} x{quantity} from mixed sources"),
            other => println!("{indent}{path}: {other:?}"),
        }
    }
}
