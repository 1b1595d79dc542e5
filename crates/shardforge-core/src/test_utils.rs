//! Shared test fixtures for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the helpers
//! are available to unit tests, `tests/`, benches, and examples (via the
//! `test-utils` feature).
//!
//! Each fixture constructor documents which shard handles it fills; the
//! untouched handles stay at an out-of-range sentinel so accidental use
//! fails loudly.

use crate::id::{RecipeId, ShardId};
use crate::market::PriceTable;
use crate::params::CalculationParams;
use crate::registry::{Rarity, RecipeDef, Registry, RegistryBuilder, ShardDef};

/// A registry/prices/params bundle plus the shard handles tests care about.
pub struct Fixture {
    pub registry: Registry,
    pub prices: PriceTable,
    pub params: CalculationParams,
    pub x: ShardId,
    pub y: ShardId,
    pub z: ShardId,
    pub w: ShardId,
    pub a: ShardId,
    pub b: ShardId,
    pub ore: ShardId,
    pub dead: ShardId,
    pub first_recipe: RecipeId,
}

const UNSET_SHARD: ShardId = ShardId(u32::MAX);
const UNSET_RECIPE: RecipeId = RecipeId(u32::MAX);

impl Fixture {
    fn new(registry: Registry, prices: PriceTable) -> Self {
        Self {
            registry,
            prices,
            params: CalculationParams::default(),
            x: UNSET_SHARD,
            y: UNSET_SHARD,
            z: UNSET_SHARD,
            w: UNSET_SHARD,
            a: UNSET_SHARD,
            b: UNSET_SHARD,
            ore: UNSET_SHARD,
            dead: UNSET_SHARD,
            first_recipe: UNSET_RECIPE,
        }
    }
}

/// A shard definition with the given name and fuse amount.
pub fn shard(name: &str, fuse_amount: u32) -> ShardDef {
    ShardDef {
        name: name.to_string(),
        rarity: Rarity::Common,
        families: Vec::new(),
        fuse_amount,
        market_id: Some(name.to_string()),
    }
}

fn recipe(output: ShardId, inputs: [ShardId; 2], output_quantity: u32) -> RecipeDef {
    RecipeDef {
        output,
        inputs,
        output_quantity,
        bonus_eligible: false,
    }
}

// ===========================================================================
// Acyclic fixtures
// ===========================================================================

/// X (rate 10, fuse 2) + Y (rate 5, fuse 3) -> Z (rate 100, qty 1).
/// Recipe cost 35 beats the direct 100. Fills `x`, `y`, `z`.
pub fn linear_fixture() -> Fixture {
    let mut b = RegistryBuilder::new();
    let x = b.register_shard(shard("x", 2));
    let y = b.register_shard(shard("y", 3));
    let z = b.register_shard(shard("z", 1));
    b.register_recipe(recipe(z, [x, y], 1));
    let registry = b.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(x, 10.0);
    prices.set(y, 5.0);
    prices.set(z, 100.0);

    let mut fx = Fixture::new(registry, prices);
    fx.x = x;
    fx.y = y;
    fx.z = z;
    fx
}

/// The linear fixture extended with Z + filler (rate 1) -> W (rate 500).
/// Fills `x`, `y`, `z`, `w`.
pub fn chained_fixture() -> Fixture {
    let mut b = RegistryBuilder::new();
    let x = b.register_shard(shard("x", 2));
    let y = b.register_shard(shard("y", 3));
    let z = b.register_shard(shard("z", 1));
    let filler = b.register_shard(shard("filler", 1));
    let w = b.register_shard(shard("w", 1));
    b.register_recipe(recipe(z, [x, y], 1));
    b.register_recipe(recipe(w, [z, filler], 1));
    let registry = b.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(x, 10.0);
    prices.set(y, 5.0);
    prices.set(z, 100.0);
    prices.set(filler, 1.0);
    prices.set(w, 500.0);

    let mut fx = Fixture::new(registry, prices);
    fx.x = x;
    fx.y = y;
    fx.z = z;
    fx.w = w;
    fx
}

/// Like the linear fixture but the recipe yields 3 per craft. Fills `x`,
/// `y`, `z`.
pub fn multi_output_fixture() -> Fixture {
    let mut b = RegistryBuilder::new();
    let x = b.register_shard(shard("x", 2));
    let y = b.register_shard(shard("y", 3));
    let z = b.register_shard(shard("z", 1));
    b.register_recipe(recipe(z, [x, y], 3));
    let registry = b.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(x, 10.0);
    prices.set(y, 5.0);
    prices.set(z, 100.0);

    let mut fx = Fixture::new(registry, prices);
    fx.x = x;
    fx.y = y;
    fx.z = z;
    fx
}

/// Two recipes for Z with identical 35 cost: [x, y] then [y, x].
/// Fills `x`, `y`, `z`, `first_recipe`.
pub fn tied_recipes_fixture() -> Fixture {
    let mut b = RegistryBuilder::new();
    let x = b.register_shard(shard("x", 2));
    let y = b.register_shard(shard("y", 3));
    let z = b.register_shard(shard("z", 1));
    let first = b.register_recipe(recipe(z, [x, y], 1));
    b.register_recipe(recipe(z, [y, x], 1));
    let registry = b.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(x, 10.0);
    prices.set(y, 5.0);
    prices.set(z, 100.0);

    let mut fx = Fixture::new(registry, prices);
    fx.x = x;
    fx.y = y;
    fx.z = z;
    fx.first_recipe = first;
    fx
}

/// Z (rate 100) is craftable only from a shard with neither price nor
/// recipe, so the recipe never wins. Fills `z`, `dead`.
pub fn dead_leaf_fixture() -> Fixture {
    let mut b = RegistryBuilder::new();
    let dead = b.register_shard(ShardDef {
        name: "dead".to_string(),
        rarity: Rarity::Legendary,
        families: Vec::new(),
        fuse_amount: 1,
        market_id: None,
    });
    let z = b.register_shard(shard("z", 1));
    b.register_recipe(recipe(z, [dead, dead], 1));
    let registry = b.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(z, 100.0);

    let mut fx = Fixture::new(registry, prices);
    fx.dead = dead;
    fx.z = z;
    fx
}

// ===========================================================================
// Cyclic fixtures
// ===========================================================================

/// A self-sustaining 2-cycle over ore (rate 1):
/// A <- [B, ore] (qty 3), B <- [A, ore] (qty 1); all fuse amounts 1.
/// Costs settle near A = 1, B = 2 and both stay crafted, so {A, B} is an
/// SCC. Net output of A per run is 3 - 1 = 2. Fills `ore`, `a`, `b`.
pub fn two_cycle_fixture() -> Fixture {
    let mut b = RegistryBuilder::new();
    let ore = b.register_shard(shard("ore", 1));
    let a = b.register_shard(shard("a", 1));
    let bb = b.register_shard(shard("b", 1));
    b.register_recipe(recipe(a, [bb, ore], 3));
    b.register_recipe(recipe(bb, [a, ore], 1));
    let registry = b.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(ore, 1.0);
    prices.set(a, 100.0);
    prices.set(bb, 100.0);

    let mut fx = Fixture::new(registry, prices);
    fx.ore = ore;
    fx.a = a;
    fx.b = bb;
    fx
}

/// A 3-cycle A -> B -> C -> A over ore, every step qty 2 so each link stays
/// cheaper than its direct rate. Fills `ore`, `a`, `b`.
pub fn three_cycle_fixture() -> Fixture {
    let mut b = RegistryBuilder::new();
    let ore = b.register_shard(shard("ore", 1));
    let a = b.register_shard(shard("a", 1));
    let bb = b.register_shard(shard("b", 1));
    let c = b.register_shard(shard("c", 1));
    b.register_recipe(recipe(a, [bb, ore], 2));
    b.register_recipe(recipe(bb, [c, ore], 2));
    b.register_recipe(recipe(c, [a, ore], 2));
    let registry = b.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(ore, 1.0);
    prices.set(a, 100.0);
    prices.set(bb, 100.0);
    prices.set(c, 100.0);

    let mut fx = Fixture::new(registry, prices);
    fx.ore = ore;
    fx.a = a;
    fx.b = bb;
    fx
}

/// A 2-cycle that is not self-sustaining for `a`: the partner step fuses
/// away as much of `a` as its own step yields (net 0).
/// S (fuse 2) <- [a, ore] qty 5; a (fuse 1) <- [S, ore] qty 1.
/// Fills `ore`, `a` (the net-0 shard), `b` (the partner).
pub fn mining_cycle_fixture() -> Fixture {
    let mut builder = RegistryBuilder::new();
    let ore = builder.register_shard(shard("ore", 1));
    let s = builder.register_shard(shard("s", 2));
    let t = builder.register_shard(shard("t", 1));
    builder.register_recipe(recipe(s, [t, ore], 5));
    builder.register_recipe(recipe(t, [s, ore], 1));
    let registry = builder.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(ore, 1.0);
    prices.set(s, 100.0);
    prices.set(t, 100.0);

    let mut fx = Fixture::new(registry, prices);
    fx.ore = ore;
    fx.a = t;
    fx.b = s;
    fx
}

/// A shard whose chosen recipe consumes its own output:
/// A <- [A, ore] qty 2. Fills `ore`, `a`.
pub fn self_loop_fixture() -> Fixture {
    let mut b = RegistryBuilder::new();
    let ore = b.register_shard(shard("ore", 1));
    let a = b.register_shard(shard("a", 1));
    b.register_recipe(recipe(a, [a, ore], 2));
    let registry = b.build().unwrap();

    let mut prices = PriceTable::default();
    prices.set(ore, 1.0);
    prices.set(a, 100.0);

    let mut fx = Fixture::new(registry, prices);
    fx.ore = ore;
    fx.a = a;
    fx
}

// ===========================================================================
// Mutators and generators
// ===========================================================================

/// Rebuild the fixture's registry with every recipe marked bonus-eligible.
pub fn make_recipes_bonus_eligible(fx: &mut Fixture) {
    let mut b = RegistryBuilder::new();
    for id in fx.registry.shard_ids() {
        b.register_shard(fx.registry.shard(id).unwrap().clone());
    }
    for i in 0..fx.registry.recipe_count() as u32 {
        let mut def = fx.registry.recipe(RecipeId(i)).unwrap().clone();
        def.bonus_eligible = true;
        b.register_recipe(def);
    }
    fx.registry = b.build().unwrap();
}

/// A layered DAG: `width` priced leaf shards, then `layers` rows where each
/// shard fuses two shards from the row below. Direct rates above the leaf
/// row are prohibitive, so every upper shard crafts. Fills `z` with the top
/// row's first shard.
pub fn layered_fixture(layers: usize, width: usize) -> Fixture {
    let mut b = RegistryBuilder::new();
    let mut prices = PriceTable::default();
    let mut below: Vec<ShardId> = Vec::with_capacity(width);

    for i in 0..width {
        let id = b.register_shard(shard(&format!("leaf_{i}"), 1 + (i % 3) as u32));
        prices.set(id, 1.0 + i as f64);
        below.push(id);
    }

    let mut top = below[0];
    for layer in 1..=layers {
        let mut row = Vec::with_capacity(width);
        for i in 0..width {
            let id = b.register_shard(shard(&format!("s{layer}_{i}"), 1));
            let left = below[i % below.len()];
            let right = below[(i + 1) % below.len()];
            b.register_recipe(recipe(id, [left, right], 1 + (i % 2) as u32));
            prices.set(id, 1e9);
            row.push(id);
        }
        below = row;
        top = below[0];
    }

    let registry = b.build().unwrap();
    let mut fx = Fixture::new(registry, prices);
    fx.z = top;
    fx
}
