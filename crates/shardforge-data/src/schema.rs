//! JSON schemas for dataset and price-snapshot files.

use serde::Deserialize;
use shardforge_core::registry::Rarity;

/// Top-level dataset file.
#[derive(Debug, Deserialize)]
pub struct DatasetData {
    #[serde(default)]
    pub shards: Vec<ShardData>,
    #[serde(default)]
    pub recipes: Vec<RecipeData>,
    /// Family tags whose shards make recipes bonus-eligible by default.
    #[serde(default)]
    pub bonus_families: Vec<String>,
}

/// JSON representation of a shard.
#[derive(Debug, Deserialize)]
pub struct ShardData {
    pub name: String,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub families: Vec<String>,
    pub fuse_amount: u32,
    #[serde(default)]
    pub market_id: Option<String>,
}

/// JSON representation of a recipe. Inputs reference shards by name.
#[derive(Debug, Deserialize)]
pub struct RecipeData {
    pub output: String,
    pub quantity: u32,
    pub inputs: [String; 2],
    /// Explicit bonus eligibility. When absent, it is derived from the
    /// output shard's families against the dataset's `bonus_families`.
    #[serde(default)]
    pub bonus: Option<bool>,
}

/// Top-level price snapshot file, as produced by the market service.
#[derive(Debug, Deserialize)]
pub struct SnapshotData {
    /// When the service fetched these rates (unix milliseconds).
    #[serde(default)]
    pub fetched_unix_ms: u64,
    #[serde(default)]
    pub entries: Vec<RateData>,
}

/// One market listing.
#[derive(Debug, Deserialize)]
pub struct RateData {
    pub market_id: String,
    pub gold: f64,
    pub seconds: f64,
}
