//! Dataset loading into the core registry.
//!
//! Shards are registered first, then recipes with their name references
//! resolved. An unknown reference fails that load with the offending name;
//! the engine itself additionally skips any malformed recipe that slips
//! through, so partial data still produces a best-effort answer.

use crate::schema::{DatasetData, RecipeData};
use shardforge_core::registry::{RecipeDef, RegistryBuilder, RegistryError, ShardDef};

/// Errors that can occur while loading content files.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("unknown shard reference: {0}")]
    UnknownShardRef(String),
}

/// Load a dataset from a JSON string into a registry builder.
pub fn load_dataset_json(json: &str) -> Result<RegistryBuilder, DataError> {
    let data: DatasetData = serde_json::from_str(json)?;
    build_dataset(data)
}

/// Load a dataset from JSON bytes.
pub fn load_dataset_json_bytes(bytes: &[u8]) -> Result<RegistryBuilder, DataError> {
    let data: DatasetData = serde_json::from_slice(bytes)?;
    build_dataset(data)
}

fn build_dataset(data: DatasetData) -> Result<RegistryBuilder, DataError> {
    let mut builder = RegistryBuilder::new();

    // Phase 1: register all shards.
    for shard in &data.shards {
        builder.register_shard(ShardDef {
            name: shard.name.clone(),
            rarity: shard.rarity,
            families: shard.families.clone(),
            fuse_amount: shard.fuse_amount,
            market_id: shard.market_id.clone(),
        });
    }

    // Phase 2: register recipes, resolving shard references by name.
    for recipe in &data.recipes {
        let output = builder
            .shard_id(&recipe.output)
            .ok_or_else(|| DataError::UnknownShardRef(recipe.output.clone()))?;
        let mut inputs = [output; 2];
        for (slot, name) in inputs.iter_mut().zip(&recipe.inputs) {
            *slot = builder
                .shard_id(name)
                .ok_or_else(|| DataError::UnknownShardRef(name.clone()))?;
        }

        let bonus_eligible = match recipe.bonus {
            Some(explicit) => explicit,
            None => derived_bonus(&data, recipe),
        };

        builder.register_recipe(RecipeDef {
            output,
            inputs,
            output_quantity: recipe.quantity,
            bonus_eligible,
        });
    }

    Ok(builder)
}

/// A recipe without an explicit flag is bonus-eligible when its output
/// shard carries any of the dataset's bonus families.
fn derived_bonus(data: &DatasetData, recipe: &RecipeData) -> bool {
    data.shards
        .iter()
        .find(|s| s.name == recipe.output)
        .map(|s| {
            s.families
                .iter()
                .any(|family| data.bonus_families.contains(family))
        })
        .unwrap_or(false)
}

// ===========================================================================
// Tests
// ===========================================================================
