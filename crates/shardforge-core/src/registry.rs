use crate::id::{RecipeId, ShardId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Shard rarity tier. Display/grouping only; the optimizer never reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Legendary,
}

/// A shard definition. Immutable once the registry is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardDef {
    /// Human-readable name, unique within the registry.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Family tags. Loaders use these to decide bonus eligibility of recipes.
    pub families: Vec<String>,
    /// Units consumed per use of this shard as a recipe input.
    pub fuse_amount: u32,
    /// Key into the external market price feed. Absent for untradeable shards.
    pub market_id: Option<String>,
}

/// A fusion recipe: two ordered inputs produce `output_quantity` units of
/// `output`. Multiple recipes may exist for the same output shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDef {
    /// The shard this recipe produces.
    pub output: ShardId,
    /// The two ordered input shards. Each use consumes the input shard's
    /// `fuse_amount`.
    pub inputs: [ShardId; 2],
    /// Base output quantity before any yield bonus.
    pub output_quantity: u32,
    /// Whether the yield bonus multiplier applies to this recipe.
    pub bonus_eligible: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during registry construction.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid shard reference: {0:?}")]
    InvalidShardRef(ShardId),
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable [`Registry`].
/// Register shards first, then recipes referencing them, then `build()`.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    shards: Vec<ShardDef>,
    shard_name_to_id: HashMap<String, ShardId>,
    recipes: Vec<RecipeDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shard. Returns its ID.
    pub fn register_shard(&mut self, def: ShardDef) -> ShardId {
        let id = ShardId(self.shards.len() as u32);
        self.shard_name_to_id.insert(def.name.clone(), id);
        self.shards.push(def);
        id
    }

    /// Register a recipe. Returns its ID.
    pub fn register_recipe(&mut self, def: RecipeDef) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(def);
        id
    }

    /// Lookup shard ID by name.
    pub fn shard_id(&self, name: &str) -> Option<ShardId> {
        self.shard_name_to_id.get(name).copied()
    }

    /// Mutate an existing shard by name.
    pub fn mutate_shard<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ShardDef),
    {
        let id = self
            .shard_name_to_id
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        f(&mut self.shards[id.0 as usize]);
        Ok(())
    }

    /// Finalize and build the immutable registry.
    ///
    /// All recipe shard references must resolve. Producer lists and
    /// reverse-dependency sets are precomputed here so the cost engine's
    /// worklist never scans the full recipe table per shard.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let shard_count = self.shards.len();
        for recipe in &self.recipes {
            for &s in std::iter::once(&recipe.output).chain(recipe.inputs.iter()) {
                if s.0 as usize >= shard_count {
                    return Err(RegistryError::InvalidShardRef(s));
                }
            }
        }

        // Producers: output shard -> recipes producing it, in registration order.
        let mut recipes_for: Vec<Vec<RecipeId>> = vec![Vec::new(); shard_count];
        // Dependents: input shard -> shards with a recipe consuming it (dedup'd).
        let mut dependents_of: Vec<Vec<ShardId>> = vec![Vec::new(); shard_count];

        for (idx, recipe) in self.recipes.iter().enumerate() {
            recipes_for[recipe.output.0 as usize].push(RecipeId(idx as u32));
            for input in recipe.inputs {
                let deps = &mut dependents_of[input.0 as usize];
                if !deps.contains(&recipe.output) {
                    deps.push(recipe.output);
                }
            }
        }

        Ok(Registry {
            shards: self.shards,
            shard_name_to_id: self.shard_name_to_id,
            recipes: self.recipes,
            recipes_for,
            dependents_of,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable shard/recipe registry. Frozen after build; thread-safe to share.
#[derive(Debug)]
pub struct Registry {
    shards: Vec<ShardDef>,
    shard_name_to_id: HashMap<String, ShardId>,
    recipes: Vec<RecipeDef>,
    recipes_for: Vec<Vec<RecipeId>>,
    dependents_of: Vec<Vec<ShardId>>,
}

impl Registry {
    pub fn shard(&self, id: ShardId) -> Option<&ShardDef> {
        self.shards.get(id.0 as usize)
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn shard_id(&self, name: &str) -> Option<ShardId> {
        self.shard_name_to_id.get(name).copied()
    }

    /// Recipes producing the given shard, in registration order.
    pub fn recipes_for(&self, shard: ShardId) -> &[RecipeId] {
        self.recipes_for
            .get(shard.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Shards that have at least one recipe consuming the given shard.
    pub fn dependents_of(&self, shard: ShardId) -> &[ShardId] {
        self.dependents_of
            .get(shard.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Units consumed per use of this shard as a recipe input.
    /// Unknown shards consume nothing.
    pub fn fuse_amount(&self, shard: ShardId) -> u32 {
        self.shard(shard).map(|s| s.fuse_amount).unwrap_or(0)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    /// Iterate over all shard IDs.
    pub fn shard_ids(&self) -> impl Iterator<Item = ShardId> + '_ {
        (0..self.shards.len() as u32).map(ShardId)
    }
}
