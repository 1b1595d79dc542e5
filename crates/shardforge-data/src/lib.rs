//! Data-driven loading for the Shardforge engine.
//!
//! Turns JSON content files into the core crate's frozen registry, and the
//! market service's price snapshots into price tables:
//!
//! - [`schema`] -- serde representations of the dataset and snapshot files.
//! - [`loader`] -- name-reference resolution into a
//!   [`shardforge_core::registry::RegistryBuilder`].
//! - [`prices`] -- snapshot parsing and [`shardforge_core::market::PriceTable`]
//!   construction per cost basis.

pub mod loader;
pub mod prices;
pub mod schema;

pub use loader::{DataError, load_dataset_json};
pub use prices::{load_price_snapshot, load_price_table};
