//! Market snapshot loading.
//!
//! The live price feed is an external service; it hands over JSON snapshots
//! of per-market-id rates. This module parses them into the core crate's
//! [`PriceSnapshot`] and resolves them into per-shard [`PriceTable`]s for a
//! chosen cost basis. Freshness tracking belongs to the caller via
//! [`shardforge_core::market::PriceCache`].

use crate::loader::DataError;
use crate::schema::SnapshotData;
use shardforge_core::market::{MarketRate, PriceSnapshot, PriceTable};
use shardforge_core::params::CostBasis;
use shardforge_core::registry::Registry;

/// Parse a snapshot file into the core snapshot type.
pub fn load_price_snapshot(json: &str) -> Result<PriceSnapshot, DataError> {
    let data: SnapshotData = serde_json::from_str(json)?;
    let mut snapshot = PriceSnapshot::default();
    for entry in data.entries {
        snapshot.rates.insert(
            entry.market_id,
            MarketRate {
                gold: entry.gold,
                seconds: entry.seconds,
            },
        );
    }
    Ok(snapshot)
}

/// Parse a snapshot and resolve it against a registry in one step.
pub fn load_price_table(
    json: &str,
    registry: &Registry,
    basis: CostBasis,
) -> Result<PriceTable, DataError> {
    let snapshot = load_price_snapshot(json)?;
    Ok(PriceTable::from_snapshot(&snapshot, registry, basis))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_dataset_json;

    const DATASET: &str = r#"{
        "shards": [
            {"name": "ember", "fuse_amount": 2, "market_id": "m_ember"},
            {"name": "frost", "fuse_amount": 3, "market_id": "m_frost"},
            {"name": "bound", "fuse_amount": 1}
        ]
    }"#;

    const SNAPSHOT: &str = r#"{
        "fetched_unix_ms": 1754300000000,
        "entries": [
            {"market_id": "m_ember", "gold": 10.0, "seconds": 2.5},
            {"market_id": "m_frost", "gold": 5.0, "seconds": 1.0},
            {"market_id": "m_orphan", "gold": 7.0, "seconds": 0.5}
        ]
    }"#;

    #[test]
    fn snapshot_parses_all_entries() {
        let snapshot = load_price_snapshot(SNAPSHOT).unwrap();
        assert_eq!(snapshot.rates.len(), 3);
        assert_eq!(snapshot.rates["m_ember"].gold, 10.0);
        assert_eq!(snapshot.rates["m_frost"].seconds, 1.0);
    }

    #[test]
    fn table_resolves_per_basis() {
        let reg = load_dataset_json(DATASET).unwrap().build().unwrap();
        let gold = load_price_table(SNAPSHOT, &reg, CostBasis::Currency).unwrap();
        let time = load_price_table(SNAPSHOT, &reg, CostBasis::Time).unwrap();
        let ember = reg.shard_id("ember").unwrap();
        assert_eq!(gold.rate(ember), Some(10.0));
        assert_eq!(time.rate(ember), Some(2.5));
    }

    #[test]
    fn shards_without_market_id_stay_unpriced() {
        let reg = load_dataset_json(DATASET).unwrap().build().unwrap();
        let table = load_price_table(SNAPSHOT, &reg, CostBasis::Currency).unwrap();
        let bound = reg.shard_id("bound").unwrap();
        assert_eq!(table.rate(bound), None);
    }

    #[test]
    fn orphan_listings_are_ignored() {
        // A listing with no matching shard is simply dropped.
        let reg = load_dataset_json(DATASET).unwrap().build().unwrap();
        let table = load_price_table(SNAPSHOT, &reg, CostBasis::Currency).unwrap();
        for shard in reg.shard_ids() {
            let _ = table.rate(shard);
        }
    }

    #[test]
    fn empty_snapshot_is_valid() {
        let snapshot = load_price_snapshot(r#"{"entries": []}"#).unwrap();
        assert!(snapshot.rates.is_empty());
    }

    #[test]
    fn malformed_snapshot_fails() {
        assert!(matches!(
            load_price_snapshot("oops"),
            Err(DataError::JsonParse(_))
        ));
    }
}
