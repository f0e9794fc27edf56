// Path: crates/services/src/oracle.rs

//! On-ledger price oracles.
//!
//! Any account can publish up to 100 oracles, each carrying up to 10 price
//! entries per update. Aggregation computes a trimmed mean and median over
//! every fresh entry for a pair.

use nexaflow_types::app::{Address, PriceDatum};
use nexaflow_types::error::TransactionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum price entries per update.
pub const MAX_PRICE_ENTRIES: usize = 10;
/// Maximum oracles per account.
pub const MAX_ORACLES_PER_ACCOUNT: usize = 100;

/// A single price data point within an oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// Base asset, e.g. `"NXF"`.
    pub base_asset: String,
    /// Quote asset, e.g. `"USD"`.
    pub quote_asset: String,
    /// Raw price value.
    pub price: Decimal,
    /// Decimal scale: effective price is `price · 10⁻ˢᶜᵃˡᵉ`.
    pub scale: u8,
    /// When this entry was published.
    pub timestamp: u64,
}

impl PriceEntry {
    /// The price with its scale applied.
    pub fn scaled_price(&self) -> Decimal {
        let mut value = self.price;
        value.set_scale(value.scale() + self.scale as u32).ok();
        value
    }
}

/// A single oracle instance owned by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleEntry {
    /// Oracle id, `"{owner}:{document_id}"`.
    pub oracle_id: String,
    /// The owning account.
    pub owner: Address,
    /// Data provider name.
    pub provider: String,
    /// Asset class, e.g. `"currency"`.
    pub asset_class: String,
    /// Optional metadata URI.
    pub uri: String,
    /// Current price entries.
    pub prices: Vec<PriceEntry>,
    /// Last update time.
    pub last_update: u64,
    /// Owner-scoped document sequence.
    pub document_id: u32,
}

/// An aggregate price computed across oracles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePrice {
    /// Base asset of the pair.
    pub base_asset: String,
    /// Quote asset of the pair.
    pub quote_asset: String,
    /// Trimmed mean of fresh entries.
    pub mean: Decimal,
    /// Median of fresh entries.
    pub median: Decimal,
    /// Number of fresh entries considered.
    pub count: usize,
    /// Number of entries surviving the trim.
    pub trimmed_count: usize,
}

/// Manages all on-ledger price oracles.
#[derive(Debug, Clone, Default)]
pub struct OracleManager {
    /// All oracles, keyed by id.
    pub oracles: BTreeMap<String, OracleEntry>,
    owner_index: BTreeMap<Address, Vec<String>>,
    next_document_id: BTreeMap<Address, u32>,
}

impl OracleManager {
    fn make_id(owner: &str, document_id: u32) -> String {
        format!("{}:{}", owner, document_id)
    }

    /// Create or update an oracle.
    pub fn set_oracle(
        &mut self,
        owner: &str,
        document_id: Option<u32>,
        provider: &str,
        asset_class: &str,
        uri: &str,
        prices: &[PriceDatum],
        now: u64,
    ) -> Result<&OracleEntry, TransactionError> {
        if prices.len() > MAX_PRICE_ENTRIES {
            return Err(TransactionError::LimitExceeded(format!(
                "Max {} price entries per update",
                MAX_PRICE_ENTRIES
            )));
        }
        let document_id = match document_id {
            Some(id) => id,
            None => {
                let next = self.next_document_id.get(owner).copied().unwrap_or(0);
                self.next_document_id.insert(owner.to_owned(), next + 1);
                next
            }
        };
        let oracle_id = Self::make_id(owner, document_id);
        let stamped: Vec<PriceEntry> = prices
            .iter()
            .map(|p| PriceEntry {
                base_asset: p.base_asset.clone(),
                quote_asset: p.quote_asset.clone(),
                price: p.price,
                scale: p.scale,
                timestamp: now,
            })
            .collect();

        match self.oracles.get_mut(&oracle_id) {
            Some(existing) => {
                if existing.owner != owner {
                    return Err(TransactionError::NotAuthorized("Not oracle owner".into()));
                }
                if !provider.is_empty() {
                    existing.provider = provider.to_owned();
                }
                if !asset_class.is_empty() {
                    existing.asset_class = asset_class.to_owned();
                }
                if !uri.is_empty() {
                    existing.uri = uri.to_owned();
                }
                if !stamped.is_empty() {
                    existing.prices = stamped;
                }
                existing.last_update = now;
            }
            None => {
                let owned = self.owner_index.get(owner).map(Vec::len).unwrap_or(0);
                if owned >= MAX_ORACLES_PER_ACCOUNT {
                    return Err(TransactionError::LimitExceeded(format!(
                        "Max {} oracles per account",
                        MAX_ORACLES_PER_ACCOUNT
                    )));
                }
                let entry = OracleEntry {
                    oracle_id: oracle_id.clone(),
                    owner: owner.to_owned(),
                    provider: provider.to_owned(),
                    asset_class: asset_class.to_owned(),
                    uri: uri.to_owned(),
                    prices: stamped,
                    last_update: now,
                    document_id,
                };
                self.oracles.insert(oracle_id.clone(), entry);
                self.owner_index
                    .entry(owner.to_owned())
                    .or_default()
                    .push(oracle_id.clone());
                let next = self.next_document_id.get(owner).copied().unwrap_or(0);
                self.next_document_id
                    .insert(owner.to_owned(), next.max(document_id + 1));
            }
        }
        Ok(&self.oracles[&oracle_id])
    }

    /// Delete an oracle.
    pub fn delete_oracle(&mut self, owner: &str, document_id: u32) -> Result<(), TransactionError> {
        let oracle_id = Self::make_id(owner, document_id);
        let oracle = self
            .oracles
            .get(&oracle_id)
            .ok_or_else(|| TransactionError::NotFound("Oracle not found".into()))?;
        if oracle.owner != owner {
            return Err(TransactionError::NotAuthorized("Not oracle owner".into()));
        }
        self.oracles.remove(&oracle_id);
        if let Some(ids) = self.owner_index.get_mut(owner) {
            ids.retain(|id| id != &oracle_id);
        }
        Ok(())
    }

    /// Look up an oracle.
    pub fn get_oracle(&self, owner: &str, document_id: u32) -> Option<&OracleEntry> {
        self.oracles.get(&Self::make_id(owner, document_id))
    }

    /// Oracles owned by an account.
    pub fn oracles_by_owner(&self, owner: &str) -> Vec<&OracleEntry> {
        self.owner_index
            .get(owner)
            .map(|ids| ids.iter().filter_map(|id| self.oracles.get(id)).collect())
            .unwrap_or_default()
    }

    /// Aggregate the fresh prices for a pair: trimmed mean (dropping the top
    /// and bottom `trim_pct` percent) and median. Returns `None` when no
    /// oracle reports the pair within `max_age` seconds.
    pub fn aggregate_price(
        &self,
        base_asset: &str,
        quote_asset: &str,
        trim_pct: u32,
        max_age: u64,
        now: u64,
    ) -> Option<AggregatePrice> {
        let mut values: Vec<Decimal> = self
            .oracles
            .values()
            .flat_map(|o| o.prices.iter())
            .filter(|p| {
                p.base_asset == base_asset
                    && p.quote_asset == quote_asset
                    && now.saturating_sub(p.timestamp) <= max_age
            })
            .map(PriceEntry::scaled_price)
            .collect();

        if values.is_empty() {
            return None;
        }
        values.sort_unstable();

        let trim_count = values.len() * trim_pct as usize / 100;
        let trimmed: &[Decimal] = if trim_count > 0 && values.len() > 2 * trim_count {
            &values[trim_count..values.len() - trim_count]
        } else {
            &values
        };

        let mean = trimmed.iter().copied().sum::<Decimal>() / Decimal::from(trimmed.len());
        let median = if trimmed.len() % 2 == 1 {
            trimmed[trimmed.len() / 2]
        } else {
            (trimmed[trimmed.len() / 2 - 1] + trimmed[trimmed.len() / 2]) / Decimal::TWO
        };

        Some(AggregatePrice {
            base_asset: base_asset.to_owned(),
            quote_asset: quote_asset.to_owned(),
            mean,
            median,
            count: values.len(),
            trimmed_count: trimmed.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn datum(price: Decimal) -> PriceDatum {
        PriceDatum {
            base_asset: "NXF".into(),
            quote_asset: "USD".into(),
            price,
            scale: 0,
        }
    }

    #[test]
    fn set_allocates_document_ids() {
        let mut mgr = OracleManager::default();
        let a = mgr
            .set_oracle("alice", None, "p", "currency", "", &[], 1)
            .unwrap()
            .document_id;
        let b = mgr
            .set_oracle("alice", None, "p", "currency", "", &[], 2)
            .unwrap()
            .document_id;
        assert_eq!((a, b), (0, 1));
    }

    #[test]
    fn update_replaces_prices() {
        let mut mgr = OracleManager::default();
        mgr.set_oracle("alice", Some(0), "p", "", "", &[datum(dec!(2))], 1)
            .unwrap();
        mgr.set_oracle("alice", Some(0), "", "", "", &[datum(dec!(3))], 2)
            .unwrap();
        let oracle = mgr.get_oracle("alice", 0).unwrap();
        assert_eq!(oracle.prices.len(), 1);
        assert_eq!(oracle.prices[0].price, dec!(3));
        assert_eq!(oracle.provider, "p");
    }

    #[test]
    fn too_many_entries_rejected() {
        let mut mgr = OracleManager::default();
        let prices: Vec<PriceDatum> = (0..11).map(|i| datum(Decimal::from(i))).collect();
        assert!(mgr
            .set_oracle("alice", None, "", "", "", &prices, 1)
            .is_err());
    }

    #[test]
    fn aggregate_median_and_mean() {
        let mut mgr = OracleManager::default();
        for (i, price) in [dec!(1), dec!(2), dec!(3), dec!(4), dec!(100)]
            .into_iter()
            .enumerate()
        {
            mgr.set_oracle(&format!("o{}", i), None, "", "", "", &[datum(price)], 10)
                .unwrap();
        }
        let agg = mgr.aggregate_price("NXF", "USD", 20, 3600, 10).unwrap();
        assert_eq!(agg.count, 5);
        // 20% trim drops the 1 and the 100 outlier.
        assert_eq!(agg.trimmed_count, 3);
        assert_eq!(agg.median, dec!(3));
        assert_eq!(agg.mean, dec!(3));
    }

    #[test]
    fn aggregate_ignores_stale_entries() {
        let mut mgr = OracleManager::default();
        mgr.set_oracle("old", None, "", "", "", &[datum(dec!(5))], 0)
            .unwrap();
        assert!(mgr.aggregate_price("NXF", "USD", 0, 3600, 4000).is_none());
    }

    #[test]
    fn scaled_price_applies_exponent() {
        let entry = PriceEntry {
            base_asset: "NXF".into(),
            quote_asset: "USD".into(),
            price: dec!(12345),
            scale: 2,
            timestamp: 0,
        };
        assert_eq!(entry.scaled_price(), dec!(123.45));
    }
}
