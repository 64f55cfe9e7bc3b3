//! Catalog lookup for line-item editing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::StoreError;
use crate::models::{CatalogItem, InvoiceLineItem, ItemKind};
use crate::store::CatalogStore;

/// Minimum similarity for a fuzzy name match.
const MIN_SEARCH_SCORE: f64 = 0.80;

/// Lookup errors.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid catalog identifier: {0}")]
    InvalidId(i64),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Current price and name of a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub kind: ItemKind,
    pub id: i64,
    pub name: String,
    pub unit_price: Decimal,
}

impl From<&CatalogItem> for CatalogEntry {
    fn from(item: &CatalogItem) -> Self {
        Self {
            kind: item.kind(),
            id: item.id(),
            name: item.name().to_string(),
            unit_price: item.unit_price(),
        }
    }
}

/// A search hit with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch {
    pub entry: CatalogEntry,
    /// 0.0 - 1.0, 1.0 for substring matches
    pub score: f64,
}

/// Read-only view over a catalog source.
pub struct CatalogLookup<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CatalogStore + ?Sized> CatalogLookup<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve `(kind, id)` to the item's current price and name.
    pub fn lookup(&self, kind: ItemKind, id: i64) -> LookupResult<Option<CatalogEntry>> {
        if id <= 0 {
            return Err(LookupError::InvalidId(id));
        }
        let item = self.store.get_item(kind, id)?;
        Ok(item.as_ref().map(CatalogEntry::from))
    }

    /// Bind a line to a catalog item, copying its current price and name.
    ///
    /// Returns `false` and leaves the line untouched when the item is unknown.
    /// Service lines are reset to quantity 1, as editors expect.
    pub fn select_item(
        &self,
        line: &mut InvoiceLineItem,
        kind: ItemKind,
        id: i64,
    ) -> LookupResult<bool> {
        let Some(entry) = self.lookup(kind, id)? else {
            return Ok(false);
        };

        line.item_id = Some(entry.id);
        line.kind = entry.kind;
        line.name = entry.name;
        line.unit_price = entry.unit_price;
        if kind == ItemKind::Service {
            line.quantity = 1;
        }
        Ok(true)
    }

    /// Typo-tolerant name search over one kind of item, best matches first.
    pub fn search(&self, kind: ItemKind, query: &str, limit: usize) -> LookupResult<Vec<CatalogMatch>> {
        let items: Vec<CatalogItem> = match kind {
            ItemKind::Product => self
                .store
                .list_products()?
                .into_iter()
                .map(CatalogItem::Product)
                .collect(),
            ItemKind::Service => self
                .store
                .list_soins()?
                .into_iter()
                .map(CatalogItem::Service)
                .collect(),
        };

        let query = query.trim().to_lowercase();
        let mut matches: Vec<CatalogMatch> = items
            .iter()
            .filter_map(|item| {
                let score = name_score(&query, item.name());
                (score >= MIN_SEARCH_SCORE).then(|| CatalogMatch {
                    entry: CatalogEntry::from(item),
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entry.name.cmp(&b.entry.name))
        });
        matches.truncate(limit);
        Ok(matches)
    }
}

fn name_score(query: &str, name: &str) -> f64 {
    let name = name.to_lowercase();
    if query.is_empty() || name.contains(query) {
        return 1.0;
    }
    name.split_whitespace()
        .map(|word| strsim::jaro_winkler(query, word))
        .fold(strsim::jaro_winkler(query, &name), f64::max)
}
