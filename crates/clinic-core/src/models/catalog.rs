//! Billable catalog models (products and soins).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Discriminates the two kinds of billable goods ("biens").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Physical product held in stock
    Product,
    /// Clinical service (soin)
    Service,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Product => "product",
            ItemKind::Service => "service",
        }
    }

    /// Parse the wire discriminator. Anything but the two variants is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "product" => Some(ItemKind::Product),
            "service" => Some(ItemKind::Service),
            _ => None,
        }
    }
}

/// Fixed set of soin categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SoinCategory {
    Consultation,
    Therapie,
    Esthetique,
    Bilan,
    Autre,
}

impl SoinCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoinCategory::Consultation => "consultation",
            SoinCategory::Therapie => "therapie",
            SoinCategory::Esthetique => "esthetique",
            SoinCategory::Bilan => "bilan",
            SoinCategory::Autre => "autre",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "consultation" => Some(SoinCategory::Consultation),
            "therapie" => Some(SoinCategory::Therapie),
            "esthetique" => Some(SoinCategory::Esthetique),
            "bilan" => Some(SoinCategory::Bilan),
            "autre" => Some(SoinCategory::Autre),
            _ => None,
        }
    }
}

/// A stocked product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Positive integer identifier (0 until persisted)
    pub id: i64,
    /// Display name
    pub name: String,
    /// Current unit price, never negative
    pub unit_price: Decimal,
    /// Units on hand, never negative
    pub stock: i64,
    pub description: Option<String>,
}

impl Product {
    pub fn new(name: String, unit_price: Decimal) -> Self {
        Self {
            id: 0,
            name,
            unit_price,
            stock: 0,
            description: None,
        }
    }
}

/// A billable clinical service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Soin {
    /// Positive integer identifier (0 until persisted)
    pub id: i64,
    /// Display name
    pub name: String,
    /// Current unit price, never negative
    pub unit_price: Decimal,
    pub category: SoinCategory,
    pub description: Option<String>,
}

impl Soin {
    pub fn new(name: String, unit_price: Decimal, category: SoinCategory) -> Self {
        Self {
            id: 0,
            name,
            unit_price,
            category,
            description: None,
        }
    }
}

/// Either kind of billable item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogItem {
    Product(Product),
    Service(Soin),
}

impl CatalogItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            CatalogItem::Product(_) => ItemKind::Product,
            CatalogItem::Service(_) => ItemKind::Service,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            CatalogItem::Product(p) => p.id,
            CatalogItem::Service(s) => s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CatalogItem::Product(p) => &p.name,
            CatalogItem::Service(s) => &s.name,
        }
    }

    pub fn unit_price(&self) -> Decimal {
        match self {
            CatalogItem::Product(p) => p.unit_price,
            CatalogItem::Service(s) => s.unit_price,
        }
    }

    /// Check the shared catalog invariants (non-negative price and stock).
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.unit_price() < Decimal::ZERO {
            return Err(format!("Negative price for {}", self.name()));
        }
        if let CatalogItem::Product(p) = self {
            if p.stock < 0 {
                return Err(format!("Negative stock for {}", p.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_parse() {
        assert_eq!(ItemKind::parse("product"), Some(ItemKind::Product));
        assert_eq!(ItemKind::parse("service"), Some(ItemKind::Service));
        assert_eq!(ItemKind::parse("Product"), None);
        assert_eq!(ItemKind::parse("soin"), None);
    }

    #[test]
    fn test_catalog_item_accessors() {
        let item = CatalogItem::Service(Soin::new(
            "Hijama".into(),
            Decimal::new(25000, 2),
            SoinCategory::Therapie,
        ));
        assert_eq!(item.kind(), ItemKind::Service);
        assert_eq!(item.name(), "Hijama");
        assert_eq!(item.unit_price(), Decimal::new(250, 0));
    }

    #[test]
    fn test_invariants() {
        let mut product = Product::new("Omega 3".into(), Decimal::new(1999, 2));
        assert!(CatalogItem::Product(product.clone()).check_invariants().is_ok());

        product.stock = -1;
        assert!(CatalogItem::Product(product.clone()).check_invariants().is_err());

        product.stock = 0;
        product.unit_price = Decimal::new(-1, 0);
        assert!(CatalogItem::Product(product).check_invariants().is_err());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ItemKind::Service).unwrap();
        assert_eq!(json, "\"service\"");
    }
}
