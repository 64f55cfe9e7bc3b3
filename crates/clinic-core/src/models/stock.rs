//! Inventory movement models.

use serde::{Deserialize, Serialize};

/// A signed change to a product's stock count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockMovement {
    /// Storage identifier (0 until persisted)
    pub id: i64,
    pub product_id: i64,
    /// Positive for restock, negative for consumption
    pub delta: i64,
    pub reason: Option<String>,
    pub created_at: String,
}

impl StockMovement {
    pub fn new(product_id: i64, delta: i64, reason: Option<String>) -> Self {
        Self {
            id: 0,
            product_id,
            delta,
            reason,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Stock after applying this movement, or `None` if it would go negative.
    pub fn apply_to(&self, stock: i64) -> Option<i64> {
        let next = stock.checked_add(self.delta)?;
        (next >= 0).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_to() {
        assert_eq!(StockMovement::new(1, 5, None).apply_to(2), Some(7));
        assert_eq!(StockMovement::new(1, -2, None).apply_to(2), Some(0));
        assert_eq!(StockMovement::new(1, -3, None).apply_to(2), None);
    }
}
