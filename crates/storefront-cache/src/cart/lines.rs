//! Cart line types

use serde::{Deserialize, Serialize};

use storefront_cache_core::{CacheError, Result};

/// A client-held cart line: what the shopper intends to buy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
    pub size: String,
}

impl CartLine {
    /// Create a line, rejecting a zero quantity
    pub fn new(product_id: impl Into<String>, quantity: u32, size: impl Into<String>) -> Result<Self> {
        let line = Self {
            product_id: product_id.into(),
            quantity,
            size: size.into(),
        };
        line.validate()?;
        Ok(line)
    }

    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(CacheError::InvalidInput(format!(
                "cart line {}/{} has quantity 0",
                self.product_id, self.size
            )));
        }
        if self.product_id.is_empty() {
            return Err(CacheError::InvalidInput("cart line without product id".into()));
        }
        Ok(())
    }

    /// Whether both lines are for the same product and size
    pub fn same_item(&self, other: &CartLine) -> bool {
        self.product_id == other.product_id && self.size == other.size
    }
}

/// Merge lines for the same (product, size) by summing quantities
///
/// Keeps the position of each item's first appearance.
pub fn merge_lines<I>(lines: I) -> Vec<CartLine>
where
    I: IntoIterator<Item = CartLine>,
{
    let mut merged: Vec<CartLine> = Vec::new();
    for line in lines {
        match merged.iter_mut().find(|m| m.same_item(&line)) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line),
        }
    }
    merged
}

/// Promotion active on a product at lookup time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Discount in percent, if the promotion is a percentage off
    #[serde(default)]
    pub discount_percent: Option<u8>,
}

/// Arguments of the product lookup used during reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub product_id: String,
    pub size: String,
}

impl From<&CartLine> for ProductQuery {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            size: line.size.clone(),
        }
    }
}

/// Server view of one product in one size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub product_id: String,
    /// Price in minor currency units
    pub unit_price: u64,
    pub available_quantity: u32,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
}

/// A cart line confirmed against server price and stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledCartLine {
    pub product_id: String,
    pub quantity: u32,
    pub size: String,
    pub unit_price: u64,
    pub available_quantity: u32,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
}

impl ReconciledCartLine {
    /// Confirm `line` against `product`
    ///
    /// Returns `None` when nothing is in stock or the line is empty.
    /// Quantity is clamped to what is available.
    pub fn confirm(line: &CartLine, product: &ProductSnapshot) -> Option<Self> {
        if line.quantity == 0 || product.available_quantity == 0 {
            return None;
        }
        Some(Self {
            product_id: line.product_id.clone(),
            quantity: line.quantity.min(product.available_quantity),
            size: line.size.clone(),
            unit_price: product.unit_price,
            available_quantity: product.available_quantity,
            promotions: product.promotions.clone(),
        })
    }

    /// Quantity times unit price
    pub fn line_total(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(price: u64, available: u32) -> ProductSnapshot {
        ProductSnapshot {
            product_id: "P1".into(),
            unit_price: price,
            available_quantity: available,
            promotions: Vec::new(),
        }
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let err = CartLine::new("P1", 0, "M").unwrap_err();
        assert!(matches!(err, CacheError::InvalidInput(_)));
    }

    #[test]
    fn test_merge_sums_duplicates_in_first_order() {
        let merged = merge_lines(vec![
            CartLine::new("P1", 2, "M").unwrap(),
            CartLine::new("P2", 1, "L").unwrap(),
            CartLine::new("P1", 1, "M").unwrap(),
            CartLine::new("P1", 1, "S").unwrap(),
        ]);
        assert_eq!(
            merged,
            vec![
                CartLine::new("P1", 3, "M").unwrap(),
                CartLine::new("P2", 1, "L").unwrap(),
                CartLine::new("P1", 1, "S").unwrap(),
            ]
        );
    }

    #[test]
    fn test_confirm_clamps_and_drops() {
        let line = CartLine::new("P1", 12, "M").unwrap();
        let confirmed = ReconciledCartLine::confirm(&line, &product(500, 10)).unwrap();
        assert_eq!(confirmed.quantity, 10);
        assert_eq!(confirmed.line_total(), 5000);

        assert!(ReconciledCartLine::confirm(&line, &product(500, 0)).is_none());

        let empty = CartLine {
            product_id: "P1".into(),
            quantity: 0,
            size: "M".into(),
        };
        assert!(ReconciledCartLine::confirm(&empty, &product(500, 10)).is_none());
    }

    #[test]
    fn test_wire_format() {
        let line = ReconciledCartLine::confirm(&CartLine::new("P1", 3, "M").unwrap(), &product(500, 10))
            .unwrap();
        assert_eq!(
            serde_json::to_value(&line).unwrap(),
            json!({
                "productId": "P1",
                "quantity": 3,
                "size": "M",
                "unitPrice": 500,
                "availableQuantity": 10,
                "promotions": []
            })
        );
    }
}
