//! Locally persisted cart

use serde_json::Value;
use std::sync::Arc;
use tracing::{trace, warn};

use storefront_cache_core::{CacheError, LocalStore, Result};

use super::lines::{CartLine, merge_lines};

/// Storage key the cart lives under
pub const CART_KEY: &str = "cart";

/// Cart kept in client-side storage until reconciliation
///
/// Lines are stored merged, one per (product, size). The store handle is
/// shared so the cart can sit next to other documents in the same backend.
pub struct LocalCart<S: LocalStore> {
    store: Arc<S>,
}

impl<S: LocalStore> Clone for LocalCart<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LocalStore> LocalCart<S> {
    pub fn new(store: S) -> Self {
        Self::with_shared(Arc::new(store))
    }

    pub fn with_shared(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current lines, in the order they were first added
    ///
    /// Stored lines that fail validation, such as a zero quantity, are
    /// skipped.
    pub async fn lines(&self) -> Result<Vec<CartLine>> {
        let stored: Vec<CartLine> = match self.store.get(CART_KEY).await? {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| CacheError::Storage(format!("stored cart is corrupt: {e}")))?,
        };
        Ok(stored
            .into_iter()
            .filter(|line| match line.validate() {
                Ok(()) => true,
                Err(err) => {
                    warn!(target: "storefront_cache", error = %err, "skipping invalid stored cart line");
                    false
                }
            })
            .collect())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.lines().await?.is_empty())
    }

    /// Add a line, merging with an existing line for the same item
    pub async fn add(&self, line: CartLine) -> Result<Vec<CartLine>> {
        line.validate()?;
        let mut lines = self.lines().await?;
        lines.push(line);
        self.save(merge_lines(lines)).await
    }

    /// Set the quantity of an item; zero removes it
    pub async fn set_quantity(&self, product_id: &str, size: &str, quantity: u32) -> Result<Vec<CartLine>> {
        let mut lines = self.lines().await?;
        let Some(pos) = lines
            .iter()
            .position(|l| l.product_id == product_id && l.size == size)
        else {
            return Err(CacheError::InvalidInput(format!(
                "{product_id}/{size} is not in the cart"
            )));
        };
        if quantity == 0 {
            lines.remove(pos);
        } else {
            lines[pos].quantity = quantity;
        }
        self.save(lines).await
    }

    /// Remove an item; returns whether it was present
    pub async fn remove(&self, product_id: &str, size: &str) -> Result<bool> {
        let mut lines = self.lines().await?;
        let before = lines.len();
        lines.retain(|l| !(l.product_id == product_id && l.size == size));
        if lines.len() == before {
            return Ok(false);
        }
        self.save(lines).await?;
        Ok(true)
    }

    /// Replace all lines
    pub async fn replace(&self, lines: Vec<CartLine>) -> Result<Vec<CartLine>> {
        for line in &lines {
            line.validate()?;
        }
        self.save(merge_lines(lines)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.remove(CART_KEY).await?;
        trace!(target: "storefront_cache", "local cart cleared");
        Ok(())
    }

    async fn save(&self, lines: Vec<CartLine>) -> Result<Vec<CartLine>> {
        let value = serde_json::to_value(&lines)
            .map_err(|e| CacheError::Internal(format!("cart not serializable: {e}")))?;
        self.store.set(CART_KEY, value).await?;
        trace!(target: "storefront_cache", lines = lines.len(), "local cart saved");
        Ok(lines)
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use serde_json::json;
    use storefront_cache_storage::MemoryStore;

    fn line(id: &str, qty: u32, size: &str) -> CartLine {
        CartLine::new(id, qty, size).unwrap()
    }

    #[tokio::test]
    async fn test_add_merges() {
        let cart = LocalCart::new(MemoryStore::with_defaults());
        cart.add(line("P1", 2, "M")).await.unwrap();
        cart.add(line("P2", 1, "S")).await.unwrap();
        let lines = cart.add(line("P1", 1, "M")).await.unwrap();

        assert_eq!(lines, vec![line("P1", 3, "M"), line("P2", 1, "S")]);
        assert_eq!(cart.lines().await.unwrap(), lines);
    }

    #[tokio::test]
    async fn test_persisted_format() {
        let cart = LocalCart::new(MemoryStore::with_defaults());
        cart.add(line("P1", 2, "M")).await.unwrap();

        let stored = cart.store().get(CART_KEY).await.unwrap();
        assert_eq!(
            stored,
            Some(json!([{"productId": "P1", "quantity": 2, "size": "M"}]))
        );
    }

    #[tokio::test]
    async fn test_set_quantity_and_remove() {
        let cart = LocalCart::new(MemoryStore::with_defaults());
        cart.add(line("P1", 2, "M")).await.unwrap();
        cart.add(line("P2", 1, "S")).await.unwrap();

        let lines = cart.set_quantity("P1", "M", 5).await.unwrap();
        assert_eq!(lines[0].quantity, 5);

        let lines = cart.set_quantity("P1", "M", 0).await.unwrap();
        assert_eq!(lines, vec![line("P2", 1, "S")]);

        assert!(cart.remove("P2", "S").await.unwrap());
        assert!(!cart.remove("P2", "S").await.unwrap());
        assert!(cart.is_empty().await.unwrap());

        assert!(matches!(
            cart.set_quantity("P9", "M", 1).await.unwrap_err(),
            CacheError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_stored_lines_skipped() {
        let store = MemoryStore::with_defaults();
        store
            .set(
                CART_KEY,
                json!([
                    {"productId": "P1", "quantity": 0, "size": "M"},
                    {"productId": "", "quantity": 2, "size": "M"},
                    {"productId": "P2", "quantity": 1, "size": "S"}
                ]),
            )
            .await
            .unwrap();
        let cart = LocalCart::new(store);

        assert_eq!(cart.lines().await.unwrap(), vec![line("P2", 1, "S")]);

        // The next write drops them from storage too
        cart.add(line("P3", 1, "L")).await.unwrap();
        assert_eq!(
            cart.store().get(CART_KEY).await.unwrap().unwrap().as_array().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_corrupt_cart_is_storage_error() {
        let store = MemoryStore::with_defaults();
        store.set(CART_KEY, json!({"not": "a cart"})).await.unwrap();
        let cart = LocalCart::new(store);

        assert!(matches!(
            cart.lines().await.unwrap_err(),
            CacheError::Storage(_)
        ));
    }
}
