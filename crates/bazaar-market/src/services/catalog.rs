//! # Catalog & Cart
//!
//! Just enough of the product catalog for checkout: sellers list products,
//! admins block them, buyers collect them in a cart.

use std::sync::Arc;
use tracing::info;

use bazaar_core::validation::{validate_cart_size, validate_price_cents, validate_quantity, validate_title};
use bazaar_core::{CartItem, CartView, CoreError, Product, ProductStatus, ValidationError, MAX_ITEM_QUANTITY};
use bazaar_db::Database;

use crate::clock::Clock;
use crate::error::MarketResult;

#[derive(Debug, Clone)]
pub struct CatalogService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        CatalogService { db, clock }
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(&self, seller_id: &str, title: &str, price_cents: i64) -> MarketResult<Product> {
        let title = validate_title(title)?;
        validate_price_cents(price_cents)?;

        let product = self
            .db
            .products()
            .create(seller_id, &title, price_cents, self.clock.now())
            .await?;
        info!(product_id = %product.id, seller_id = %seller_id, price = price_cents, "Product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: &str) -> MarketResult<Product> {
        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Admin block/unblock.
    pub async fn set_product_status(&self, id: &str, status: ProductStatus) -> MarketResult<Product> {
        if !self.db.products().set_status(id, status, self.clock.now()).await? {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }
        info!(product_id = %id, %status, "Product status changed");
        self.get_product(id).await
    }

    // =========================================================================
    // Cart
    // =========================================================================

    pub async fn get_cart(&self, user_id: &str) -> MarketResult<CartView> {
        let items = self.db.carts().list(user_id).await?;
        Ok(CartView::new(items)?)
    }

    /// Adds a product; adding it again raises the quantity and keeps the
    /// price captured the first time.
    pub async fn add_to_cart(&self, user_id: &str, product_id: &str, quantity: i64) -> MarketResult<CartItem> {
        validate_quantity(quantity)?;

        let product = self.get_product(product_id).await?;
        if !product.is_purchasable() {
            return Err(CoreError::ProductUnavailable { title: product.title }.into());
        }

        let carts = self.db.carts();
        match carts.find(user_id, product_id).await? {
            Some(existing) => {
                if existing.quantity + quantity > MAX_ITEM_QUANTITY {
                    return Err(ValidationError::OutOfRange {
                        field: "quantity".to_string(),
                        min: 1,
                        max: MAX_ITEM_QUANTITY,
                    }
                    .into());
                }
            }
            None => {
                let count = carts.count(user_id).await?;
                validate_cart_size(count as usize).map_err(|_| CoreError::CartTooLarge {
                    max: bazaar_core::MAX_CART_ITEMS,
                })?;
            }
        }

        Ok(carts
            .add(user_id, product_id, quantity, product.price_cents, self.clock.now())
            .await?)
    }

    pub async fn remove_item(&self, user_id: &str, item_id: &str) -> MarketResult<()> {
        if !self.db.carts().remove(user_id, item_id).await? {
            return Err(CoreError::CartItemNotFound(item_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn clear_cart(&self, user_id: &str) -> MarketResult<u64> {
        Ok(self.db.carts().clear(user_id).await?)
    }
}
