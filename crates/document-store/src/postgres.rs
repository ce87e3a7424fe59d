use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, ProductId, Role, ShippingAddress, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Account, AccountDirectory, CartLine, CartStore, InventoryLedger, Product, Result, StockLine,
    StoreError,
};

const PRODUCT_COLUMNS: &str = "SELECT id, name, price_cents, stock, sale_count, image_url FROM products";

/// PostgreSQL implementation of the ledger, carts and account directory.
///
/// Reservations are single `UPDATE ... WHERE stock >= $n` statements; a
/// checkout runs them inside one transaction and rolls back on the first
/// shortage.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: to_u32(row.try_get("stock")?, "stock")?,
            sale_count: to_u32(row.try_get("sale_count")?, "sale_count")?,
            image_url: row.try_get("image_url")?,
        })
    }

    fn row_to_account(row: PgRow) -> Result<Account> {
        let role: String = row.try_get("role")?;
        let address: Option<serde_json::Value> = row.try_get("address")?;
        Ok(Account {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: role
                .parse::<Role>()
                .map_err(|e| StoreError::CorruptRecord(e.to_string()))?,
            address: address
                .map(serde_json::from_value::<ShippingAddress>)
                .transpose()?,
        })
    }

    async fn current_stock(
        conn: &mut sqlx::PgConnection,
        product_id: ProductId,
    ) -> Result<Option<u32>> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(conn)
            .await?;
        stock.map(|s| to_u32(s, "stock")).transpose()
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::CorruptRecord(format!("{column} out of range: {value}")))
}

#[async_trait]
impl InventoryLedger for PostgresDocumentStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("{PRODUCT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let uuids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query(&format!("{PRODUCT_COLUMNS} WHERE id = ANY($1)"))
            .bind(uuids)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock, sale_count, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                sale_count = EXCLUDED.sale_count,
                image_url = EXCLUDED.image_url,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(i64::from(product.sale_count))
        .bind(&product.image_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, sale_count = sale_count + 1, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let mut conn = self.pool.acquire().await?;
        match Self::current_stock(&mut conn, product_id).await? {
            Some(_) => {
                metrics::counter!("inventory_reservation_failures_total").increment(1);
                Ok(false)
            }
            None => Err(StoreError::ProductNotFound(product_id)),
        }
    }

    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn reserve_all(&self, lines: &[StockLine]) -> Result<()> {
        // A fixed lock order keeps concurrent multi-line checkouts from deadlocking.
        let mut ordered = lines.to_vec();
        ordered.sort_by_key(|line| line.product_id);

        let mut tx = self.pool.begin().await?;

        for line in &ordered {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $2, sale_count = sale_count + 1, updated_at = NOW()
                WHERE id = $1 AND stock >= $2
                "#,
            )
            .bind(line.product_id.as_uuid())
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available = Self::current_stock(&mut tx, line.product_id).await?;
                tx.rollback().await?;
                return Err(match available {
                    Some(available) => {
                        metrics::counter!("inventory_reservation_failures_total").increment(1);
                        StoreError::InsufficientStock {
                            product_id: line.product_id,
                            requested: line.quantity,
                            available,
                        }
                    }
                    None => StoreError::ProductNotFound(line.product_id),
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + $2, sale_count = GREATEST(sale_count - 1, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id));
        }
        Ok(())
    }

    /// Releases every line or none of them; an unknown product rolls the
    /// whole batch back.
    async fn release_all(&self, lines: &[StockLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock + $2, sale_count = GREATEST(sale_count - 1, 0), updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(line.product_id.as_uuid())
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(StoreError::ProductNotFound(line.product_id));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_stock(&self, product_id: ProductId, stock: u32) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id.as_uuid())
            .bind(i64::from(stock))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id));
        }
        tracing::warn!(%product_id, stock, "stock overwritten outside the ledger");
        metrics::counter!("inventory_stock_overrides_total").increment(1);
        Ok(())
    }
}

#[async_trait]
impl CartStore for PostgresDocumentStore {
    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_lines WHERE user_id = $1 ORDER BY added_at, product_id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLine {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                })
            })
            .collect()
    }

    async fn set_line(&self, user_id: UserId, product_id: ProductId, quantity: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_lines (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn take_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        // The row locks taken by DELETE make a racing caller return nothing.
        let rows = sqlx::query(
            "DELETE FROM cart_lines WHERE user_id = $1 RETURNING product_id, quantity, added_at",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut lines = rows
            .into_iter()
            .map(|row| {
                let added_at: DateTime<Utc> = row.try_get("added_at")?;
                let line = CartLine {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                };
                Ok((added_at, line))
            })
            .collect::<Result<Vec<_>>>()?;
        lines.sort_by_key(|(added_at, line)| (*added_at, line.product_id));
        Ok(lines.into_iter().map(|(_, line)| line).collect())
    }

    async fn restore_cart(&self, user_id: UserId, lines: &[CartLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            // clock_timestamp() keeps the restored lines in their old relative order.
            sqlx::query(
                r#"
                INSERT INTO cart_lines (user_id, product_id, quantity, added_at)
                VALUES ($1, $2, $3, clock_timestamp())
                ON CONFLICT (user_id, product_id) DO NOTHING
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl AccountDirectory for PostgresDocumentStore {
    async fn account(&self, id: UserId) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, name, email, role, address FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_account).transpose()
    }

    async fn upsert_account(&self, account: Account) -> Result<()> {
        let address = account.address.as_ref().map(serde_json::to_value).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, email, role, address)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                role = EXCLUDED.role,
                address = EXCLUDED.address
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(&account.email)
        .bind(account.role.as_str())
        .bind(address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
