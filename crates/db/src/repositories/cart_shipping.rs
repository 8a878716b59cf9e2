use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use storefront_core::domain::cart::{
    CartId, CartShipping, CartShippingId, NewCartShipping, ProviderId,
};

use super::{decode_error, CartShippingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartShippingRepository {
    pool: DbPool,
}

impl SqlCartShippingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(decode_error)
}

fn row_to_shipping(row: &sqlx::sqlite::SqliteRow) -> Result<CartShipping, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let cart_id: i64 = row.try_get("cart_id").map_err(decode_error)?;
    let provider_id: Option<i64> = row.try_get("provider_id").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let logistic_price: String = row.try_get("logistic_price").map_err(decode_error)?;
    let postage_fee: String = row.try_get("postage_fee").map_err(decode_error)?;
    let transit_time: Option<String> = row.try_get("transit_time").map_err(decode_error)?;

    Ok(CartShipping {
        id: CartShippingId(id),
        cart_id: CartId(cart_id),
        provider_id: provider_id.map(ProviderId),
        name,
        logistic_price: parse_decimal(&logistic_price)?,
        postage_fee: parse_decimal(&postage_fee)?,
        transit_time,
    })
}

#[async_trait::async_trait]
impl CartShippingRepository for SqlCartShippingRepository {
    async fn replace_for_cart(
        &self,
        cart_id: CartId,
        lines: Vec<NewCartShipping>,
    ) -> Result<Vec<CartShipping>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_shippings WHERE cart_id = ?")
            .bind(cart_id.0)
            .execute(&mut *tx)
            .await?;

        let mut written = Vec::with_capacity(lines.len());
        for line in lines {
            let result = sqlx::query(
                "INSERT INTO cart_shippings (cart_id, provider_id, name, logistic_price, postage_fee, transit_time)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(cart_id.0)
            .bind(line.provider_id.map(|id| id.0))
            .bind(&line.name)
            .bind(line.logistic_price.to_string())
            .bind(line.postage_fee.to_string())
            .bind(&line.transit_time)
            .execute(&mut *tx)
            .await?;
            written.push(line.into_shipping(CartShippingId(result.last_insert_rowid()), cart_id));
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn list_for_cart(&self, cart_id: CartId) -> Result<Vec<CartShipping>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, cart_id, provider_id, name, logistic_price, postage_fee, transit_time
             FROM cart_shippings
             WHERE cart_id = ?
             ORDER BY id ASC",
        )
        .bind(cart_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_shipping).collect()
    }
}
