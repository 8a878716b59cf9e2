use sqlx::Row;

use storefront_core::domain::warehouse::{Warehouse, WarehouseId, WeightTier};

use super::cart_shipping::parse_decimal;
use super::{decode_error, RepositoryError, WarehouseRepository};
use crate::DbPool;

pub struct SqlWarehouseRepository {
    pool: DbPool,
}

impl SqlWarehouseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_warehouse(row: &sqlx::sqlite::SqliteRow) -> Result<Warehouse, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let country_code: Option<String> = row.try_get("country_code").map_err(decode_error)?;
    let is_default: bool = row.try_get("is_default").map_err(decode_error)?;
    let carrier_name: String = row.try_get("carrier_name").map_err(decode_error)?;
    let weight_tiers: String = row.try_get("weight_tiers").map_err(decode_error)?;
    let extra_kg_price: String = row.try_get("extra_kg_price").map_err(decode_error)?;

    Ok(Warehouse {
        id: WarehouseId(id),
        name,
        country_code,
        is_default,
        carrier_name,
        weight_tiers: serde_json::from_str::<Vec<WeightTier>>(&weight_tiers)
            .map_err(decode_error)?,
        extra_kg_price: parse_decimal(&extra_kg_price)?,
    })
}

#[async_trait::async_trait]
impl WarehouseRepository for SqlWarehouseRepository {
    async fn default_warehouse(&self) -> Result<Option<Warehouse>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, country_code, is_default, carrier_name, weight_tiers, extra_kg_price
             FROM warehouses
             WHERE is_default = 1
             ORDER BY id ASC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_warehouse).transpose()
    }

    async fn save(&self, warehouse: Warehouse) -> Result<(), RepositoryError> {
        let tiers = serde_json::to_string(&warehouse.weight_tiers).map_err(decode_error)?;

        sqlx::query(
            "INSERT INTO warehouses (id, name, country_code, is_default, carrier_name, weight_tiers, extra_kg_price)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                country_code = excluded.country_code,
                is_default = excluded.is_default,
                carrier_name = excluded.carrier_name,
                weight_tiers = excluded.weight_tiers,
                extra_kg_price = excluded.extra_kg_price",
        )
        .bind(warehouse.id.0)
        .bind(&warehouse.name)
        .bind(&warehouse.country_code)
        .bind(warehouse.is_default)
        .bind(&warehouse.carrier_name)
        .bind(tiers)
        .bind(warehouse.extra_kg_price.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use storefront_core::domain::warehouse::{Warehouse, WarehouseId, WeightTier};

    use super::SqlWarehouseRepository;
    use crate::repositories::WarehouseRepository;
    use crate::{connect_with_settings, migrations};

    fn warehouse(id: i64, is_default: bool) -> Warehouse {
        Warehouse {
            id: WarehouseId(id),
            name: format!("WH-{id}"),
            country_code: Some("US".to_string()),
            is_default,
            carrier_name: "Local Carrier".to_string(),
            weight_tiers: vec![
                WeightTier { max_kg: Decimal::new(5, 1), price: Decimal::new(300, 2) },
                WeightTier { max_kg: Decimal::ONE, price: Decimal::new(500, 2) },
            ],
            extra_kg_price: Decimal::new(150, 2),
        }
    }

    #[tokio::test]
    async fn default_warehouse_round_trips_tiers() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlWarehouseRepository::new(pool);

        assert!(repo.default_warehouse().await.expect("empty").is_none());

        repo.save(warehouse(1, false)).await.expect("save 1");
        repo.save(warehouse(2, true)).await.expect("save 2");

        let found = repo.default_warehouse().await.expect("load").expect("default exists");
        assert_eq!(found, warehouse(2, true));
    }

    #[tokio::test]
    async fn save_updates_existing_warehouse() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlWarehouseRepository::new(pool);

        repo.save(warehouse(1, true)).await.expect("save");
        let mut updated = warehouse(1, true);
        updated.extra_kg_price = Decimal::new(200, 2);
        repo.save(updated.clone()).await.expect("update");

        assert_eq!(repo.default_warehouse().await.expect("load"), Some(updated));
    }
}
