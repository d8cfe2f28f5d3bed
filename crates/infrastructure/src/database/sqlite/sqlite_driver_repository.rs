use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use ridehail_domain::models::{Driver, GeoPoint, NewDriver, VehicleClass};
use ridehail_domain::repositories::DriverRepository;
use ridehail_errors::{DispatchError, DispatchResult};

/// 司机仓储的SQLite实现
///
/// SQLite 没有地理索引，半径查询先按在线与车型过滤，再在内存中做
/// 球面距离过滤。候选规模受半径限制，这一步的代价可以接受。
pub struct SqliteDriverRepository {
    pool: SqlitePool,
}

impl SqliteDriverRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_driver(row: &sqlx::sqlite::SqliteRow) -> DispatchResult<Driver> {
        Ok(Driver {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            vehicle: row.try_get("vehicle")?,
            location: GeoPoint::new(row.try_get("lat")?, row.try_get("lng")?),
            connection_id: row.try_get("connection_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl DriverRepository for SqliteDriverRepository {
    async fn register(&self, driver: &NewDriver) -> DispatchResult<Driver> {
        let row = sqlx::query(
            r#"
            INSERT INTO drivers (name, vehicle, lat, lng, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, vehicle, lat, lng, connection_id, created_at
            "#,
        )
        .bind(&driver.name)
        .bind(driver.vehicle)
        .bind(driver.location.lat)
        .bind(driver.location.lng)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_driver(&row)
    }

    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Driver>> {
        let row = sqlx::query(
            "SELECT id, name, vehicle, lat, lng, connection_id, created_at
             FROM drivers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_driver(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_location(&self, driver_id: i64, location: GeoPoint) -> DispatchResult<()> {
        let result = sqlx::query("UPDATE drivers SET lat = $2, lng = $3 WHERE id = $1")
            .bind(driver_id)
            .bind(location.lat)
            .bind(location.lng)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DispatchError::driver_not_found(driver_id));
        }
        Ok(())
    }

    async fn update_connection(
        &self,
        driver_id: i64,
        connection_id: Option<&str>,
    ) -> DispatchResult<()> {
        let result = sqlx::query("UPDATE drivers SET connection_id = $2 WHERE id = $1")
            .bind(driver_id)
            .bind(connection_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DispatchError::driver_not_found(driver_id));
        }
        Ok(())
    }

    async fn clear_connection(&self, connection_id: &str) -> DispatchResult<()> {
        sqlx::query("UPDATE drivers SET connection_id = NULL WHERE connection_id = $1")
            .bind(connection_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_in_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
        vehicle: Option<VehicleClass>,
    ) -> DispatchResult<Vec<Driver>> {
        let rows = sqlx::query(
            "SELECT id, name, vehicle, lat, lng, connection_id, created_at
             FROM drivers
             WHERE connection_id IS NOT NULL AND ($1 IS NULL OR vehicle = $1)
             ORDER BY id",
        )
        .bind(vehicle)
        .fetch_all(&self.pool)
        .await?;

        let mut found = Vec::new();
        for row in &rows {
            let driver = Self::row_to_driver(row)?;
            if driver.location.haversine_km(&center) <= radius_km {
                found.push(driver);
            }
        }
        Ok(found)
    }
}
