use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use ridehail_domain::models::{NewRider, Rider};
use ridehail_domain::repositories::RiderRepository;
use ridehail_errors::{DispatchError, DispatchResult};

/// 乘客仓储的SQLite实现
pub struct SqliteRiderRepository {
    pool: SqlitePool,
}

impl SqliteRiderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_rider(row: &sqlx::sqlite::SqliteRow) -> DispatchResult<Rider> {
        Ok(Rider {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            connection_id: row.try_get("connection_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl RiderRepository for SqliteRiderRepository {
    async fn register(&self, rider: &NewRider) -> DispatchResult<Rider> {
        let row = sqlx::query(
            r#"
            INSERT INTO riders (name, created_at)
            VALUES ($1, $2)
            RETURNING id, name, connection_id, created_at
            "#,
        )
        .bind(&rider.name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_rider(&row)
    }

    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Rider>> {
        let row = sqlx::query(
            "SELECT id, name, connection_id, created_at FROM riders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_rider(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_connection(
        &self,
        rider_id: i64,
        connection_id: Option<&str>,
    ) -> DispatchResult<()> {
        let result = sqlx::query("UPDATE riders SET connection_id = $2 WHERE id = $1")
            .bind(rider_id)
            .bind(connection_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DispatchError::rider_not_found(rider_id));
        }
        Ok(())
    }

    async fn clear_connection(&self, connection_id: &str) -> DispatchResult<()> {
        sqlx::query("UPDATE riders SET connection_id = NULL WHERE connection_id = $1")
            .bind(connection_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
