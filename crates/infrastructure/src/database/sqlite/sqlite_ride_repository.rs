use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use ridehail_domain::models::{GeoPoint, NewRide, Ride, RideStatus};
use ridehail_domain::repositories::RideRepository;
use ridehail_errors::{DispatchError, DispatchResult};

/// 行程仓储的SQLite实现
///
/// 所有条件写入用带守卫的 UPDATE 实现：受影响行数为 0 即守卫失败。
/// SQLite 的单语句原子性足以承担 compare-and-set 契约。
pub struct SqliteRideRepository {
    pool: SqlitePool,
}

impl SqliteRideRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_ride(row: &sqlx::sqlite::SqliteRow) -> DispatchResult<Ride> {
        let candidates_json: String = row.try_get("available_captains")?;
        let available_captains: Vec<i64> = serde_json::from_str(&candidates_json)?;

        let pickup_lat: Option<f64> = row.try_get("pickup_lat")?;
        let pickup_lng: Option<f64> = row.try_get("pickup_lng")?;
        let pickup_point = match (pickup_lat, pickup_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        };

        Ok(Ride {
            id: row.try_get("id")?,
            rider_id: row.try_get("rider_id")?,
            captain_id: row.try_get("captain_id")?,
            pickup: row.try_get("pickup")?,
            destination: row.try_get("destination")?,
            pickup_point,
            vehicle: row.try_get("vehicle")?,
            status: row.try_get("status")?,
            available_captains,
            current_captain_index: row.try_get("current_captain_index")?,
            otp: row.try_get("otp")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// 守卫失败时区分"行程不存在"和"条件不满足"
    async fn exists(&self, ride_id: i64) -> DispatchResult<bool> {
        let row = sqlx::query("SELECT 1 FROM rides WHERE id = $1")
            .bind(ride_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn guard_failed(&self, ride_id: i64) -> DispatchResult<bool> {
        if self.exists(ride_id).await? {
            Ok(false)
        } else {
            Err(DispatchError::ride_not_found(ride_id))
        }
    }
}

#[async_trait]
impl RideRepository for SqliteRideRepository {
    async fn create(&self, ride: &NewRide) -> DispatchResult<Ride> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO rides (rider_id, pickup, destination, vehicle, status,
                               available_captains, current_captain_index, otp,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', '[]', 0, $5, $6, $6)
            RETURNING id, rider_id, captain_id, pickup, destination, pickup_lat, pickup_lng,
                      vehicle, status, available_captains, current_captain_index, otp,
                      created_at, updated_at
            "#,
        )
        .bind(ride.rider_id)
        .bind(&ride.pickup)
        .bind(&ride.destination)
        .bind(ride.vehicle)
        .bind(&ride.otp)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_ride(&row)?;
        debug!("创建行程 {}，乘客 {}", created.id, created.rider_id);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Ride>> {
        let row = sqlx::query(
            "SELECT id, rider_id, captain_id, pickup, destination, pickup_lat, pickup_lng,
                    vehicle, status, available_captains, current_captain_index, otp,
                    created_at, updated_at
             FROM rides WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_ride(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_candidates_and_cursor(
        &self,
        ride_id: i64,
        pickup_point: GeoPoint,
        candidates: &[i64],
        cursor: i64,
    ) -> DispatchResult<bool> {
        let candidates_json = serde_json::to_string(candidates)?;
        let result = sqlx::query(
            r#"
            UPDATE rides
            SET pickup_lat = $2, pickup_lng = $3, available_captains = $4,
                current_captain_index = $5, updated_at = $6
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(ride_id)
        .bind(pickup_point.lat)
        .bind(pickup_point.lng)
        .bind(&candidates_json)
        .bind(cursor)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return self.guard_failed(ride_id).await;
        }
        Ok(true)
    }

    async fn advance_cursor(
        &self,
        ride_id: i64,
        expected_cursor: i64,
        new_cursor: i64,
    ) -> DispatchResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE rides
            SET current_captain_index = $3, updated_at = $4
            WHERE id = $1 AND status = 'pending' AND current_captain_index = $2
            "#,
        )
        .bind(ride_id)
        .bind(expected_cursor)
        .bind(new_cursor)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return self.guard_failed(ride_id).await;
        }
        Ok(true)
    }

    async fn compare_and_set_status(
        &self,
        ride_id: i64,
        expected_status: RideStatus,
        expected_cursor: Option<i64>,
        new_status: RideStatus,
        assigned_driver: Option<i64>,
    ) -> DispatchResult<bool> {
        let result = match expected_cursor {
            Some(cursor) => {
                sqlx::query(
                    r#"
                    UPDATE rides
                    SET status = $3, captain_id = COALESCE($4, captain_id), updated_at = $5
                    WHERE id = $1 AND status = $2 AND current_captain_index = $6
                    "#,
                )
                .bind(ride_id)
                .bind(expected_status)
                .bind(new_status)
                .bind(assigned_driver)
                .bind(Utc::now())
                .bind(cursor)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE rides
                    SET status = $3, captain_id = COALESCE($4, captain_id), updated_at = $5
                    WHERE id = $1 AND status = $2
                    "#,
                )
                .bind(ride_id)
                .bind(expected_status)
                .bind(new_status)
                .bind(assigned_driver)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return self.guard_failed(ride_id).await;
        }
        Ok(true)
    }

    async fn get_pending_rides(&self) -> DispatchResult<Vec<Ride>> {
        let rows = sqlx::query(
            "SELECT id, rider_id, captain_id, pickup, destination, pickup_lat, pickup_lng,
                    vehicle, status, available_captains, current_captain_index, otp,
                    created_at, updated_at
             FROM rides WHERE status = 'pending' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_ride).collect()
    }
}
