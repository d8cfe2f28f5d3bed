//! 数据库连接与表结构管理

pub mod sqlite;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use ridehail_errors::{DispatchError, DispatchResult};

/// 创建SQLite连接池
pub async fn create_pool(url: &str, max_connections: u32) -> DispatchResult<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .map_err(DispatchError::Database)
}

/// 初始化表结构（幂等）
pub async fn init_schema(pool: &SqlitePool) -> DispatchResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rides (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rider_id INTEGER NOT NULL,
            captain_id INTEGER,
            pickup TEXT NOT NULL,
            destination TEXT NOT NULL,
            pickup_lat REAL,
            pickup_lng REAL,
            vehicle TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            available_captains TEXT NOT NULL DEFAULT '[]',
            current_captain_index INTEGER NOT NULL DEFAULT 0,
            otp TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            vehicle TEXT NOT NULL,
            lat REAL NOT NULL DEFAULT 0,
            lng REAL NOT NULL DEFAULT 0,
            connection_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS riders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            connection_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_rides_status ON rides(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_drivers_connection ON drivers(connection_id)")
        .execute(pool)
        .await?;

    Ok(())
}
