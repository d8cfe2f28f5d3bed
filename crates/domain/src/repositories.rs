//! 数据仓储层接口定义
//!
//! 行程仓储是派单器的唯一事实来源：所有写入都带期望值条件
//! （compare-and-set 语义），因此派单器不需要额外的锁管理器。
//! 条件不满足返回 `false`，表示并发事件已抢先，这不是错误。

use async_trait::async_trait;

use crate::models::{Driver, GeoPoint, NewDriver, NewRide, NewRider, Ride, Rider, RideStatus, VehicleClass};
use ridehail_errors::DispatchResult;

/// 行程仓储接口
///
/// 行程记录只能由派单器（游标推进、状态转移）和司机确认操作修改。
/// 所有实现必须保证每个条件写入是原子的：行版本、条件 UPDATE
/// 或事务都满足该契约。
#[async_trait]
pub trait RideRepository: Send + Sync {
    /// 创建新行程，初始状态为 pending、候选列表为空
    async fn create(&self, ride: &NewRide) -> DispatchResult<Ride>;

    /// 根据ID获取行程
    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Ride>>;

    /// 写入排序后的候选列表、上车点坐标与初始游标。
    /// 仅在行程仍为 pending 时生效；返回是否写入成功。
    async fn set_candidates_and_cursor(
        &self,
        ride_id: i64,
        pickup_point: GeoPoint,
        candidates: &[i64],
        cursor: i64,
    ) -> DispatchResult<bool>;

    /// 条件推进游标：仅当行程仍为 pending 且游标等于 `expected_cursor`
    /// 时写入 `new_cursor`。返回 `false` 表示并发事件已改变状态。
    async fn advance_cursor(
        &self,
        ride_id: i64,
        expected_cursor: i64,
        new_cursor: i64,
    ) -> DispatchResult<bool>;

    /// 条件状态转移，状态变更的唯一入口。
    ///
    /// 仅当当前状态等于 `expected_status`（且在给出 `expected_cursor`
    /// 时游标也未变）才写入 `new_status`；`assigned_driver` 在接单
    /// 转移时同步落库。返回 `false` 表示守卫失败。
    async fn compare_and_set_status(
        &self,
        ride_id: i64,
        expected_status: RideStatus,
        expected_cursor: Option<i64>,
        new_status: RideStatus,
        assigned_driver: Option<i64>,
    ) -> DispatchResult<bool>;

    /// 获取所有 pending 行程，供启动恢复扫描使用
    async fn get_pending_rides(&self) -> DispatchResult<Vec<Ride>>;
}

/// 司机仓储接口
///
/// 半径查询只返回持有活跃连接的司机，这是地理索引的外部协作方。
#[async_trait]
pub trait DriverRepository: Send + Sync {
    async fn register(&self, driver: &NewDriver) -> DispatchResult<Driver>;

    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Driver>>;

    async fn update_location(&self, driver_id: i64, location: GeoPoint) -> DispatchResult<()>;

    /// 连接建立/断开时更新推送连接标识
    async fn update_connection(
        &self,
        driver_id: i64,
        connection_id: Option<&str>,
    ) -> DispatchResult<()>;

    /// 按连接标识清除连接（断线回调，司机侧未知时使用）
    async fn clear_connection(&self, connection_id: &str) -> DispatchResult<()>;

    /// 半径内（公里）、指定车型、且当前在线的司机
    async fn get_in_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
        vehicle: Option<VehicleClass>,
    ) -> DispatchResult<Vec<Driver>>;
}

/// 乘客仓储接口
#[async_trait]
pub trait RiderRepository: Send + Sync {
    async fn register(&self, rider: &NewRider) -> DispatchResult<Rider>;

    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Rider>>;

    async fn update_connection(
        &self,
        rider_id: i64,
        connection_id: Option<&str>,
    ) -> DispatchResult<()>;

    async fn clear_connection(&self, connection_id: &str) -> DispatchResult<()>;
}
