//! 地理索引
//!
//! 回答"上车点半径 R 内有哪些可接单司机"。底层的地理查询由司机仓储
//! 提供，这里只是派单器面向的薄封装。

use std::sync::Arc;

use ridehail_domain::models::{Driver, GeoPoint, VehicleClass};
use ridehail_domain::repositories::DriverRepository;
use ridehail_errors::DispatchResult;

pub struct GeoIndex {
    driver_repo: Arc<dyn DriverRepository>,
}

impl GeoIndex {
    pub fn new(driver_repo: Arc<dyn DriverRepository>) -> Self {
        Self { driver_repo }
    }

    /// 半径内、指定车型、当前在线的司机；空结果是正常情况
    pub async fn find_nearby(
        &self,
        center: GeoPoint,
        radius_km: f64,
        vehicle: Option<VehicleClass>,
    ) -> DispatchResult<Vec<Driver>> {
        self.driver_repo
            .get_in_radius(center, radius_km, vehicle)
            .await
    }
}
