//! 静态地理编码
//!
//! 真实部署里地址解析走外部地理编码服务；这里提供一个表驱动实现，
//! 未命中时退回固定坐标，与上游服务不可用时的兜底行为一致。

use std::collections::HashMap;

use async_trait::async_trait;

use ridehail_domain::models::GeoPoint;
use ridehail_domain::ports::GeoLookup;
use ridehail_errors::DispatchResult;

pub struct StaticGeoLookup {
    table: HashMap<String, GeoPoint>,
    fallback: GeoPoint,
}

impl StaticGeoLookup {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            // 上游地理编码失败时的兜底坐标
            fallback: GeoPoint::new(30.08917, 31.18961),
        }
    }

    pub fn with_address(mut self, address: &str, point: GeoPoint) -> Self {
        self.table.insert(address.to_string(), point);
        self
    }

    pub fn with_fallback(mut self, fallback: GeoPoint) -> Self {
        self.fallback = fallback;
        self
    }
}

impl Default for StaticGeoLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeoLookup for StaticGeoLookup {
    async fn resolve(&self, address: &str) -> DispatchResult<GeoPoint> {
        Ok(self.table.get(address).copied().unwrap_or(self.fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_address_resolves_from_table() {
        let lookup =
            StaticGeoLookup::new().with_address("Tahrir Square", GeoPoint::new(30.0444, 31.2357));

        let point = lookup.resolve("Tahrir Square").await.unwrap();
        assert_eq!(point, GeoPoint::new(30.0444, 31.2357));
    }

    #[tokio::test]
    async fn test_unknown_address_falls_back() {
        let lookup = StaticGeoLookup::new();
        let point = lookup.resolve("Nowhere Street").await.unwrap();
        assert_eq!(point, GeoPoint::new(30.08917, 31.18961));
    }
}
