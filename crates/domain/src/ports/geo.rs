use async_trait::async_trait;

use crate::models::GeoPoint;
use ridehail_errors::DispatchResult;

/// 地理编码抽象接口，由外部协作方实现
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// 将上车地址解析为坐标
    async fn resolve(&self, address: &str) -> DispatchResult<GeoPoint>;
}
