//! 候选司机排序
//!
//! 对地理索引返回的司机按与上车点的平方欧氏距离升序排序。
//! 只关心相对远近，不计算真实球面距离；距离相同时保持输入顺序，
//! 因此相同输入必得相同输出。

use ridehail_domain::models::{Driver, GeoPoint};

/// 参与派单的候选司机，距离仅用于排序，不落库
#[derive(Debug, Clone)]
pub struct Candidate {
    pub driver_id: i64,
    pub connection_id: Option<String>,
    pub squared_distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateRanker;

impl CandidateRanker {
    pub fn new() -> Self {
        Self
    }

    /// 过滤掉没有活跃连接的司机，按到上车点的平方欧氏距离升序排列。
    /// 空输入得到空列表，这是正常结果而不是错误。
    pub fn rank(&self, pickup: GeoPoint, drivers: &[Driver]) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = drivers
            .iter()
            .filter(|driver| driver.is_reachable())
            .map(|driver| Candidate {
                driver_id: driver.id,
                connection_id: driver.connection_id.clone(),
                squared_distance: driver.location.squared_degree_distance(&pickup),
            })
            .collect();

        // sort_by 是稳定排序，距离相同时保持输入顺序
        candidates.sort_by(|a, b| {
            a.squared_distance
                .partial_cmp(&b.squared_distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        candidates
    }
}
