//! 启动恢复
//!
//! 进程在派单中途崩溃时，行程停留在最后一次持久化的状态：游标已落库
//! 但报价可能没有送出。启动扫描把所有 pending 行程恢复到报价循环，
//! 不让行程永久卡死。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info};

use ridehail_domain::repositories::RideRepository;
use ridehail_errors::DispatchResult;

use crate::sequencer::DispatchSequencer;

/// 恢复服务接口
#[async_trait]
pub trait RecoveryService: Send + Sync {
    /// 系统启动时恢复所有 pending 行程
    async fn recover_pending_rides(&self) -> DispatchResult<RecoveryReport>;
}

/// 恢复报告
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// 从持久化游标处继续报价的行程
    pub resumed: Vec<i64>,
    /// 崩溃发生在候选排序前、重新走完整派单流程的行程
    pub redispatched: Vec<i64>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// 恢复服务实现
pub struct DispatchRecoveryService {
    ride_repo: Arc<dyn RideRepository>,
    sequencer: Arc<DispatchSequencer>,
}

impl DispatchRecoveryService {
    pub fn new(ride_repo: Arc<dyn RideRepository>, sequencer: Arc<DispatchSequencer>) -> Self {
        Self {
            ride_repo,
            sequencer,
        }
    }
}

#[async_trait]
impl RecoveryService for DispatchRecoveryService {
    async fn recover_pending_rides(&self) -> DispatchResult<RecoveryReport> {
        let start = Instant::now();
        info!("开始恢复 pending 行程");

        let pending = self.ride_repo.get_pending_rides().await?;
        let mut report = RecoveryReport::default();

        for ride in pending {
            // 候选列表为空说明崩溃发生在排序落库之前，重新派单
            if ride.available_captains.is_empty() {
                match self.sequencer.dispatch_ride(ride.id).await {
                    Ok(()) => report.redispatched.push(ride.id),
                    Err(e) => {
                        error!("重新派单行程 {} 失败: {}", ride.id, e);
                        report.errors.push(format!("行程 {}: {}", ride.id, e));
                    }
                }
            } else {
                match self.sequencer.resume_offering(ride.id).await {
                    Ok(()) => report.resumed.push(ride.id),
                    Err(e) => {
                        error!("恢复行程 {} 的报价失败: {}", ride.id, e);
                        report.errors.push(format!("行程 {}: {}", ride.id, e));
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "恢复完成: 续派 {} 个，重派 {} 个，失败 {} 个，耗时 {}ms",
            report.resumed.len(),
            report.redispatched.len(),
            report.errors.len(),
            report.duration_ms
        );
        Ok(report)
    }
}
