//! 派单状态机
//!
//! 每个行程的派单流程：排序候选 → 逐个报价 → 接受/拒绝/超时/不可达
//! 推进 → 收敛到 accepted 或 cancelled。同一时刻一个行程最多一份
//! 未决报价，"先接先得"只依赖行程记录上的条件写入，不需要跨司机的
//! 分布式锁。行内记录是唯一权威状态，进程内不保存任何共享可变结构。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use ridehail_domain::events::{PushMessage, RideEvent};
use ridehail_domain::models::{GeoPoint, NewRide, Ride, RideStatus, VehicleClass};
use ridehail_domain::ports::{ConnectionRegistry, GeoLookup, PushChannel};
use ridehail_domain::repositories::{DriverRepository, RideRepository, RiderRepository};
use ridehail_errors::{DispatchError, DispatchResult};
use ridehail_infrastructure::MetricsCollector;

use crate::geo_index::GeoIndex;
use crate::ranking::{Candidate, CandidateRanker};

#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// 每位候选司机的报价等待窗口
    pub offer_timeout: Duration,
    /// 候选搜索半径（公里）
    pub search_radius_km: f64,
    /// 取消广播半径（公里）
    pub cancel_broadcast_radius_km: f64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            offer_timeout: Duration::from_secs(30),
            search_radius_km: 10.0,
            cancel_broadcast_radius_km: 4.0,
        }
    }
}

/// 创建行程的输入
#[derive(Debug, Clone)]
pub struct CreateRideRequest {
    pub rider_id: i64,
    pub pickup: String,
    pub destination: String,
    pub vehicle: VehicleClass,
}

pub struct DispatchSequencer {
    ride_repo: Arc<dyn RideRepository>,
    driver_repo: Arc<dyn DriverRepository>,
    rider_repo: Arc<dyn RiderRepository>,
    push: Arc<dyn PushChannel>,
    registry: Arc<dyn ConnectionRegistry>,
    geo_lookup: Arc<dyn GeoLookup>,
    geo_index: GeoIndex,
    ranker: CandidateRanker,
    config: SequencerConfig,
    metrics: Arc<MetricsCollector>,
}

impl DispatchSequencer {
    pub fn new(
        ride_repo: Arc<dyn RideRepository>,
        driver_repo: Arc<dyn DriverRepository>,
        rider_repo: Arc<dyn RiderRepository>,
        push: Arc<dyn PushChannel>,
        registry: Arc<dyn ConnectionRegistry>,
        geo_lookup: Arc<dyn GeoLookup>,
        config: SequencerConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let geo_index = GeoIndex::new(driver_repo.clone());

        Self {
            ride_repo,
            driver_repo,
            rider_repo,
            push,
            registry,
            geo_lookup,
            geo_index,
            ranker: CandidateRanker::new(),
            config,
            metrics,
        }
    }

    /// 创建行程并在后台启动派单流程。
    /// 排序和报价不阻塞调用方；单个行程的失败不会影响其他行程。
    pub async fn create_ride(self: &Arc<Self>, request: CreateRideRequest) -> DispatchResult<Ride> {
        let new_ride = NewRide::new(
            request.rider_id,
            request.pickup,
            request.destination,
            request.vehicle,
        );
        let ride = self.ride_repo.create(&new_ride).await?;
        info!("乘客 {} 创建了行程 {}", ride.rider_id, ride.id);

        let sequencer = Arc::clone(self);
        let ride_id = ride.id;
        tokio::spawn(async move {
            if let Err(e) = sequencer.dispatch_ride(ride_id).await {
                error!("行程 {} 派单流程失败: {}", ride_id, e);
            }
        });

        Ok(ride)
    }

    /// 排序候选并开始报价。地理编码失败按"无候选"处理，
    /// 行程直接取消而不是悬挂在 pending。
    pub async fn dispatch_ride(self: &Arc<Self>, ride_id: i64) -> DispatchResult<()> {
        let ride = self
            .ride_repo
            .get_by_id(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound { id: ride_id })?;

        if !ride.is_pending() {
            debug!("行程 {} 已不在 pending 状态，跳过派单", ride_id);
            return Ok(());
        }

        let pickup_point = match self.geo_lookup.resolve(&ride.pickup).await {
            Ok(point) => point,
            Err(e) => {
                warn!("行程 {} 的上车地址解析失败，按无候选处理: {}", ride_id, e);
                self.cancel_unfulfilled(ride_id).await?;
                return Ok(());
            }
        };

        let drivers = self
            .geo_index
            .find_nearby(pickup_point, self.config.search_radius_km, Some(ride.vehicle))
            .await?;
        let ranked = self.ranker.rank(pickup_point, &drivers);

        info!(
            "行程 {} 在 {}km 半径内找到 {} 位候选司机",
            ride_id,
            self.config.search_radius_km,
            ranked.len()
        );

        self.on_candidates_ready(ride_id, pickup_point, ranked).await
    }

    /// 落库候选列表并从第 0 位开始报价
    pub async fn on_candidates_ready(
        self: &Arc<Self>,
        ride_id: i64,
        pickup_point: GeoPoint,
        ranked: Vec<Candidate>,
    ) -> DispatchResult<()> {
        let candidate_ids: Vec<i64> = ranked.iter().map(|c| c.driver_id).collect();

        if !self
            .ride_repo
            .set_candidates_and_cursor(ride_id, pickup_point, &candidate_ids, 0)
            .await?
        {
            debug!("行程 {} 在候选落库前已变更状态，放弃派单", ride_id);
            return Ok(());
        }

        if candidate_ids.is_empty() {
            self.cancel_unfulfilled(ride_id).await?;
            return Ok(());
        }

        self.offer_from(ride_id, 0).await
    }

    /// 报价推进循环，从 `start_index` 开始。
    ///
    /// 每轮重新读取行程并校验 (status, cursor) 守卫；不可达的候选
    /// 立即跳过，不消耗报价窗口，因此整体时延只与可达候选数成正比。
    /// 显式循环而不是递归调用，连续跳过任意多个候选也不会增长调用栈。
    async fn offer_from(self: &Arc<Self>, ride_id: i64, start_index: i64) -> DispatchResult<()> {
        let mut index = start_index;
        loop {
            let Some(ride) = self.ride_repo.get_by_id(ride_id).await? else {
                warn!("行程 {} 在报价过程中消失", ride_id);
                return Ok(());
            };
            if !ride.is_pending() || ride.current_captain_index != index {
                debug!(
                    "行程 {} 的报价游标已变更（状态 {}，游标 {}），停止本轮推进",
                    ride_id, ride.status, ride.current_captain_index
                );
                return Ok(());
            }

            let Some(candidate_id) = ride.current_candidate() else {
                // 游标越界只在取消转移途中短暂出现
                self.cancel_unfulfilled(ride_id).await?;
                return Ok(());
            };

            if self.deliver_offer(&ride, candidate_id).await? {
                self.metrics.record_offer_delivered();
                self.arm_offer_timer(ride_id, index);
                return Ok(());
            }

            // 司机不可达：直接跳下一位，这是稳态事件而不是超时
            debug!(
                "行程 {} 的候选司机 {} 不可达，立即跳过",
                ride_id, candidate_id
            );
            self.metrics.record_offer_skipped();

            let next = index + 1;
            if next >= ride.candidate_count() {
                self.cancel_unfulfilled(ride_id).await?;
                return Ok(());
            }
            if !self.ride_repo.advance_cursor(ride_id, index, next).await? {
                debug!("行程 {} 的游标推进被并发事件抢先，停止本轮推进", ride_id);
                return Ok(());
            }
            index = next;
        }
    }

    /// 向单个候选投递报价，返回是否送达
    async fn deliver_offer(&self, ride: &Ride, driver_id: i64) -> DispatchResult<bool> {
        let Some(driver) = self.driver_repo.get_by_id(driver_id).await? else {
            warn!("行程 {} 的候选司机 {} 已不存在", ride.id, driver_id);
            return Ok(false);
        };
        let Some(connection_id) = driver.connection_id else {
            return Ok(false);
        };
        // 连接标识还在但推送连接已死：同样按不可达跳过
        if !self.registry.is_reachable(&connection_id).await {
            return Ok(false);
        }

        let message = PushMessage::new(RideEvent::NewRide { ride: ride.clone() });
        let delivered = self.push.deliver(&connection_id, &message).await?;
        if delivered {
            info!("行程 {} 已向司机 {} 报价", ride.id, driver_id);
        }
        Ok(delivered)
    }

    /// 为 (ride_id, cursor) 安排报价超时回调。
    /// 不做显式取消登记：过期回调会被 (status, cursor) 守卫判为无效。
    fn arm_offer_timer(self: &Arc<Self>, ride_id: i64, cursor: i64) {
        let sequencer = Arc::clone(self);
        let timeout = self.config.offer_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Err(e) = sequencer.on_offer_timer_fired(ride_id, cursor).await {
                error!("行程 {} 的报价超时处理失败: {}", ride_id, e);
            }
        });
    }

    /// 报价超时回调。只有行程仍停留在同一 (pending, cursor) 时才推进；
    /// 其余情况一律视为过期定时器，不改状态、不发事件。
    pub async fn on_offer_timer_fired(
        self: &Arc<Self>,
        ride_id: i64,
        cursor: i64,
    ) -> DispatchResult<()> {
        let Some(ride) = self.ride_repo.get_by_id(ride_id).await? else {
            debug!("行程 {} 的超时定时器触发时行程已不存在", ride_id);
            return Ok(());
        };
        if !ride.is_pending() || ride.current_captain_index != cursor {
            debug!(
                "行程 {} 位置 {} 的定时器已过期（状态 {}，游标 {}），忽略",
                ride_id, cursor, ride.status, ride.current_captain_index
            );
            self.metrics.record_stale_timer_noop();
            return Ok(());
        }

        info!(
            "行程 {} 的候选司机在 {:?} 内未应答，推进到下一位",
            ride_id, self.config.offer_timeout
        );
        self.metrics.record_offer_timeout();
        self.advance(&ride, cursor).await
    }

    /// 司机拒单：校验是本轮被报价的司机后按超时同样处理，立即推进
    pub async fn on_driver_decline(
        self: &Arc<Self>,
        ride_id: i64,
        driver_id: i64,
    ) -> DispatchResult<()> {
        let Some(ride) = self.ride_repo.get_by_id(ride_id).await? else {
            return Err(DispatchError::RideNotFound { id: ride_id });
        };
        if !ride.is_pending() || ride.current_candidate() != Some(driver_id) {
            debug!(
                "司机 {} 对行程 {} 的拒单已过期或越位，忽略",
                driver_id, ride_id
            );
            return Ok(());
        }

        info!("司机 {} 拒绝了行程 {}", driver_id, ride_id);
        self.advance(&ride, ride.current_captain_index).await
    }

    /// 从 `from_index` 推进到下一位候选；越过末尾则取消行程
    async fn advance(self: &Arc<Self>, ride: &Ride, from_index: i64) -> DispatchResult<()> {
        let next = from_index + 1;
        if next >= ride.candidate_count() {
            self.cancel_unfulfilled(ride.id).await?;
            return Ok(());
        }
        if !self
            .ride_repo
            .advance_cursor(ride.id, from_index, next)
            .await?
        {
            debug!("行程 {} 的推进被并发事件抢先，忽略", ride.id);
            return Ok(());
        }
        self.offer_from(ride.id, next).await
    }

    /// 司机接单。
    ///
    /// 只有行程仍为 pending 且该司机正是当前游标指向的候选时才有效，
    /// 胜者由一次 (status, cursor) 条件写入裁定；条件失败的接单请求
    /// 得到"行程已不可接单"且不产生任何副作用。
    pub async fn on_driver_accept(&self, ride_id: i64, driver_id: i64) -> DispatchResult<Ride> {
        let Some(ride) = self.ride_repo.get_by_id(ride_id).await? else {
            return Err(DispatchError::RideNotFound { id: ride_id });
        };
        if !ride.is_pending() {
            return Err(DispatchError::ride_not_available(
                ride_id,
                ride.status.as_str(),
            ));
        }
        let cursor = ride.current_captain_index;
        if ride.current_candidate() != Some(driver_id) {
            warn!(
                "司机 {} 尝试接下行程 {}，但当前报价对象是 {:?}",
                driver_id,
                ride_id,
                ride.current_candidate()
            );
            return Err(DispatchError::ride_not_available(
                ride_id,
                ride.status.as_str(),
            ));
        }

        if !self
            .ride_repo
            .compare_and_set_status(
                ride_id,
                RideStatus::Pending,
                Some(cursor),
                RideStatus::Accepted,
                Some(driver_id),
            )
            .await?
        {
            // 并发的接单或推进抢先了一步
            return Err(DispatchError::ride_not_available(ride_id, "pending"));
        }

        let ride = self.reload(ride_id).await?;
        info!("司机 {} 接下了行程 {}", driver_id, ride_id);
        self.metrics.record_ride_accepted();
        self.metrics
            .record_dispatch_duration(self.elapsed_since_creation(&ride));

        self.notify_rider(&ride, RideEvent::RideConfirmed { ride: ride.clone() })
            .await;
        Ok(ride)
    }

    /// 乘客取消。幂等：重复取消直接返回已取消的行程，不重复广播。
    /// pending 之外的行程归司机侧流程管理，这里拒绝取消。
    pub async fn on_rider_cancel(&self, ride_id: i64) -> DispatchResult<Ride> {
        let Some(ride) = self.ride_repo.get_by_id(ride_id).await? else {
            return Err(DispatchError::RideNotFound { id: ride_id });
        };
        match ride.status {
            RideStatus::Cancelled => {
                debug!("行程 {} 已是取消状态，幂等返回", ride_id);
                return Ok(ride);
            }
            RideStatus::Pending => {}
            status => {
                return Err(DispatchError::ride_not_available(ride_id, status.as_str()));
            }
        }

        if !self
            .ride_repo
            .compare_and_set_status(
                ride_id,
                RideStatus::Pending,
                None,
                RideStatus::Cancelled,
                None,
            )
            .await?
        {
            // 取消与接单赛跑失败，或另一次取消已经生效
            let ride = self.reload(ride_id).await?;
            if ride.status == RideStatus::Cancelled {
                return Ok(ride);
            }
            return Err(DispatchError::ride_not_available(
                ride_id,
                ride.status.as_str(),
            ));
        }

        let ride = self.reload(ride_id).await?;
        info!("乘客 {} 取消了行程 {}", ride.rider_id, ride_id);
        self.metrics.record_ride_cancelled("rider");

        // 报价中的定时器此后触发都会被守卫判为过期，无需逐一取消
        self.broadcast_cancellation(&ride).await;
        Ok(ride)
    }

    /// 行程开始：仅限已接单司机，需要乘客出示的验证码
    pub async fn on_ride_start(
        &self,
        ride_id: i64,
        driver_id: i64,
        otp: &str,
    ) -> DispatchResult<Ride> {
        let Some(ride) = self.ride_repo.get_by_id(ride_id).await? else {
            return Err(DispatchError::RideNotFound { id: ride_id });
        };
        if ride.status != RideStatus::Accepted || ride.captain_id != Some(driver_id) {
            return Err(DispatchError::ride_not_available(
                ride_id,
                ride.status.as_str(),
            ));
        }
        if ride.otp != otp {
            return Err(DispatchError::InvalidOtp { id: ride_id });
        }

        if !self
            .ride_repo
            .compare_and_set_status(
                ride_id,
                RideStatus::Accepted,
                None,
                RideStatus::Ongoing,
                None,
            )
            .await?
        {
            return Err(DispatchError::ride_not_available(ride_id, "accepted"));
        }

        let ride = self.reload(ride_id).await?;
        info!("行程 {} 已开始", ride_id);
        self.notify_rider(&ride, RideEvent::RideStarted { ride: ride.clone() })
            .await;
        Ok(ride)
    }

    /// 行程结束：仅限当前行程司机
    pub async fn on_ride_end(&self, ride_id: i64, driver_id: i64) -> DispatchResult<Ride> {
        let Some(ride) = self.ride_repo.get_by_id(ride_id).await? else {
            return Err(DispatchError::RideNotFound { id: ride_id });
        };
        if ride.status != RideStatus::Ongoing || ride.captain_id != Some(driver_id) {
            return Err(DispatchError::ride_not_available(
                ride_id,
                ride.status.as_str(),
            ));
        }

        if !self
            .ride_repo
            .compare_and_set_status(
                ride_id,
                RideStatus::Ongoing,
                None,
                RideStatus::Completed,
                None,
            )
            .await?
        {
            return Err(DispatchError::ride_not_available(ride_id, "ongoing"));
        }

        let ride = self.reload(ride_id).await?;
        info!("行程 {} 已完成", ride_id);
        self.notify_rider(&ride, RideEvent::RideEnded { ride: ride.clone() })
            .await;
        Ok(ride)
    }

    /// 崩溃恢复入口：对仍在 pending 的行程从持久化游标处继续报价
    pub async fn resume_offering(self: &Arc<Self>, ride_id: i64) -> DispatchResult<()> {
        let Some(ride) = self.ride_repo.get_by_id(ride_id).await? else {
            return Err(DispatchError::RideNotFound { id: ride_id });
        };
        if !ride.is_pending() {
            debug!("行程 {} 已解决，无需恢复", ride_id);
            return Ok(());
        }
        if ride.current_candidate().is_none() {
            self.cancel_unfulfilled(ride_id).await?;
            return Ok(());
        }

        info!(
            "恢复行程 {} 的报价，游标位置 {}",
            ride_id, ride.current_captain_index
        );
        self.offer_from(ride_id, ride.current_captain_index).await
    }

    /// 候选用尽或根本没有候选：取消行程并告知乘客
    async fn cancel_unfulfilled(&self, ride_id: i64) -> DispatchResult<()> {
        if !self
            .ride_repo
            .compare_and_set_status(
                ride_id,
                RideStatus::Pending,
                None,
                RideStatus::Cancelled,
                None,
            )
            .await?
        {
            debug!("行程 {} 在取消前已变更状态，忽略", ride_id);
            return Ok(());
        }

        let ride = self.reload(ride_id).await?;
        warn!("行程 {} 没有司机接单，已取消", ride_id);
        self.metrics.record_ride_cancelled("no_driver");
        self.metrics
            .record_dispatch_duration(self.elapsed_since_creation(&ride));

        self.notify_rider(&ride, RideEvent::RideCancelled { ride: ride.clone() })
            .await;
        Ok(())
    }

    /// 把取消事件广播给上车点附近仍在线的同车型司机（尽力而为）
    async fn broadcast_cancellation(&self, ride: &Ride) {
        let point = match ride.pickup_point {
            Some(point) => point,
            None => match self.geo_lookup.resolve(&ride.pickup).await {
                Ok(point) => point,
                Err(e) => {
                    warn!("行程 {} 的取消广播缺少坐标，跳过: {}", ride.id, e);
                    return;
                }
            },
        };

        let drivers = match self
            .geo_index
            .find_nearby(point, self.config.cancel_broadcast_radius_km, Some(ride.vehicle))
            .await
        {
            Ok(drivers) => drivers,
            Err(e) => {
                warn!("行程 {} 的取消广播查询失败: {}", ride.id, e);
                return;
            }
        };

        let deliveries = drivers.iter().filter_map(|driver| {
            driver.connection_id.as_ref().map(|connection_id| {
                let message = PushMessage::new(RideEvent::RideCancelled { ride: ride.clone() });
                let push = self.push.clone();
                let connection_id = connection_id.clone();
                async move { push.deliver(&connection_id, &message).await }
            })
        });

        for result in futures::future::join_all(deliveries).await {
            if let Err(e) = result {
                warn!("行程 {} 的取消广播部分失败: {}", ride.id, e);
            }
        }
    }

    /// 给乘客推送事件（尽力而为，乘客不在线只记日志）
    async fn notify_rider(&self, ride: &Ride, event: RideEvent) {
        let rider = match self.rider_repo.get_by_id(ride.rider_id).await {
            Ok(Some(rider)) => rider,
            Ok(None) => {
                warn!("行程 {} 的乘客 {} 不存在", ride.id, ride.rider_id);
                return;
            }
            Err(e) => {
                error!("查询行程 {} 的乘客失败: {}", ride.id, e);
                return;
            }
        };
        let Some(connection_id) = rider.connection_id else {
            debug!("乘客 {} 不在线，事件 {} 未送达", rider.id, event.event_name());
            return;
        };

        let message = PushMessage::new(event);
        match self.push.deliver(&connection_id, &message).await {
            Ok(true) => {}
            Ok(false) => debug!("乘客 {} 的连接已失效", rider.id),
            Err(e) => warn!("向乘客 {} 推送事件失败: {}", rider.id, e),
        }
    }

    fn elapsed_since_creation(&self, ride: &Ride) -> f64 {
        (Utc::now() - ride.created_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    async fn reload(&self, ride_id: i64) -> DispatchResult<Ride> {
        self.ride_repo
            .get_by_id(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound { id: ride_id })
    }
}
