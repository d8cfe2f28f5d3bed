use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ridehail_config::AppConfig;
use ridehail_dispatcher::{
    DispatchRecoveryService, DispatchSequencer, RecoveryService, SequencerConfig,
};
use ridehail_infrastructure::{
    create_pool, init_schema, InProcessPushGateway, MetricsCollector, SqliteDriverRepository,
    SqliteRideRepository, SqliteRiderRepository, StaticGeoLookup,
};
use tokio::sync::broadcast;
use tracing::info;

/// 主应用程序：装配仓储、推送网关与派单器
pub struct Application {
    config: AppConfig,
    sequencer: Arc<DispatchSequencer>,
    recovery: DispatchRecoveryService,
    gateway: Arc<InProcessPushGateway>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        // 创建数据库连接池并确保表结构就绪
        let pool = create_pool(&config.database.url, config.database.max_connections)
            .await
            .context("创建数据库连接池失败")?;
        init_schema(&pool).await.context("初始化表结构失败")?;

        // 创建Repository实例
        let ride_repo = Arc::new(SqliteRideRepository::new(pool.clone()));
        let driver_repo = Arc::new(SqliteDriverRepository::new(pool.clone()));
        let rider_repo = Arc::new(SqliteRiderRepository::new(pool));

        // 推送网关与地理编码
        let gateway = Arc::new(InProcessPushGateway::new());
        let geo_lookup = Arc::new(StaticGeoLookup::new());

        // 创建指标收集器
        let metrics = Arc::new(MetricsCollector::new().context("创建指标收集器失败")?);

        let sequencer = Arc::new(DispatchSequencer::new(
            ride_repo.clone(),
            driver_repo,
            rider_repo,
            gateway.clone(),
            gateway.clone(),
            geo_lookup,
            SequencerConfig {
                offer_timeout: Duration::from_secs(config.dispatcher.offer_timeout_seconds),
                search_radius_km: config.dispatcher.search_radius_km,
                cancel_broadcast_radius_km: config.dispatcher.cancel_broadcast_radius_km,
            },
            metrics,
        ));

        let recovery = DispatchRecoveryService::new(ride_repo, sequencer.clone());

        Ok(Self {
            config,
            sequencer,
            recovery,
            gateway,
        })
    }

    /// 派单器句柄，供接入层（HTTP/WebSocket网关）提交边界操作
    pub fn sequencer(&self) -> Arc<DispatchSequencer> {
        self.sequencer.clone()
    }

    /// 推送网关句柄，供接入层注册/注销连接
    pub fn push_gateway(&self) -> Arc<InProcessPushGateway> {
        self.gateway.clone()
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.config.dispatcher.recover_on_startup {
            let report = self.recovery.recover_pending_rides().await?;
            if !report.errors.is_empty() {
                tracing::warn!("启动恢复存在失败项: {:?}", report.errors);
            }
        }

        info!("派单服务就绪，等待接入层提交行程");

        // 边界操作由接入层驱动，这里只需等待关闭
        let _ = shutdown_rx.recv().await;
        info!("派单服务停止");
        Ok(())
    }
}
