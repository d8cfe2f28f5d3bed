use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use ridehail_config::AppConfig;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::Application;
use shutdown::ShutdownManager;

fn cli() -> Command {
    Command::new("ridehail")
        .version(env!("CARGO_PKG_VERSION"))
        .about("网约车派单服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML 配置文件路径，缺省时按约定位置查找"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("覆盖配置中的日志级别"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["json", "pretty"])
                .help("覆盖配置中的日志格式"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config_path = matches.get_one::<String>("config").map(String::as_str);

    let mut config = AppConfig::load(config_path).context("加载配置失败")?;
    // 命令行参数优先于配置文件
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.log.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.log.format = format.clone();
    }

    init_logging(&config.log.level, &config.log.format)?;

    info!(
        "派单服务启动，报价窗口 {}s，搜索半径 {}km",
        config.dispatcher.offer_timeout_seconds, config.dispatcher.search_radius_km
    );

    let app = Arc::new(Application::new(config).await?);
    let shutdown = ShutdownManager::new();

    let worker = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，停止派单服务");
    shutdown.shutdown();

    match tokio::time::timeout(Duration::from_secs(30), worker).await {
        Ok(Ok(Ok(()))) => info!("派单服务已退出"),
        Ok(Ok(Err(e))) => error!("派单服务异常退出: {e}"),
        Ok(Err(e)) => error!("派单服务任务失败: {e}"),
        Err(_) => warn!("等待派单服务退出超时，强制结束进程"),
    }

    Ok(())
}

fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let base = tracing_subscriber::registry().with(filter);

    match format {
        "json" => base.with(tracing_subscriber::fmt::layer().json()).try_init(),
        _ => base.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("初始化日志失败: {e}"))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("注册SIGTERM处理器失败");
        tokio::select! {
            _ = signal::ctrl_c() => info!("收到Ctrl+C"),
            _ = sigterm.recv() => info!("收到SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("收到Ctrl+C");
    }
}
