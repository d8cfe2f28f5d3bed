use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub dispatcher: DispatcherConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 每位候选司机的报价等待窗口（秒）
    pub offer_timeout_seconds: u64,
    /// 候选搜索半径（公里）
    pub search_radius_km: f64,
    /// 取消广播半径（公里）
    pub cancel_broadcast_radius_km: f64,
    /// 启动时是否恢复 pending 行程
    pub recover_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                // mode=rwc: 数据库文件不存在时自动创建
                url: "sqlite://ridehail.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            dispatcher: DispatcherConfig {
                offer_timeout_seconds: 30,
                search_radius_km: 10.0,
                cancel_broadcast_radius_km: 4.0,
                recover_on_startup: true,
            },
            log: LogConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 加载配置：TOML 文件（可选）叠加 `RIDEHAIL_` 前缀环境变量
    pub fn load(config_path: Option<&str>) -> ConfigResult<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("database.url", defaults.database.url.clone())?
            .set_default(
                "database.max_connections",
                defaults.database.max_connections as i64,
            )?
            .set_default(
                "dispatcher.offer_timeout_seconds",
                defaults.dispatcher.offer_timeout_seconds as i64,
            )?
            .set_default(
                "dispatcher.search_radius_km",
                defaults.dispatcher.search_radius_km,
            )?
            .set_default(
                "dispatcher.cancel_broadcast_radius_km",
                defaults.dispatcher.cancel_broadcast_radius_km,
            )?
            .set_default(
                "dispatcher.recover_on_startup",
                defaults.dispatcher.recover_on_startup,
            )?
            .set_default("log.level", defaults.log.level.clone())?
            .set_default("log.format", defaults.log.format.clone())?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(ConfigError::File(format!("配置文件不存在: {path}")));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            for path in ["config/ridehail.toml", "ridehail.toml"] {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("RIDEHAIL")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Validation(
                "database.url 不能为空".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections 必须大于0".to_string(),
            ));
        }
        if self.dispatcher.offer_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "dispatcher.offer_timeout_seconds 必须大于0".to_string(),
            ));
        }
        if self.dispatcher.search_radius_km <= 0.0 {
            return Err(ConfigError::Validation(
                "dispatcher.search_radius_km 必须大于0".to_string(),
            ));
        }
        if self.dispatcher.cancel_broadcast_radius_km <= 0.0 {
            return Err(ConfigError::Validation(
                "dispatcher.cancel_broadcast_radius_km 必须大于0".to_string(),
            ));
        }
        Ok(())
    }
}
