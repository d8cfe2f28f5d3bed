pub mod models;

pub use models::{AppConfig, DatabaseConfig, DispatcherConfig, LogConfig};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("配置校验失败: {0}")]
    Validation(String),

    #[error("配置文件错误: {0}")]
    File(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Configuration(err.to_string())
    }
}
