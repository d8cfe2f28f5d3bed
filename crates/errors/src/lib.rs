use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("行程未找到: {id}")]
    RideNotFound { id: i64 },
    #[error("司机未找到: {id}")]
    DriverNotFound { id: i64 },
    #[error("乘客未找到: {id}")]
    RiderNotFound { id: i64 },
    #[error("行程 {id} 已不可接单，当前状态: {status}")]
    RideNotAvailable { id: i64, status: String },
    #[error("行程 {id} 的验证码不正确")]
    InvalidOtp { id: i64 },
    #[error("地理编码错误: {0}")]
    GeoLookup(String),
    #[error("推送通道错误: {0}")]
    PushChannel(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn ride_not_found(id: i64) -> Self {
        Self::RideNotFound { id }
    }
    pub fn driver_not_found(id: i64) -> Self {
        Self::DriverNotFound { id }
    }
    pub fn rider_not_found(id: i64) -> Self {
        Self::RiderNotFound { id }
    }
    pub fn ride_not_available<S: Into<String>>(id: i64, status: S) -> Self {
        Self::RideNotAvailable {
            id,
            status: status.into(),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::Internal(_) | DispatchError::Configuration(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::DatabaseOperation(_)
                | DispatchError::PushChannel(_)
                | DispatchError::GeoLookup(_)
        )
    }
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DispatchError::RideNotAvailable { .. } | DispatchError::InvalidOtp { .. }
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            DispatchError::RideNotFound { .. } => "请求的行程不存在",
            DispatchError::DriverNotFound { .. } => "请求的司机不存在",
            DispatchError::RiderNotFound { .. } => "请求的乘客不存在",
            DispatchError::RideNotAvailable { .. } => "该行程已被接单或已取消，下次好运",
            DispatchError::InvalidOtp { .. } => "验证码不正确，请与乘客核对",
            DispatchError::GeoLookup(_) => "暂时无法解析上车地点，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Internal(err.to_string())
    }
}
