use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 乘客记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: i64,
    pub name: String,
    /// 当前推送连接标识，断线时为空
    pub connection_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rider {
    pub fn is_reachable(&self) -> bool {
        self.connection_id.is_some()
    }
}

/// 注册乘客时的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRider {
    pub name: String,
}

impl NewRider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
