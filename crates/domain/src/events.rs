//! 派单领域事件
//!
//! 核心只保证"何时发出哪个事件"，事件的最终展示由被排除在外的
//! 表现层负责。线名沿用客户端既有的事件名。

use chrono::{DateTime, Utc};
use ridehail_errors::DispatchResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Ride;

/// 推送给乘客/司机的行程事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RideEvent {
    /// 向候选司机报价
    NewRide { ride: Ride },
    /// 通知乘客司机已接单
    RideConfirmed { ride: Ride },
    /// 通知乘客行程开始
    RideStarted { ride: Ride },
    /// 通知乘客行程结束
    RideEnded { ride: Ride },
    /// 通知乘客或候选司机行程已取消
    RideCancelled { ride: Ride },
}

impl RideEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            RideEvent::NewRide { .. } => "new-ride",
            RideEvent::RideConfirmed { .. } => "ride-confirmed",
            RideEvent::RideStarted { .. } => "ride-started",
            RideEvent::RideEnded { .. } => "ride-ended",
            RideEvent::RideCancelled { .. } => "ride-cancelled",
        }
    }

    pub fn ride_id(&self) -> i64 {
        match self {
            RideEvent::NewRide { ride }
            | RideEvent::RideConfirmed { ride }
            | RideEvent::RideStarted { ride }
            | RideEvent::RideEnded { ride }
            | RideEvent::RideCancelled { ride } => ride.id,
        }
    }
}

/// 推送消息信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub id: String,
    pub payload: RideEvent,
    pub created_at: DateTime<Utc>,
}

impl PushMessage {
    pub fn new(payload: RideEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn serialize(&self) -> DispatchResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
